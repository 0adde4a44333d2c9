use std::net::SocketAddr;
use std::sync::Arc;

use crate::protocol::request::RtspRequest;
use crate::protocol::response::RtspResponse;
use crate::protocol::sdp;
use crate::server::{ServerCore, ServerHandler};
use crate::session::{DeliveryMode, NegotiatedTransport, SessionState, TransportRequest};
use crate::stream::ServerStream;
use crate::transport::udp::MULTICAST_TTL;

/// Routes RTSP method requests for a single connection.
///
/// DESCRIBE and SETUP are resolved through the program's
/// [`ServerHandler`]; sessions created on this connection are tracked
/// together with the stream they subscribed to so both can be cleaned
/// up when the connection drops.
pub(crate) struct MethodHandler {
    core: Arc<ServerCore>,
    handler: Arc<dyn ServerHandler>,
    client_addr: SocketAddr,
    /// (session id, subscribed stream) pairs owned by this connection.
    owned: Vec<(String, Arc<ServerStream>)>,
}

impl MethodHandler {
    pub fn new(
        core: Arc<ServerCore>,
        handler: Arc<dyn ServerHandler>,
        client_addr: SocketAddr,
    ) -> Self {
        MethodHandler {
            core,
            handler,
            client_addr,
            owned: Vec::new(),
        }
    }

    pub fn handle(&mut self, request: &RtspRequest) -> RtspResponse {
        let cseq = request.cseq().unwrap_or("0");

        match request.method.as_str() {
            "OPTIONS" => self.handle_options(cseq),
            "DESCRIBE" => self.handle_describe(cseq, &request.uri),
            "SETUP" => self.handle_setup(cseq, request),
            "PLAY" => self.handle_play(cseq, request),
            "PAUSE" => self.handle_pause(cseq, request),
            "TEARDOWN" => self.handle_teardown(cseq, request),
            "GET_PARAMETER" => self.handle_get_parameter(cseq, request),
            _ => {
                tracing::warn!(method = %request.method, %cseq, "unsupported RTSP method");
                RtspResponse::new(501, "Not Implemented").add_header("CSeq", cseq)
            }
        }
    }

    /// Clean up everything this connection created: unsubscribe its
    /// sessions from their streams and drop them from the registry.
    pub fn finish(&mut self) {
        if self.owned.is_empty() {
            return;
        }
        let ids: Vec<String> = self.owned.iter().map(|(id, _)| id.clone()).collect();
        for (id, stream) in self.owned.drain(..) {
            stream.unsubscribe(&id);
        }
        let removed = self.core.session_manager.remove_sessions(&ids);
        tracing::info!(peer = %self.client_addr, removed, "cleaned up sessions on disconnect");
    }

    fn handle_options(&self, cseq: &str) -> RtspResponse {
        tracing::debug!(%cseq, "OPTIONS");
        RtspResponse::ok().add_header("CSeq", cseq).add_header(
            "Public",
            "OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN, GET_PARAMETER",
        )
    }

    /// Host for SDP `o=`/`c=` lines: taken from the request URI, falling
    /// back to the client's own address when the URI has no host.
    fn host_from_uri_or_client(&self, uri: &str) -> String {
        if let Some(after_scheme) = uri
            .strip_prefix("rtsp://")
            .or_else(|| uri.strip_prefix("rtsps://"))
        {
            let host = after_scheme
                .split('/')
                .next()
                .and_then(|host_port| host_port.split(':').next())
                .unwrap_or("")
                .trim();
            if !host.is_empty() {
                return host.to_string();
            }
        }
        self.client_addr.ip().to_string()
    }

    fn handle_describe(&self, cseq: &str, uri: &str) -> RtspResponse {
        tracing::debug!(%cseq, uri, "DESCRIBE");

        let stream = match self.handler.on_describe(uri) {
            Some(s) => s,
            None => {
                tracing::warn!(uri, "DESCRIBE refused, no stream available");
                return RtspResponse::not_found().add_header("CSeq", cseq);
            }
        };

        let host = self.host_from_uri_or_client(uri);
        let body = sdp::generate_sdp(stream.description(), &host, &self.core.config);

        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Content-Type", "application/sdp")
            .add_header("Content-Base", uri)
            .with_body(body)
    }

    fn handle_setup(&mut self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        let stream = match self.handler.on_setup(&request.uri) {
            Some(s) => s,
            None => {
                tracing::warn!(uri = %request.uri, "SETUP refused, no stream available");
                return RtspResponse::not_found().add_header("CSeq", cseq);
            }
        };

        let transport_header = match request.get_header("Transport") {
            Some(t) => t,
            None => {
                tracing::warn!(%cseq, "SETUP missing Transport header");
                return RtspResponse::bad_request().add_header("CSeq", cseq);
            }
        };

        // Interleaved TCP transport (RFC 2326 §10.12) is not implemented.
        if transport_header.contains("RTP/AVP/TCP") || transport_header.contains("interleaved=") {
            tracing::warn!(%cseq, transport = %transport_header, "client requested TCP transport (not implemented)");
            return RtspResponse::new(461, "Unsupported Transport")
                .add_header("CSeq", cseq)
                .add_header("Unsupported", "RTP/AVP/TCP (interleaved); use RTP/AVP (UDP)");
        }

        let transport_request = match TransportRequest::parse(transport_header) {
            Some(t) => t,
            None => {
                tracing::warn!(%cseq, transport_header, "SETUP invalid Transport header");
                return RtspResponse::bad_request().add_header("CSeq", cseq);
            }
        };

        let (negotiated, transport_response) = if transport_request.multicast {
            let group = self.core.multicast_group;
            let rtp_port = self.core.config.multicast_rtp_port;
            let rtcp_port = self.core.config.multicast_rtcp_port;
            (
                NegotiatedTransport {
                    mode: DeliveryMode::Multicast,
                    client_rtp_port: 0,
                    client_rtcp_port: 0,
                },
                format!(
                    "RTP/AVP;multicast;destination={};port={}-{};ttl={}",
                    group, rtp_port, rtcp_port, MULTICAST_TTL
                ),
            )
        } else {
            let (client_rtp_port, client_rtcp_port) = match transport_request.client_ports {
                Some(ports) => ports,
                None => {
                    tracing::warn!(%cseq, "SETUP unicast without client_port");
                    return RtspResponse::bad_request().add_header("CSeq", cseq);
                }
            };
            let (server_rtp_port, server_rtcp_port) = match *self.core.server_ports.read() {
                Some(ports) => ports,
                None => {
                    tracing::error!("SETUP before server sockets were bound");
                    return RtspResponse::new(500, "Internal Server Error")
                        .add_header("CSeq", cseq);
                }
            };
            let client_rtp = SocketAddr::new(self.client_addr.ip(), client_rtp_port);
            (
                NegotiatedTransport {
                    mode: DeliveryMode::Unicast { client_rtp },
                    client_rtp_port,
                    client_rtcp_port,
                },
                format!(
                    "RTP/AVP;unicast;client_port={}-{};server_port={}-{}",
                    client_rtp_port, client_rtcp_port, server_rtp_port, server_rtcp_port
                ),
            )
        };

        let session = self.core.session_manager.create_session(&request.uri);
        let session_id = session.id.clone();
        session.set_transport(negotiated);

        stream.subscribe(&session_id);
        self.owned.push((session_id.clone(), stream));

        tracing::info!(
            session_id,
            uri = %request.uri,
            transport = %transport_response,
            "session created via SETUP"
        );

        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Transport", &transport_response)
            .add_header("Session", &session.session_header_value())
    }

    fn handle_play(&mut self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        let session_id = match self.extract_session_id(request) {
            Some(id) => id,
            None => {
                tracing::warn!(%cseq, "PLAY missing Session header");
                return RtspResponse::session_not_found().add_header("CSeq", cseq);
            }
        };

        match self.core.session_manager.get_session(&session_id) {
            Some(session) => {
                session.set_state(SessionState::Playing);
                self.handler.on_play(&session_id);
                tracing::info!(session_id, "session started playing");

                let mut resp = RtspResponse::ok()
                    .add_header("CSeq", cseq)
                    .add_header("Session", &session.session_header_value())
                    .add_header("Range", "npt=0.000-");

                if let Some((_, stream)) = self.owned.iter().find(|(id, _)| *id == session_id) {
                    let rtp_info = format!(
                        "url={};seq={};rtptime={}",
                        session.uri,
                        stream.next_sequence(),
                        stream.next_rtp_timestamp()
                    );
                    resp = resp.add_header("RTP-Info", &rtp_info);
                }

                resp
            }
            None => {
                tracing::warn!(session_id, "PLAY for unknown session");
                RtspResponse::session_not_found().add_header("CSeq", cseq)
            }
        }
    }

    fn handle_pause(&mut self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        let session_id = match self.extract_session_id(request) {
            Some(id) => id,
            None => {
                tracing::warn!(%cseq, "PAUSE missing Session header");
                return RtspResponse::session_not_found().add_header("CSeq", cseq);
            }
        };

        match self.core.session_manager.get_session(&session_id) {
            Some(session) => {
                session.set_state(SessionState::Paused);
                tracing::info!(session_id, "session paused");
                RtspResponse::ok()
                    .add_header("CSeq", cseq)
                    .add_header("Session", &session.session_header_value())
            }
            None => {
                tracing::warn!(session_id, "PAUSE for unknown session");
                RtspResponse::session_not_found().add_header("CSeq", cseq)
            }
        }
    }

    fn handle_teardown(&mut self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        let session_id = match self.extract_session_id(request) {
            Some(id) => id,
            None => {
                tracing::warn!(%cseq, "TEARDOWN missing Session header");
                return RtspResponse::session_not_found().add_header("CSeq", cseq);
            }
        };

        match self.core.session_manager.remove_session(&session_id) {
            Some(_) => {
                if let Some(pos) = self.owned.iter().position(|(id, _)| *id == session_id) {
                    let (id, stream) = self.owned.swap_remove(pos);
                    stream.unsubscribe(&id);
                }
                self.handler.on_teardown(&session_id);
                tracing::info!(session_id, "session terminated via TEARDOWN");
                RtspResponse::ok().add_header("CSeq", cseq)
            }
            None => {
                tracing::warn!(session_id, "TEARDOWN for unknown session");
                RtspResponse::session_not_found().add_header("CSeq", cseq)
            }
        }
    }

    /// GET_PARAMETER is used by clients (e.g. VLC) as a keepalive
    /// (RFC 2326 §10.8).
    fn handle_get_parameter(&self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        tracing::trace!(%cseq, "GET_PARAMETER keepalive");

        let mut resp = RtspResponse::ok().add_header("CSeq", cseq);

        if let Some(id) = self.extract_session_id(request)
            && self.core.session_manager.get_session(&id).is_some()
        {
            resp = resp.add_header("Session", &id);
        }

        resp
    }

    /// Session ID from the Session header, timeout suffix stripped:
    /// `"SESSIONID;timeout=60"` → `"SESSIONID"`.
    fn extract_session_id(&self, request: &RtspRequest) -> Option<String> {
        request
            .get_header("Session")
            .map(|s| s.split(';').next().unwrap_or(s).trim().to_string())
    }
}
