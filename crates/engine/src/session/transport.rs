use std::net::SocketAddr;

/// How RTP packets reach a session's client.
#[derive(Debug, Clone)]
pub enum DeliveryMode {
    /// RTP is sent directly to the client's negotiated address.
    Unicast {
        /// Full socket address for RTP delivery (`client_ip:client_rtp_port`).
        client_rtp: SocketAddr,
    },
    /// The client joins the server's multicast group; packets are sent
    /// once per stream, not per session.
    Multicast,
}

/// Negotiated transport parameters for a session (RFC 2326 §12.39).
///
/// Created during SETUP from the client's `Transport` header and the
/// server's fixed media ports.
///
/// ```text
/// Client → Server:  Transport: RTP/AVP;unicast;client_port=8000-8001
/// Server → Client:  Transport: RTP/AVP;unicast;client_port=8000-8001;server_port=8000-8001
/// ```
#[derive(Debug, Clone)]
pub struct NegotiatedTransport {
    pub mode: DeliveryMode,
    /// Client's RTP receive port (0 for multicast sessions).
    pub client_rtp_port: u16,
    /// Client's RTCP receive port (0 for multicast sessions).
    pub client_rtcp_port: u16,
}

impl NegotiatedTransport {
    /// Whether this session receives media via the multicast group.
    pub fn is_multicast(&self) -> bool {
        matches!(self.mode, DeliveryMode::Multicast)
    }
}

/// Client-side transport request parsed from the RTSP `Transport`
/// header (RFC 2326 §12.39).
///
/// Two shapes are accepted:
///
/// - `RTP/AVP;unicast;client_port=RTP-RTCP` — unicast with an explicit
///   client port pair.
/// - `RTP/AVP;multicast` — the client asks to join the server's
///   multicast group; no client ports are required.
///
/// Interleaved TCP (`RTP/AVP/TCP;interleaved=0-1`) is not supported and
/// is rejected before this parser runs.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Client asked for multicast delivery.
    pub multicast: bool,
    /// `client_port=RTP-RTCP` pair, when present.
    pub client_ports: Option<(u16, u16)>,
}

impl TransportRequest {
    /// Parse the `Transport` header value. Returns `None` when the
    /// header carries neither a multicast request nor a client port pair.
    pub fn parse(header: &str) -> Option<Self> {
        let mut multicast = false;
        let mut client_ports = None;

        for part in header.split(';') {
            let part = part.trim();
            if part.eq_ignore_ascii_case("multicast") {
                multicast = true;
            } else if let Some(ports) = part.strip_prefix("client_port=") {
                let (rtp, rtcp) = ports.split_once('-')?;
                client_ports = Some((rtp.parse().ok()?, rtcp.parse().ok()?));
            }
        }

        if multicast || client_ports.is_some() {
            Some(TransportRequest {
                multicast,
                client_ports,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unicast_with_ports() {
        let t = TransportRequest::parse("RTP/AVP;unicast;client_port=5000-5001").unwrap();
        assert!(!t.multicast);
        assert_eq!(t.client_ports, Some((5000, 5001)));
    }

    #[test]
    fn parse_multicast_without_ports() {
        let t = TransportRequest::parse("RTP/AVP;multicast").unwrap();
        assert!(t.multicast);
        assert!(t.client_ports.is_none());
    }

    #[test]
    fn parse_rejects_no_ports_no_multicast() {
        assert!(TransportRequest::parse("RTP/AVP;unicast").is_none());
    }

    #[test]
    fn parse_rejects_malformed_ports() {
        assert!(TransportRequest::parse("RTP/AVP;unicast;client_port=abc-def").is_none());
    }
}
