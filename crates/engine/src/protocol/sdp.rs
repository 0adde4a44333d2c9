//! SDP generation (RFC 4566 / RFC 8866) for DESCRIBE responses.
//!
//! ```text
//! v=0                                          ← protocol version
//! o=<user> <sess-id> <sess-ver> IN IP4 <addr>  ← origin
//! s=<session-name>                              ← session name
//! c=IN IP4 <addr>                               ← connection address
//! t=0 0                                         ← timing (live stream)
//! a=tool:rtsp-engine                            ← server software
//! a=sendonly                                    ← direction
//! m=video 0 RTP/AVP 96                          ← media description
//! a=rtpmap:96 H264/90000                        ← codec/clock rate
//! a=fmtp:96 packetization-mode=1;...            ← codec parameters
//! a=control:track1                              ← track control URL
//! ```
//!
//! Origin/session fields come from [`ServerConfig`](crate::ServerConfig).

use crate::description::SessionDescription;
use crate::server::ServerConfig;

/// Render a session description to an SDP body for the given host.
pub fn generate_sdp(desc: &SessionDescription, host: &str, config: &ServerConfig) -> String {
    let mut sdp: Vec<String> = Vec::new();

    sdp.push("v=0".to_string());
    sdp.push(format!(
        "o={} {} {} IN IP4 {}",
        config.sdp_username, config.sdp_session_id, config.sdp_session_version, host
    ));
    sdp.push(format!("s={}", config.sdp_session_name));
    sdp.push(format!("c=IN IP4 {}", host));
    sdp.push("t=0 0".to_string());
    sdp.push("a=tool:rtsp-engine".to_string());
    sdp.push("a=sendonly".to_string());

    for media in desc.medias() {
        let format = media.format();
        sdp.push(format!("m=video 0 RTP/AVP {}", format.payload_type()));
        sdp.extend(format.sdp_attributes());
    }

    tracing::debug!("SDP: {}", sdp.join("\r\n"));

    format!("{}\r\n", sdp.join("\r\n"))
}
