//! Network transport layer for RTSP signaling and RTP media delivery.
//!
//! RTSP uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries RTSP request/response signaling, one
//!   thread per client connection, optionally wrapped in server-side
//!   TLS before any RTSP byte is exchanged.
//!
//! - **UDP** ([`udp`]): carries RTP media packets, unicast per session
//!   or once per stream to the multicast group.

pub mod tcp;
pub mod udp;

pub use udp::UdpTransport;
