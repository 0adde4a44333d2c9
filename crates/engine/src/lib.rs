//! Embeddable RTSP server for live H.264 delivery.
//!
//! The crate is organized around three objects the embedding program
//! drives directly:
//!
//! - [`Server`] — owns the RTSP/TLS listener and the UDP media sockets.
//! - [`ServerStream`] — a live media session; the program writes H.264
//!   access units into it and the server fans them out as RTP to every
//!   playing client (unicast or multicast).
//! - [`ServerHandler`] — session-lifecycle callbacks the program
//!   implements to decide which stream (if any) answers DESCRIBE/SETUP.
//!
//! Everything else — RTSP signaling, SDP generation, RTP packetization,
//! session state — is internal plumbing.

pub mod description;
pub mod error;
pub mod media;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stream;
pub mod transport;

pub use description::{H264Format, Media, SessionDescription};
pub use error::{Result, RtspError};
pub use server::{Server, ServerConfig, ServerHandler};
pub use stream::ServerStream;
