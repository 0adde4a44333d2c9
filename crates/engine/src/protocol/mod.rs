//! RTSP protocol implementation (RFC 2326).
//!
//! Parses requests, builds responses, routes methods to the embedding
//! program's [`ServerHandler`](crate::ServerHandler), and generates SDP.
//!
//! RTSP messages follow HTTP/1.1 syntax with a different, stateful
//! method set:
//!
//! | Method | RFC 2326 | Purpose |
//! |--------|----------|---------|
//! | OPTIONS | §10.1 | Capability discovery |
//! | DESCRIBE | §10.2 | Retrieve SDP session description |
//! | SETUP | §10.4 | Negotiate transport |
//! | PLAY | §10.5 | Start media delivery |
//! | PAUSE | §10.6 | Suspend media delivery |
//! | TEARDOWN | §10.7 | Destroy session |
//! | GET_PARAMETER | §10.8 | Keepalive / parameter query |

pub mod handler;
pub mod request;
pub mod response;
pub mod sdp;

pub(crate) use handler::MethodHandler;
pub use request::RtspRequest;
pub use response::RtspResponse;
