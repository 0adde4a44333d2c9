//! Camera-pipe RTSP restreamer.
//!
//! Reads MPEG-TS from a named pipe fed by a camera process and serves
//! it to RTSP clients over TLS. The startup sequence is strictly
//! ordered: H.264 codec parameters (SPS/PPS) are scanned out of the
//! pipe first, the media stream is built from them, the demux/forward
//! worker starts, and only then does the readiness gate open and let
//! clients negotiate sessions.

pub mod error;
pub mod gate;
pub mod handler;
pub mod mpegts;
pub mod params;
pub mod streamer;
pub mod tls;

pub use error::{Result, ServerError};
pub use gate::ReadyGate;
pub use handler::StreamerHandler;
pub use params::{H264Parameters, extract_h264_parameters};
pub use streamer::Streamer;
