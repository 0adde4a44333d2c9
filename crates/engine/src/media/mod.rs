//! Media layer: RTP header state and H.264 packetization.
//!
//! Each H.264 access unit written into a stream is split into one or
//! more RTP packets. Every packet carries the 12-byte fixed header
//! ([`rtp::RtpHeader`], RFC 3550 §5.1):
//!
//! - **Sequence number** (16-bit, wrapping) — reordering and loss detection.
//! - **Timestamp** (32-bit, 90 kHz for video) — media clock.
//! - **SSRC** (32-bit) — randomly chosen sender identity.
//! - **Marker bit** — set on the last packet of an access unit.
//!
//! The crate is H.264-only; codec identity lives in
//! [`H264Format`](crate::description::H264Format) rather than behind a
//! codec trait.

pub mod h264;
pub mod rtp;

pub use h264::{H264Packetizer, NalUnitType, split_nal_units};
