use std::time::Duration;

use thiserror::Error;

use crate::mpegts::DemuxError;

/// Process-level errors. Everything here is fatal at startup; after
/// startup only the streaming loop produces (and logs) errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("no SPS/PPS found in {path} within {timeout:?}")]
    ExtractTimeout { path: String, timeout: Duration },

    #[error("source ended before both SPS and PPS were found")]
    ParametersNotFound,

    #[error(transparent)]
    Demux(#[from] DemuxError),

    #[error(transparent)]
    Rtsp(#[from] rtsp::RtspError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
