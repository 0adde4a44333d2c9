//! Error types for the RTSP server library.

use std::fmt;

/// Errors that can occur in the RTSP server library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Protocol**: [`Parse`](Self::Parse) — malformed RTSP messages.
/// - **Transport**: [`Io`](Self::Io), [`Tls`](Self::Tls) —
///   socket/network/handshake failures.
/// - **Session**: [`SessionNotFound`](Self::SessionNotFound),
///   [`TransportNotConfigured`](Self::TransportNotConfigured).
/// - **Description**: [`InvalidDescription`](Self::InvalidDescription) —
///   a session description that cannot be advertised (e.g. empty SPS).
/// - **Server/stream lifecycle**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning),
///   [`StreamNotInitialized`](Self::StreamNotInitialized),
///   [`StreamClosed`](Self::StreamClosed),
///   [`Terminated`](Self::Terminated).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration or handshake failure.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// No session with the given ID exists in the
    /// [`SessionManager`](crate::session::SessionManager).
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// SETUP has not been completed for this session (no transport negotiated).
    #[error("transport not configured for session: {0}")]
    TransportNotConfigured(String),

    /// A session description that cannot be served, e.g. an H.264 format
    /// with an empty SPS or PPS, or a description with no media.
    #[error("invalid session description: {0}")]
    InvalidDescription(&'static str),

    /// A server address (RTSP, RTP, RTCP or multicast range) could not
    /// be parsed.
    #[error("invalid server address: {0}")]
    InvalidAddress(&'static str),

    /// [`Server::start`](crate::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// [`ServerStream::initialize`](crate::ServerStream::initialize) has
    /// not been called before writing.
    #[error("stream not initialized")]
    StreamNotInitialized,

    /// The stream was closed; no further samples are accepted.
    #[error("stream closed")]
    StreamClosed,

    /// The server was shut down via [`Server::close`](crate::Server::close)
    /// rather than by a fatal error.
    #[error("server terminated")]
    Terminated,

    /// Failed to parse an RTSP request message (RFC 2326 §6).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
