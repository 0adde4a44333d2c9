use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;

use rtsp::{ServerHandler, ServerStream};

use crate::gate::ReadyGate;

/// Session-lifecycle adapter between the RTSP server and the startup
/// sequence.
///
/// DESCRIBE and SETUP block on the readiness gate until startup has
/// extracted codec parameters and initialized the stream; clients that
/// connect early are simply held, not refused. Once the gate is open
/// both callbacks hand out the single live stream.
#[derive(Default)]
pub struct StreamerHandler {
    gate: ReadyGate,
    stream: RwLock<Option<Arc<ServerStream>>>,
}

impl StreamerHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the live stream clients will be served.
    pub fn set_stream(&self, stream: Arc<ServerStream>) {
        *self.stream.write() = Some(stream);
    }

    /// Open the readiness gate. Call only after the stream is installed
    /// and initialized.
    pub fn ready(&self) {
        self.gate.open();
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_open()
    }
}

impl ServerHandler for StreamerHandler {
    fn on_connect(&self, peer: SocketAddr) {
        tracing::debug!(%peer, ready = self.is_ready(), "client connected");
    }

    fn on_describe(&self, uri: &str) -> Option<Arc<ServerStream>> {
        self.gate.wait();
        tracing::debug!(uri, "serving session description");
        self.stream.read().clone()
    }

    fn on_setup(&self, uri: &str) -> Option<Arc<ServerStream>> {
        self.gate.wait();
        tracing::debug!(uri, "negotiating session transport");
        self.stream.read().clone()
    }

    fn on_play(&self, session_id: &str) {
        tracing::info!(session_id, "client playing");
    }

    fn on_teardown(&self, session_id: &str) {
        tracing::info!(session_id, "client tore down session");
    }
}
