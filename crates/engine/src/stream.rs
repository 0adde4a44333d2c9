//! The live media session object.
//!
//! A [`ServerStream`] is created by the embedding program once codec
//! parameters are known, initialized, and then fed H.264 access units.
//! The stream packetizes each unit once and fans the RTP packets out to
//! every playing subscriber: unicast sessions get their own copy,
//! multicast sessions share a single transmission to the group.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::description::SessionDescription;
use crate::error::{Result, RtspError};
use crate::media::H264Packetizer;
use crate::server::{Server, ServerCore};
use crate::session::DeliveryMode;

/// RTP timestamp increment used when no PTS delta is available
/// (first access unit, or a backward PTS jump): one frame at 30 fps
/// on the 90 kHz clock.
const FALLBACK_TS_INCREMENT: u32 = 3000;

#[derive(Debug, PartialEq, Eq)]
enum StreamState {
    Created,
    Initialized,
    Closed,
}

/// A distributable media session, shared between the program's sample
/// writer and the server's session fan-out.
pub struct ServerStream {
    core: Arc<ServerCore>,
    description: SessionDescription,
    packetizer: Mutex<H264Packetizer>,
    subscribers: RwLock<Vec<String>>,
    state: Mutex<StreamState>,
    last_pts: Mutex<Option<u64>>,
}

impl ServerStream {
    /// Create a stream served by `server`, advertising `description`.
    pub fn new(server: &Server, description: SessionDescription) -> Self {
        let pt = description.video_format().payload_type();
        Self {
            core: server.core().clone(),
            description,
            packetizer: Mutex::new(H264Packetizer::with_random_ssrc(pt)),
            subscribers: RwLock::new(Vec::new()),
            state: Mutex::new(StreamState::Created),
            last_pts: Mutex::new(None),
        }
    }

    /// Make the stream writable. Must be called before
    /// [`write_access_unit`](Self::write_access_unit).
    pub fn initialize(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            StreamState::Created => {
                *state = StreamState::Initialized;
                tracing::debug!("stream initialized");
                Ok(())
            }
            StreamState::Initialized => Ok(()),
            StreamState::Closed => Err(RtspError::StreamClosed),
        }
    }

    pub fn description(&self) -> &SessionDescription {
        &self.description
    }

    /// Number of sessions currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Sequence number of the next RTP packet (RTP-Info).
    pub fn next_sequence(&self) -> u16 {
        self.packetizer.lock().next_sequence()
    }

    /// Timestamp of the next RTP packet (RTP-Info).
    pub fn next_rtp_timestamp(&self) -> u32 {
        self.packetizer.lock().next_rtp_timestamp()
    }

    pub(crate) fn subscribe(&self, session_id: &str) {
        let mut ids = self.subscribers.write();
        if !ids.iter().any(|id| id == session_id) {
            ids.push(session_id.to_string());
            tracing::debug!(session_id, "session subscribed to stream");
        }
    }

    pub(crate) fn unsubscribe(&self, session_id: &str) {
        let mut ids = self.subscribers.write();
        if let Some(pos) = ids.iter().position(|id| id == session_id) {
            ids.swap_remove(pos);
            tracing::debug!(session_id, "session unsubscribed from stream");
        }
    }

    /// Packetize one Annex-B access unit and deliver it to every playing
    /// subscriber. `pts` is the unit's presentation timestamp on the
    /// 90 kHz clock; consecutive deltas drive the RTP timestamp.
    ///
    /// Returns the number of RTP packet transmissions performed.
    /// Per-client send failures are logged and skipped; only lifecycle
    /// errors (closed or uninitialized stream, server not started)
    /// propagate.
    pub fn write_access_unit(&self, access_unit: &[u8], pts: u64) -> Result<usize> {
        match *self.state.lock() {
            StreamState::Initialized => {}
            StreamState::Created => return Err(RtspError::StreamNotInitialized),
            StreamState::Closed => return Err(RtspError::StreamClosed),
        }

        let increment = {
            let mut last = self.last_pts.lock();
            let inc = match *last {
                Some(prev) if pts > prev => (pts - prev).min(u32::MAX as u64) as u32,
                _ => FALLBACK_TS_INCREMENT,
            };
            *last = Some(pts);
            inc
        };

        let packets = self.packetizer.lock().packetize(access_unit, increment);

        let udp_guard = self.core.udp.read();
        let udp = udp_guard.as_ref().ok_or(RtspError::NotStarted)?;

        // Resolve playing subscribers to delivery targets.
        let mut unicast_targets = Vec::new();
        let mut multicast = false;
        for id in self.subscribers.read().iter() {
            let Some(session) = self.core.session_manager.get_session(id) else {
                continue;
            };
            if !session.is_playing() {
                continue;
            }
            match session.get_transport().map(|t| t.mode) {
                Some(DeliveryMode::Unicast { client_rtp }) => unicast_targets.push(client_rtp),
                Some(DeliveryMode::Multicast) => multicast = true,
                None => {}
            }
        }

        let mut sent = 0usize;
        for packet in &packets {
            for addr in &unicast_targets {
                match udp.send_to(packet, *addr) {
                    Ok(_) => sent += 1,
                    Err(e) => tracing::warn!(%addr, error = %e, "RTP send failed"),
                }
            }
            if multicast {
                match udp.send_multicast(
                    packet,
                    self.core.multicast_group,
                    self.core.config.multicast_rtp_port,
                ) {
                    Ok(_) => sent += 1,
                    Err(e) => tracing::warn!(error = %e, "multicast RTP send failed"),
                }
            }
        }

        Ok(sent)
    }

    /// Close the stream. Idempotent; subsequent writes return
    /// [`RtspError::StreamClosed`].
    pub fn close(&self) {
        let mut state = self.state.lock();
        if *state == StreamState::Closed {
            return;
        }
        *state = StreamState::Closed;
        self.subscribers.write().clear();
        tracing::info!("stream closed");
    }
}
