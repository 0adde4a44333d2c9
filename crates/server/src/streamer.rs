//! The demux/forward worker.
//!
//! One long-lived thread reads the camera pipe, demuxes it as MPEG-TS,
//! and pushes every video access unit into the server's stream object
//! for fan-out. The pipe is read in blocking mode, so a camera that
//! stops writing simply parks the worker on a read.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rtsp::{RtspError, ServerStream};

use crate::error::Result;
use crate::mpegts::TsDemuxer;

/// Forwards access units from a source path into a [`ServerStream`].
pub struct Streamer {
    stream: Arc<ServerStream>,
    path: PathBuf,
    running: Arc<AtomicBool>,
}

impl Streamer {
    pub fn new(stream: Arc<ServerStream>, path: impl Into<PathBuf>) -> Self {
        Self {
            stream,
            path: path.into(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the source and start the forwarding thread. The open happens
    /// here so a missing or unreadable source fails startup instead of
    /// dying silently on the worker.
    pub fn initialize(&self) -> Result<()> {
        let source = File::open(&self.path)?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(path = %self.path.display(), "streaming from source");

        let stream = self.stream.clone();
        let running = self.running.clone();
        thread::spawn(move || {
            forward_loop(TsDemuxer::new(source), stream, running);
        });
        Ok(())
    }

    /// Stop forwarding. Idempotent. The worker is signaled, not joined:
    /// it may be parked on a blocking pipe read and only notices the
    /// flag at its next access unit.
    pub fn close(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!(path = %self.path.display(), "streamer closing");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn forward_loop(
    mut demuxer: TsDemuxer<File>,
    stream: Arc<ServerStream>,
    running: Arc<AtomicBool>,
) {
    let mut forwarded = 0u64;

    while running.load(Ordering::SeqCst) {
        match demuxer.next_access_unit() {
            Ok(Some(unit)) => match stream.write_access_unit(&unit.data, unit.pts) {
                Ok(_) => forwarded += 1,
                Err(RtspError::StreamClosed) => {
                    tracing::info!("stream closed, stopping forwarder");
                    break;
                }
                Err(e) => tracing::warn!(error = %e, "failed to write access unit"),
            },
            Ok(None) => {
                tracing::info!("source ended");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "demux failed, stopping forwarder");
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    tracing::info!(forwarded, "forwarding loop exited");
}
