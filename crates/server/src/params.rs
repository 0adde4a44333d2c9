//! H.264 codec parameter extraction from the camera pipe.
//!
//! Before any RTSP client can be answered, the server needs the SPS and
//! PPS parameter sets to build the session description. The camera pipe
//! carries them in-band as Annex-B NAL units, so startup scans the
//! pipe's raw bytes until both have been seen, bounded by a deadline.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rtsp::media::{NalUnitType, split_nal_units};

use crate::error::{Result, ServerError};

const READ_CHUNK: usize = 4096;

/// H.264 sequence and picture parameter sets, exactly as they appeared
/// in the source bitstream (NAL header byte included, start codes
/// stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264Parameters {
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

/// Scan `path` for SPS and PPS NAL units, giving up after `timeout`.
///
/// Opening a named pipe blocks until the writer side appears, and reads
/// block until data arrives, so the scan runs on its own thread and the
/// caller waits on a channel with the deadline. On timeout the scan
/// thread is abandoned (it holds only the pipe handle, which the
/// process exit releases).
pub fn extract_h264_parameters(path: &Path, timeout: Duration) -> Result<H264Parameters> {
    let (tx, rx) = mpsc::channel();
    let scan_path = path.to_path_buf();

    thread::spawn(move || {
        let _ = tx.send(scan_source(&scan_path));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(ServerError::ExtractTimeout {
            path: path.display().to_string(),
            timeout,
        }),
    }
}

fn scan_source(path: &Path) -> Result<H264Parameters> {
    let mut source = File::open(path)?;
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut sps: Option<Vec<u8>> = None;
    let mut pps: Option<Vec<u8>> = None;

    loop {
        let n = source.read(&mut chunk)?;
        let at_eof = n == 0;
        buf.extend_from_slice(&chunk[..n]);

        // The final unit has no terminating start code and may still be
        // arriving, so it only counts as complete once the source ends.
        let units = split_nal_units(&buf);
        let complete = if at_eof {
            units.len()
        } else {
            units.len().saturating_sub(1)
        };
        for unit in &units[..complete] {
            match unit.first().map(|b| NalUnitType::of(*b)) {
                Some(NalUnitType::Sps) if sps.is_none() => {
                    tracing::debug!(len = unit.len(), "found SPS");
                    sps = Some(unit.to_vec());
                }
                Some(NalUnitType::Pps) if pps.is_none() => {
                    tracing::debug!(len = unit.len(), "found PPS");
                    pps = Some(unit.to_vec());
                }
                _ => {}
            }
        }

        if let (Some(sps), Some(pps)) = (sps.clone(), pps.clone()) {
            return Ok(H264Parameters { sps, pps });
        }
        if at_eof {
            return Err(ServerError::ParametersNotFound);
        }
    }
}
