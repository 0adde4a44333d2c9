//! MPEG-TS demuxer for the camera pipe.
//!
//! Recovers the H.264 elementary stream from a single-program transport
//! stream: PAT → PMT → the first H.264 (stream type 0x1B) elementary
//! PID. Each PES packet on that PID is one access unit; its payload and
//! 90 kHz presentation timestamp are handed to the caller. Continuity
//! counters and CRCs are not checked, and non-video PIDs are ignored.

use std::io::Read;

use thiserror::Error;

pub const TS_PACKET_SIZE: usize = 188;
const SYNC_BYTE: u8 = 0x47;
const STREAM_TYPE_H264: u8 = 0x1b;
const PAT_PID: u16 = 0;
/// Bytes to scan before giving up on finding a sync byte again.
const RESYNC_LIMIT: usize = TS_PACKET_SIZE * 4;

#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("I/O error reading transport stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("lost transport stream synchronization")]
    LostSync,

    #[error("malformed transport stream: {0}")]
    Malformed(&'static str),
}

/// One video access unit: the Annex-B payload of a single PES packet
/// plus its presentation timestamp on the 90 kHz clock (0 when the PES
/// header carried none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub data: Vec<u8>,
    pub pts: u64,
}

/// Pull-based transport stream demuxer over any byte source.
pub struct TsDemuxer<R: Read> {
    source: R,
    pmt_pid: Option<u16>,
    video_pid: Option<u16>,
    /// Access unit currently being assembled from PES continuation
    /// packets.
    pending: Option<AccessUnit>,
    eof: bool,
}

impl<R: Read> TsDemuxer<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            pmt_pid: None,
            video_pid: None,
            pending: None,
            eof: false,
        }
    }

    /// Next video access unit, in source order. `Ok(None)` means the
    /// source ended cleanly; a unit still being assembled at EOF is
    /// flushed first.
    pub fn next_access_unit(&mut self) -> Result<Option<AccessUnit>, DemuxError> {
        loop {
            if self.eof {
                return Ok(self.pending.take());
            }
            let Some(packet) = self.read_packet()? else {
                self.eof = true;
                continue;
            };
            if let Some(unit) = self.handle_packet(&packet)? {
                return Ok(Some(unit));
            }
        }
    }

    /// Read one 188-byte packet, scanning forward to the sync byte when
    /// alignment was lost. `None` at a clean EOF.
    fn read_packet(&mut self) -> Result<Option<[u8; TS_PACKET_SIZE]>, DemuxError> {
        let mut skipped = 0usize;
        loop {
            let mut byte = [0u8; 1];
            if self.source.read(&mut byte)? == 0 {
                return Ok(None);
            }
            if byte[0] == SYNC_BYTE {
                break;
            }
            skipped += 1;
            if skipped > RESYNC_LIMIT {
                return Err(DemuxError::LostSync);
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "resynchronized to TS sync byte");
        }

        let mut packet = [0u8; TS_PACKET_SIZE];
        packet[0] = SYNC_BYTE;
        self.source.read_exact(&mut packet[1..])?;
        Ok(Some(packet))
    }

    fn handle_packet(
        &mut self,
        packet: &[u8; TS_PACKET_SIZE],
    ) -> Result<Option<AccessUnit>, DemuxError> {
        let pid = (u16::from(packet[1] & 0x1f) << 8) | u16::from(packet[2]);
        let payload_start = packet[1] & 0x40 != 0;
        let afc = (packet[3] >> 4) & 0x3;

        if afc & 0x1 == 0 {
            return Ok(None);
        }
        let mut offset = 4usize;
        if afc & 0x2 != 0 {
            offset += 1 + packet[4] as usize;
            if offset > TS_PACKET_SIZE {
                return Err(DemuxError::Malformed("adaptation field overruns packet"));
            }
        }
        if offset >= TS_PACKET_SIZE {
            return Ok(None);
        }
        let payload = &packet[offset..];

        if pid == PAT_PID {
            if payload_start {
                self.parse_pat(payload)?;
            }
            return Ok(None);
        }
        if Some(pid) == self.pmt_pid {
            if payload_start {
                self.parse_pmt(payload)?;
            }
            return Ok(None);
        }
        if Some(pid) == self.video_pid {
            return self.handle_video_payload(payload, payload_start);
        }
        Ok(None)
    }

    fn parse_pat(&mut self, payload: &[u8]) -> Result<(), DemuxError> {
        let section = psi_section(payload)?;
        if section[0] != 0x00 {
            return Ok(());
        }
        let len = section_length(section)?;
        let end = 3 + len - 4; // stop before CRC

        let mut i = 8;
        while i + 4 <= end {
            let program = (u16::from(section[i]) << 8) | u16::from(section[i + 1]);
            let pid = (u16::from(section[i + 2] & 0x1f) << 8) | u16::from(section[i + 3]);
            if program != 0 {
                if self.pmt_pid != Some(pid) {
                    tracing::debug!(program, pid, "program map located");
                }
                self.pmt_pid = Some(pid);
                return Ok(());
            }
            i += 4;
        }
        Ok(())
    }

    fn parse_pmt(&mut self, payload: &[u8]) -> Result<(), DemuxError> {
        let section = psi_section(payload)?;
        if section[0] != 0x02 {
            return Ok(());
        }
        let len = section_length(section)?;
        let end = 3 + len - 4;
        if section.len() < 12 {
            return Err(DemuxError::Malformed("truncated PMT section"));
        }
        let program_info_len =
            (usize::from(section[10] & 0x0f) << 8) | usize::from(section[11]);

        let mut i = 12 + program_info_len;
        while i + 5 <= end {
            let stream_type = section[i];
            let pid = (u16::from(section[i + 1] & 0x1f) << 8) | u16::from(section[i + 2]);
            let es_info_len =
                (usize::from(section[i + 3] & 0x0f) << 8) | usize::from(section[i + 4]);
            if stream_type == STREAM_TYPE_H264 {
                if self.video_pid != Some(pid) {
                    tracing::debug!(pid, "H.264 elementary stream located");
                }
                self.video_pid = Some(pid);
                return Ok(());
            }
            i += 5 + es_info_len;
        }
        Ok(())
    }

    fn handle_video_payload(
        &mut self,
        payload: &[u8],
        payload_start: bool,
    ) -> Result<Option<AccessUnit>, DemuxError> {
        if payload_start {
            let finished = self.pending.take();
            let (data_offset, pts) = parse_pes_header(payload)?;
            self.pending = Some(AccessUnit {
                data: payload[data_offset..].to_vec(),
                pts,
            });
            return Ok(finished);
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.data.extend_from_slice(payload);
        }
        Ok(None)
    }
}

/// PSI payload → section bytes, skipping the pointer field.
fn psi_section(payload: &[u8]) -> Result<&[u8], DemuxError> {
    let pointer = usize::from(
        *payload
            .first()
            .ok_or(DemuxError::Malformed("empty PSI payload"))?,
    );
    payload
        .get(1 + pointer..)
        .filter(|s| s.len() >= 3)
        .ok_or(DemuxError::Malformed("PSI pointer overruns payload"))
}

fn section_length(section: &[u8]) -> Result<usize, DemuxError> {
    let len = (usize::from(section[1] & 0x0f) << 8) | usize::from(section[2]);
    if len < 9 || 3 + len > section.len() {
        return Err(DemuxError::Malformed("bad PSI section length"));
    }
    Ok(len)
}

/// PES header → (elementary data offset, PTS).
fn parse_pes_header(payload: &[u8]) -> Result<(usize, u64), DemuxError> {
    if payload.len() < 9 || payload[0..3] != [0, 0, 1] {
        return Err(DemuxError::Malformed("PES packet missing start code"));
    }
    let header_len = usize::from(payload[8]);
    let data_offset = 9 + header_len;
    if data_offset > payload.len() {
        return Err(DemuxError::Malformed("PES header overruns packet"));
    }
    let pts = if payload[7] & 0x80 != 0 && header_len >= 5 {
        parse_pts(&payload[9..14])
    } else {
        0
    };
    Ok((data_offset, pts))
}

/// 33-bit PTS from its 5-byte marker-interleaved encoding
/// (ISO 13818-1 §2.4.3.7).
fn parse_pts(b: &[u8]) -> u64 {
    (u64::from((b[0] >> 1) & 0x07) << 30)
        | (u64::from(b[1]) << 22)
        | (u64::from(b[2] >> 1) << 15)
        | (u64::from(b[3]) << 7)
        | u64::from(b[4] >> 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PMT_PID: u16 = 0x0020;
    const VIDEO_PID: u16 = 0x0100;

    fn ts_packet(pid: u16, payload_start: bool, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= 184);
        let mut p = Vec::with_capacity(TS_PACKET_SIZE);
        p.push(SYNC_BYTE);
        p.push(if payload_start { 0x40 } else { 0x00 } | ((pid >> 8) as u8 & 0x1f));
        p.push(pid as u8);

        let stuffing = 184 - payload.len();
        if stuffing == 0 {
            p.push(0x10); // payload only
        } else {
            p.push(0x30); // adaptation field + payload
            let af_len = stuffing - 1;
            p.push(af_len as u8);
            if af_len > 0 {
                p.push(0x00);
                p.extend(std::iter::repeat(0xff).take(af_len - 1));
            }
        }
        p.extend_from_slice(payload);
        assert_eq!(p.len(), TS_PACKET_SIZE);
        p
    }

    fn psi_payload(section: &[u8]) -> Vec<u8> {
        let mut p = vec![0u8]; // pointer field
        p.extend_from_slice(section);
        p
    }

    fn pat_section(pmt_pid: u16) -> Vec<u8> {
        let mut s = vec![0x00];
        let len: u16 = 5 + 4 + 4; // fixed fields + one program + CRC
        s.push(0xb0 | (len >> 8) as u8);
        s.push(len as u8);
        s.extend_from_slice(&[0x00, 0x01]); // transport_stream_id
        s.extend_from_slice(&[0xc1, 0x00, 0x00]); // version/section numbers
        s.extend_from_slice(&[0x00, 0x01]); // program 1
        s.push(0xe0 | (pmt_pid >> 8) as u8);
        s.push(pmt_pid as u8);
        s.extend_from_slice(&[0; 4]); // CRC (not checked)
        s
    }

    fn pmt_section(video_pid: u16) -> Vec<u8> {
        let mut s = vec![0x02];
        let len: u16 = 9 + 5 + 4; // fixed fields + one ES entry + CRC
        s.push(0xb0 | (len >> 8) as u8);
        s.push(len as u8);
        s.extend_from_slice(&[0x00, 0x01]); // program_number
        s.extend_from_slice(&[0xc1, 0x00, 0x00]);
        s.push(0xe0 | (video_pid >> 8) as u8); // PCR PID
        s.push(video_pid as u8);
        s.extend_from_slice(&[0xf0, 0x00]); // program_info_length
        s.push(STREAM_TYPE_H264);
        s.push(0xe0 | (video_pid >> 8) as u8);
        s.push(video_pid as u8);
        s.extend_from_slice(&[0xf0, 0x00]); // ES_info_length
        s.extend_from_slice(&[0; 4]);
        s
    }

    fn encode_pts(pts: u64) -> [u8; 5] {
        [
            0x21 | ((((pts >> 30) & 0x07) as u8) << 1),
            ((pts >> 22) & 0xff) as u8,
            0x01 | ((((pts >> 15) & 0x7f) as u8) << 1),
            ((pts >> 7) & 0xff) as u8,
            0x01 | (((pts & 0x7f) as u8) << 1),
        ]
    }

    fn pes_packet(pts: u64, es: &[u8]) -> Vec<u8> {
        let mut p = vec![0x00, 0x00, 0x01, 0xe0];
        let pes_len = 3 + 5 + es.len();
        p.push((pes_len >> 8) as u8);
        p.push(pes_len as u8);
        p.push(0x80); // '10' marker bits
        p.push(0x80); // PTS present
        p.push(0x05); // header data length
        p.extend_from_slice(&encode_pts(pts));
        p.extend_from_slice(es);
        p
    }

    /// Single-program stream: PAT, PMT, then one PES packet per access
    /// unit, split across TS packets as needed.
    fn mux(access_units: &[(u64, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(ts_packet(PAT_PID, true, &psi_payload(&pat_section(PMT_PID))));
        out.extend(ts_packet(PMT_PID, true, &psi_payload(&pmt_section(VIDEO_PID))));
        for (pts, es) in access_units {
            let pes = pes_packet(*pts, es);
            for (i, chunk) in pes.chunks(184).enumerate() {
                out.extend(ts_packet(VIDEO_PID, i == 0, chunk));
            }
        }
        out
    }

    fn annexb_unit(nal_header: u8, body_len: usize) -> Vec<u8> {
        let mut au = vec![0, 0, 0, 1, nal_header];
        au.extend(vec![0xab; body_len]);
        au
    }

    #[test]
    fn demuxes_access_units_in_order() {
        let aus = vec![
            (90_000u64, annexb_unit(0x65, 40)),
            (93_000, annexb_unit(0x41, 25)),
            (96_000, annexb_unit(0x41, 30)),
        ];
        let ts = mux(&aus);
        let mut demuxer = TsDemuxer::new(&ts[..]);

        for (pts, data) in &aus {
            let unit = demuxer.next_access_unit().unwrap().unwrap();
            assert_eq!(unit.pts, *pts);
            assert_eq!(&unit.data, data);
        }
        assert!(demuxer.next_access_unit().unwrap().is_none());
    }

    #[test]
    fn reassembles_unit_spanning_multiple_packets() {
        let big = annexb_unit(0x65, 1000);
        let ts = mux(&[(45_000, big.clone())]);
        let mut demuxer = TsDemuxer::new(&ts[..]);

        let unit = demuxer.next_access_unit().unwrap().unwrap();
        assert_eq!(unit.data, big);
        assert_eq!(unit.pts, 45_000);
        assert!(demuxer.next_access_unit().unwrap().is_none());
    }

    #[test]
    fn resynchronizes_after_leading_garbage() {
        let mut ts = vec![0xde, 0xad, 0xbe, 0xef];
        ts.extend(mux(&[(90_000, annexb_unit(0x65, 10))]));
        let mut demuxer = TsDemuxer::new(&ts[..]);
        assert!(demuxer.next_access_unit().unwrap().is_some());
    }

    #[test]
    fn unbounded_garbage_is_lost_sync() {
        let ts = vec![0xaa; RESYNC_LIMIT + 64];
        let mut demuxer = TsDemuxer::new(&ts[..]);
        assert!(matches!(
            demuxer.next_access_unit(),
            Err(DemuxError::LostSync)
        ));
    }

    #[test]
    fn empty_source_yields_nothing() {
        let mut demuxer = TsDemuxer::new(&[][..]);
        assert!(demuxer.next_access_unit().unwrap().is_none());
    }

    #[test]
    fn pts_roundtrip_covers_33_bits() {
        let pts = (1u64 << 32) | 0x1234_5678;
        assert_eq!(parse_pts(&encode_pts(pts)), pts);
    }

    #[test]
    fn malformed_pes_start_is_an_error() {
        let mut ts = Vec::new();
        ts.extend(ts_packet(PAT_PID, true, &psi_payload(&pat_section(PMT_PID))));
        ts.extend(ts_packet(PMT_PID, true, &psi_payload(&pmt_section(VIDEO_PID))));
        ts.extend(ts_packet(VIDEO_PID, true, &[0xff; 32]));
        let mut demuxer = TsDemuxer::new(&ts[..]);
        assert!(matches!(
            demuxer.next_access_unit(),
            Err(DemuxError::Malformed(_))
        ));
    }
}
