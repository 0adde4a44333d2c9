use super::rtp::RtpHeader;

const DEFAULT_MTU: usize = 1400;

/// H.264 NAL unit types (low 5 bits of the NAL header byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// Non-IDR slice (P or B frame).
    SliceNonIdr,
    /// IDR slice (keyframe).
    SliceIdr,
    /// Supplemental enhancement information.
    Sei,
    /// Sequence parameter set.
    Sps,
    /// Picture parameter set.
    Pps,
    /// Access unit delimiter.
    Aud,
    /// Anything else.
    Other(u8),
}

impl NalUnitType {
    /// Classify a NAL unit from its header byte.
    pub fn of(nal_header: u8) -> Self {
        match nal_header & 0x1f {
            1 => Self::SliceNonIdr,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            n => Self::Other(n),
        }
    }
}

/// Split an H.264 Annex-B bitstream into NAL units.
///
/// Scans for both 4-byte (`00 00 00 01`) and 3-byte (`00 00 01`) start
/// codes and returns the bytes between them, start codes excluded. The
/// start-code length is tracked per NAL so boundaries stay correct when
/// the two forms are mixed.
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    // (nal_data_start_index, start_code_length)
    let mut starts: Vec<(usize, usize)> = Vec::new();
    let mut i = 0usize;

    while i < data.len() {
        if i + 3 < data.len() && data[i..i + 4] == [0, 0, 0, 1] {
            starts.push((i + 4, 4));
            i += 4;
        } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
            starts.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut nal_units = Vec::with_capacity(starts.len());
    for (idx, &(start, _)) in starts.iter().enumerate() {
        let end = match starts.get(idx + 1) {
            Some(&(next_start, next_sc_len)) => next_start - next_sc_len,
            None => data.len(),
        };
        if start < end {
            nal_units.push(&data[start..end]);
        }
    }
    nal_units
}

/// H.264 RTP packetizer (RFC 6184).
///
/// Converts Annex-B access units into RTP packets using the two
/// packetization modes of RFC 6184:
///
/// - **Single NAL Unit** (§5.6): NALs that fit the MTU go out as-is,
///   12-byte RTP header plus NAL bytes.
/// - **FU-A fragmentation** (§5.8): larger NALs are split across
///   packets, each fragment prefixed by a 2-byte FU indicator/header
///   carrying the start/end flags and the original NAL type.
///
/// The marker bit is set on the last RTP packet of each access unit
/// (RFC 6184 §5.1). SPS/PPS travel out-of-band in the SDP
/// (`sprop-parameter-sets`), so the packetizer carries no codec
/// parameter state of its own.
#[derive(Debug)]
pub struct H264Packetizer {
    header: RtpHeader,
    mtu: usize,
}

impl H264Packetizer {
    /// Create with explicit payload type and SSRC.
    pub fn new(pt: u8, ssrc: u32) -> Self {
        Self {
            header: RtpHeader::new(pt, ssrc),
            mtu: DEFAULT_MTU,
        }
    }

    /// Create with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(pt: u8) -> Self {
        Self {
            header: RtpHeader::with_random_ssrc(pt),
            mtu: DEFAULT_MTU,
        }
    }

    /// Packetize one Annex-B access unit and advance the RTP timestamp
    /// by `timestamp_increment` (90 kHz units) afterwards.
    pub fn packetize(&mut self, access_unit: &[u8], timestamp_increment: u32) -> Vec<Vec<u8>> {
        let nal_units = split_nal_units(access_unit);
        let mut packets = Vec::new();

        for (i, nal) in nal_units.iter().enumerate() {
            let is_last = i == nal_units.len() - 1;
            packets.append(&mut self.packetize_nal(nal, is_last));
        }

        self.header.advance_timestamp(timestamp_increment);

        tracing::trace!(
            nal_count = nal_units.len(),
            rtp_packets = packets.len(),
            au_bytes = access_unit.len(),
            seq = self.header.sequence(),
            ts = self.header.timestamp(),
            "access unit packetized"
        );

        packets
    }

    /// Sequence number of the next packet (for the `RTP-Info` header).
    pub fn next_sequence(&self) -> u16 {
        self.header.sequence()
    }

    /// Timestamp of the next packet (for the `RTP-Info` header).
    pub fn next_rtp_timestamp(&self) -> u32 {
        self.header.timestamp() as u32
    }

    fn packetize_nal(&mut self, nal_unit: &[u8], is_last_nal: bool) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();

        if nal_unit.is_empty() {
            return packets;
        }

        if nal_unit.len() <= self.mtu {
            // Single NAL Unit mode (RFC 6184 §5.6)
            let hdr = self.header.write(is_last_nal);
            let mut packet = Vec::with_capacity(12 + nal_unit.len());
            packet.extend_from_slice(&hdr);
            packet.extend_from_slice(nal_unit);
            packets.push(packet);
        } else {
            // FU-A fragmentation (RFC 6184 §5.8)
            let nal_header = nal_unit[0];
            let nal_type = nal_header & 0x1f;
            let nri = nal_header & 0x60;

            // FU indicator: NRI from the original NAL, type 28 (FU-A)
            let fu_indicator = nri | 28;
            let payload = &nal_unit[1..];

            let max_fragment = self.mtu - 2; // FU indicator + FU header
            let mut offset = 0usize;
            let mut first = true;

            while offset < payload.len() {
                let remaining = payload.len() - offset;
                let last_fragment = remaining <= max_fragment;
                let chunk = &payload[offset..offset + max_fragment.min(remaining)];

                let start_bit = if first { 0x80 } else { 0x00 };
                let end_bit = if last_fragment { 0x40 } else { 0x00 };
                let fu_header = start_bit | end_bit | nal_type;

                let marker = is_last_nal && last_fragment;
                let hdr = self.header.write(marker);

                let mut packet = Vec::with_capacity(12 + 2 + chunk.len());
                packet.extend_from_slice(&hdr);
                packet.push(fu_indicator);
                packet.push(fu_header);
                packet.extend_from_slice(chunk);
                packets.push(packet);

                offset += chunk.len();
                first = false;
            }

            tracing::trace!(
                nal_type,
                nal_size = nal_unit.len(),
                fragments = packets.len(),
                "FU-A fragmented NAL unit"
            );
        }

        packets
    }
}
