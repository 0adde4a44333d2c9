//! Session description model.
//!
//! A [`SessionDescription`] is the server-side view of what a stream
//! contains, built by the embedding program before the stream exists and
//! rendered to SDP (RFC 4566) when a client sends DESCRIBE. For now the
//! only supported format is H.264 video.

use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::error::{Result, RtspError};

/// H.264 format parameters for a video media (RFC 6184 §8.1).
///
/// Both parameter sets are the full NAL units, header byte included,
/// without Annex-B start codes. The constructor rejects empty parameter
/// sets: a description must not be built before SPS and PPS are known.
#[derive(Debug, Clone)]
pub struct H264Format {
    payload_type: u8,
    packetization_mode: u8,
    sps: Vec<u8>,
    pps: Vec<u8>,
}

impl H264Format {
    /// Create an H.264 format with the conventional dynamic payload type
    /// 96 and packetization-mode 1.
    pub fn new(sps: Vec<u8>, pps: Vec<u8>) -> Result<Self> {
        if sps.is_empty() {
            return Err(RtspError::InvalidDescription("empty SPS"));
        }
        if pps.is_empty() {
            return Err(RtspError::InvalidDescription("empty PPS"));
        }
        Ok(Self {
            payload_type: 96,
            packetization_mode: 1,
            sps,
            pps,
        })
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn sps(&self) -> &[u8] {
        &self.sps
    }

    pub fn pps(&self) -> &[u8] {
        &self.pps
    }

    /// 90 kHz clock rate per RFC 6184 §8.1.
    pub fn clock_rate(&self) -> u32 {
        90_000
    }

    /// `profile-level-id` from the SPS (RFC 6184 §8.1): bytes 1–3 are
    /// profile_idc, constraint flags and level_idc. `None` when the SPS
    /// is too short to carry them.
    pub fn profile_level_id(&self) -> Option<String> {
        if self.sps.len() < 4 {
            return None;
        }
        Some(format!(
            "{:02x}{:02x}{:02x}",
            self.sps[1], self.sps[2], self.sps[3]
        ))
    }

    /// `sprop-parameter-sets`: base64 SPS and PPS, comma separated.
    pub fn sprop_parameter_sets(&self) -> String {
        format!(
            "{},{}",
            BASE64_STANDARD.encode(&self.sps),
            BASE64_STANDARD.encode(&self.pps)
        )
    }

    /// SDP media-level attribute lines per RFC 6184 §8.2.1.
    ///
    /// `a=rtpmap` must precede `a=fmtp`, which references its payload
    /// type — clients parse these sequentially.
    pub(crate) fn sdp_attributes(&self) -> Vec<String> {
        let mut fmtp = format!(
            "a=fmtp:{} packetization-mode={}",
            self.payload_type, self.packetization_mode
        );
        if let Some(pl) = self.profile_level_id() {
            fmtp.push_str(&format!(";profile-level-id={}", pl));
        }
        fmtp.push_str(&format!(
            ";sprop-parameter-sets={}",
            self.sprop_parameter_sets()
        ));

        vec![
            format!("a=rtpmap:{} H264/{}", self.payload_type, self.clock_rate()),
            fmtp,
            "a=control:track1".to_string(),
        ]
    }
}

/// A single media track inside a session description.
#[derive(Debug, Clone)]
pub struct Media {
    format: H264Format,
}

impl Media {
    /// A video media carrying the given H.264 format.
    pub fn video(format: H264Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &H264Format {
        &self.format
    }
}

/// Description of everything a [`ServerStream`](crate::ServerStream)
/// distributes. Built once, before the stream is created.
#[derive(Debug, Clone)]
pub struct SessionDescription {
    medias: Vec<Media>,
}

impl SessionDescription {
    pub fn new(medias: Vec<Media>) -> Result<Self> {
        if medias.is_empty() {
            return Err(RtspError::InvalidDescription("no medias"));
        }
        Ok(Self { medias })
    }

    pub fn medias(&self) -> &[Media] {
        &self.medias
    }

    /// The video format of the first media. Single-video descriptions
    /// are the only kind currently constructible, so this is total.
    pub fn video_format(&self) -> &H264Format {
        self.medias[0].format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sps() -> Vec<u8> {
        vec![0x67, 0x42, 0xc0, 0x1e, 0x8c]
    }

    fn pps() -> Vec<u8> {
        vec![0x68, 0xce, 0x38, 0x80]
    }

    #[test]
    fn format_requires_both_parameter_sets() {
        assert!(H264Format::new(vec![], pps()).is_err());
        assert!(H264Format::new(sps(), vec![]).is_err());
        assert!(H264Format::new(sps(), pps()).is_ok());
    }

    #[test]
    fn profile_level_id_from_sps() {
        let f = H264Format::new(sps(), pps()).unwrap();
        assert_eq!(f.profile_level_id().unwrap(), "42c01e");
    }

    #[test]
    fn profile_level_id_absent_for_short_sps() {
        let f = H264Format::new(vec![0x67, 0x42], pps()).unwrap();
        assert!(f.profile_level_id().is_none());
    }

    #[test]
    fn sprop_is_base64_sps_comma_pps() {
        let f = H264Format::new(sps(), pps()).unwrap();
        let sprop = f.sprop_parameter_sets();
        let (s, p) = sprop.split_once(',').unwrap();
        assert_eq!(BASE64_STANDARD.decode(s).unwrap(), sps());
        assert_eq!(BASE64_STANDARD.decode(p).unwrap(), pps());
    }

    #[test]
    fn sdp_attributes_ordering() {
        let f = H264Format::new(sps(), pps()).unwrap();
        let attrs = f.sdp_attributes();
        assert!(attrs[0].starts_with("a=rtpmap:96 H264/90000"));
        assert!(attrs[1].starts_with("a=fmtp:96 packetization-mode=1"));
        assert!(attrs[1].contains("sprop-parameter-sets="));
        assert_eq!(attrs[2], "a=control:track1");
    }

    #[test]
    fn description_requires_media() {
        assert!(SessionDescription::new(vec![]).is_err());
        let f = H264Format::new(sps(), pps()).unwrap();
        let desc = SessionDescription::new(vec![Media::video(f)]).unwrap();
        assert_eq!(desc.medias().len(), 1);
    }
}
