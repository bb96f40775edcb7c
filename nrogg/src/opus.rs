//! Opus identification header (RFC 7845, section 5.1).

use crate::error::{OggError, Result};

pub const OPUS_HEAD_MAGIC: &[u8; 8] = b"OpusHead";
pub const OPUS_TAGS_MAGIC: &[u8; 8] = b"OpusTags";

/// Minimum length of an `OpusHead` packet.
const OPUS_HEAD_LEN: usize = 19;

/// Opus always decodes at 48 kHz, whatever the input rate was.
pub const OPUS_GRANULE_RATE: u32 = 48_000;

/// Decoded `OpusHead` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    pub version: u8,
    pub channel_count: u8,
    /// Samples (at 48 kHz) to discard from the decoder output at start.
    pub pre_skip: u16,
    /// Sample rate of the original input, informational only.
    pub input_sample_rate: u32,
    /// Q7.8 gain in dB to apply to the decoded output.
    pub output_gain: i16,
    pub mapping_family: u8,
}

impl OpusHead {
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if packet.len() < OPUS_HEAD_LEN {
            return Err(OggError::BadIdHeader(format!(
                "OpusHead packet too short ({} bytes)",
                packet.len()
            )));
        }
        if &packet[0..8] != OPUS_HEAD_MAGIC {
            return Err(OggError::BadIdHeader("missing OpusHead signature".into()));
        }
        let version = packet[8];
        // Major version lives in the high nibble; only 0 is defined
        if version >> 4 != 0 {
            return Err(OggError::BadIdHeader(format!(
                "unsupported OpusHead version {version}"
            )));
        }
        let channel_count = packet[9];
        if channel_count == 0 {
            return Err(OggError::BadIdHeader("OpusHead declares 0 channels".into()));
        }

        Ok(Self {
            version,
            channel_count,
            pre_skip: u16::from_le_bytes([packet[10], packet[11]]),
            input_sample_rate: u32::from_le_bytes([
                packet[12], packet[13], packet[14], packet[15],
            ]),
            output_gain: i16::from_le_bytes([packet[16], packet[17]]),
            mapping_family: packet[18],
        })
    }

    /// Serialises the header for mapping family 0 (mono/stereo).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(OPUS_HEAD_LEN);
        out.extend_from_slice(OPUS_HEAD_MAGIC);
        out.push(self.version);
        out.push(self.channel_count);
        out.extend_from_slice(&self.pre_skip.to_le_bytes());
        out.extend_from_slice(&self.input_sample_rate.to_le_bytes());
        out.extend_from_slice(&self.output_gain.to_le_bytes());
        out.push(self.mapping_family);
        out
    }
}

impl Default for OpusHead {
    fn default() -> Self {
        Self {
            version: 1,
            channel_count: 2,
            pre_skip: 312,
            input_sample_rate: OPUS_GRANULE_RATE,
            output_gain: 0,
            mapping_family: 0,
        }
    }
}

/// Builds a minimal `OpusTags` packet with the given vendor string and no
/// user comments.
pub fn opus_tags(vendor: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + vendor.len());
    out.extend_from_slice(OPUS_TAGS_MAGIC);
    out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    out.extend_from_slice(vendor.as_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out
}
