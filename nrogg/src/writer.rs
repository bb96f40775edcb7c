//! Ogg page writer.
//!
//! Produces complete pages (header, lacing table, CRC) for a single logical
//! stream. Every payload is written as one packet that ends on its page.

use crate::{
    crc,
    error::{OggError, Result},
    opus::{OpusHead, opus_tags},
    page::{CAPTURE_PATTERN, FLAG_BEGINNING_OF_STREAM, HEADER_LEN, lacing_values},
};

/// Largest packet that fits on one page with a terminating lacing value.
pub const MAX_PAGE_PAYLOAD: usize = 255 * 254 + 254;

pub struct OggPageWriter {
    serial: u32,
    sequence: u32,
}

impl OggPageWriter {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            sequence: 0,
        }
    }

    /// Encodes one page and advances the page sequence number.
    pub fn page(&mut self, header_type: u8, granule_position: u64, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAGE_PAYLOAD {
            return Err(OggError::PayloadTooLarge(payload.len()));
        }
        let segment_table = lacing_values(payload.len());

        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(CAPTURE_PATTERN);
        header[5] = header_type;
        header[6..14].copy_from_slice(&granule_position.to_le_bytes());
        header[14..18].copy_from_slice(&self.serial.to_le_bytes());
        header[18..22].copy_from_slice(&self.sequence.to_le_bytes());
        header[26] = segment_table.len() as u8;

        let checksum = crc::page_checksum(&header, &segment_table, payload);
        header[22..26].copy_from_slice(&checksum.to_le_bytes());

        self.sequence = self.sequence.wrapping_add(1);

        let mut out = Vec::with_capacity(HEADER_LEN + segment_table.len() + payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&segment_table);
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Writes the two Opus header pages (`OpusHead` then `OpusTags`).
    pub fn opus_headers(&mut self, head: &OpusHead, vendor: &str) -> Result<Vec<u8>> {
        let mut out = self.page(FLAG_BEGINNING_OF_STREAM, 0, &head.to_bytes())?;
        out.extend(self.page(0, 0, &opus_tags(vendor))?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_layout() {
        let mut w = OggPageWriter::new(0xdead_beef);
        let page = w.page(0, 960, &[1, 2, 3]).unwrap();

        assert_eq!(&page[0..4], b"OggS");
        assert_eq!(page[4], 0);
        assert_eq!(u64::from_le_bytes(page[6..14].try_into().unwrap()), 960);
        assert_eq!(page[26], 1);
        assert_eq!(page[27], 3);
        assert_eq!(&page[28..], &[1, 2, 3]);
    }

    #[test]
    fn test_sequence_advances() {
        let mut w = OggPageWriter::new(1);
        let a = w.page(0, 0, b"a").unwrap();
        let b = w.page(0, 0, b"b").unwrap();
        assert_eq!(u32::from_le_bytes(a[18..22].try_into().unwrap()), 0);
        assert_eq!(u32::from_le_bytes(b[18..22].try_into().unwrap()), 1);
    }

    #[test]
    fn test_payload_limit() {
        let mut w = OggPageWriter::new(1);
        assert!(w.page(0, 0, &vec![0u8; MAX_PAGE_PAYLOAD]).is_ok());
        assert!(matches!(
            w.page(0, 0, &vec![0u8; MAX_PAGE_PAYLOAD + 1]),
            Err(OggError::PayloadTooLarge(_))
        ));
    }
}
