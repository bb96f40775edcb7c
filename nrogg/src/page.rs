use bytes::Bytes;

/// Magic bytes opening every Ogg page.
pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Size of the fixed part of a page header.
pub const HEADER_LEN: usize = 27;

/// Granule value meaning "no packet finishes on this page".
pub const NO_GRANULE: u64 = u64::MAX;

pub const FLAG_CONTINUATION: u8 = 0x01;
pub const FLAG_BEGINNING_OF_STREAM: u8 = 0x02;
pub const FLAG_END_OF_STREAM: u8 = 0x04;

/// A single Ogg page with its payload (segments concatenated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPage {
    pub header_type: u8,
    /// Absolute sample position at the end of the last packet on the page.
    pub granule_position: u64,
    pub serial: u32,
    pub sequence: u32,
    pub payload: Bytes,
}

impl OggPage {
    pub fn is_continuation(&self) -> bool {
        self.header_type & FLAG_CONTINUATION != 0
    }

    pub fn is_beginning_of_stream(&self) -> bool {
        self.header_type & FLAG_BEGINNING_OF_STREAM != 0
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.header_type & FLAG_END_OF_STREAM != 0
    }

    /// The granule position, unless the page carries the "no packet
    /// finishes here" marker.
    pub fn granule(&self) -> Option<u64> {
        (self.granule_position != NO_GRANULE).then_some(self.granule_position)
    }
}

/// Splits a packet length into Ogg lacing values.
///
/// A length that is a multiple of 255 gets a trailing zero so the packet is
/// terminated on this page.
pub(crate) fn lacing_values(len: usize) -> Vec<u8> {
    let mut table = vec![255u8; len / 255];
    table.push((len % 255) as u8);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(header_type: u8, granule_position: u64) -> OggPage {
        OggPage {
            header_type,
            granule_position,
            serial: 1,
            sequence: 0,
            payload: Bytes::new(),
        }
    }

    #[test]
    fn test_flags() {
        let p = page(FLAG_BEGINNING_OF_STREAM | FLAG_END_OF_STREAM, 0);
        assert!(p.is_beginning_of_stream());
        assert!(p.is_end_of_stream());
        assert!(!p.is_continuation());
    }

    #[test]
    fn test_no_granule_marker() {
        assert_eq!(page(0, NO_GRANULE).granule(), None);
        assert_eq!(page(0, 960).granule(), Some(960));
    }

    #[test]
    fn test_lacing_values() {
        assert_eq!(lacing_values(0), vec![0]);
        assert_eq!(lacing_values(100), vec![100]);
        assert_eq!(lacing_values(255), vec![255, 0]);
        assert_eq!(lacing_values(600), vec![255, 255, 90]);
    }
}
