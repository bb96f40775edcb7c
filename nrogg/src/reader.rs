//! # Streaming Ogg page reader
//!
//! `OggPageReader` pulls pages one at a time out of any `AsyncRead`, without
//! seeking, so it works on files as well as network streams.
//!
//! 1. Optionally searches for the "OggS" sync pattern
//! 2. Reads the 27-byte page header
//! 3. Reads the segment table and page data
//! 4. Optionally validates the CRC32 checksum
//! 5. Returns the page with its granule position
//!
//! A damaged page yields an error for that page only. The reader then drops
//! back to sync search, so the next call returns the next intact page.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::{
    crc,
    error::{OggError, Result},
    opus::OpusHead,
    page::{CAPTURE_PATTERN, FLAG_END_OF_STREAM, HEADER_LEN, OggPage},
};

/// Maximum number of bytes scanned per call while searching for the sync
/// pattern.
const MAX_SYNC_SEARCH: usize = 64 * 1024;

/// Configuration options for the page reader.
#[derive(Clone, Debug)]
pub struct OggReaderOptions {
    /// Whether to validate CRC32 checksums of Ogg pages.
    pub validate_crc: bool,

    /// Whether to search for "OggS" at the start of the stream, which
    /// tolerates leading garbage.
    pub find_sync: bool,

    /// Maximum bytes to scan per sync search.
    pub max_sync_search: usize,
}

impl Default for OggReaderOptions {
    fn default() -> Self {
        Self {
            validate_crc: true,
            find_sync: true,
            max_sync_search: MAX_SYNC_SEARCH,
        }
    }
}

/// Lazy, finite sequence of Ogg pages read from a byte stream.
///
/// The reader owns the stream; dropping the reader releases it.
pub struct OggPageReader<R> {
    reader: R,
    /// Bytes already pulled from `reader` but not consumed yet.
    pending: Vec<u8>,
    synced: bool,
    finished: bool,
    options: OggReaderOptions,
    pages_read: u64,
}

impl<R> OggPageReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a reader positioned at the start of `reader`.
    pub fn new(reader: R, options: OggReaderOptions) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            synced: !options.find_sync,
            finished: false,
            options,
            pages_read: 0,
        }
    }

    /// Creates a reader and consumes the Opus identification page.
    ///
    /// Fails if the stream is empty, the first page is damaged, or it does
    /// not carry a valid `OpusHead` packet.
    pub async fn open(reader: R, options: OggReaderOptions) -> Result<(Self, OpusHead)> {
        let mut this = Self::new(reader, options);
        let first = this
            .next_page()
            .await?
            .ok_or_else(|| OggError::BadIdHeader("stream contains no pages".into()))?;

        if !first.is_beginning_of_stream() {
            return Err(OggError::BadIdHeader(
                "first page is not a beginning-of-stream page".into(),
            ));
        }
        let head = OpusHead::parse(&first.payload)?;
        debug!(
            channels = head.channel_count,
            pre_skip = head.pre_skip,
            input_rate = head.input_sample_rate,
            "Opened Ogg/Opus stream"
        );
        Ok((this, head))
    }

    /// Number of intact pages returned so far.
    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    /// Returns the next page, or `None` once the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the underlying stream fails ([`OggError::Io`], not recoverable)
    /// - the page structure is invalid or truncated
    /// - CRC32 validation fails (if enabled)
    ///
    /// After a recoverable error the next call continues with the following
    /// page.
    pub async fn next_page(&mut self) -> Result<Option<OggPage>> {
        if self.finished {
            return Ok(None);
        }

        if !self.synced && !self.find_sync().await? {
            self.finished = true;
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        match self.read_exact_or_eof(&mut header).await? {
            0 => {
                self.finished = true;
                return Ok(None);
            }
            n if n < HEADER_LEN => return Err(OggError::Truncated),
            _ => {}
        }

        if &header[0..4] != CAPTURE_PATTERN {
            self.desync(&header[1..]);
            return Err(OggError::BadCapturePattern);
        }
        if header[4] != 0 {
            self.desync(&header[1..]);
            return Err(OggError::UnsupportedVersion(header[4]));
        }

        let header_type = header[5];
        let mut granule = [0u8; 8];
        granule.copy_from_slice(&header[6..14]);
        let granule_position = u64::from_le_bytes(granule);
        let serial = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
        let sequence = u32::from_le_bytes([header[18], header[19], header[20], header[21]]);

        // A damaged length field may swallow the pages that follow, so
        // every rejected byte goes back for rescanning.
        let page_segments = header[26] as usize;
        let mut segment_table = vec![0u8; page_segments];
        let n = self.read_exact_or_eof(&mut segment_table).await?;
        if n < page_segments {
            self.desync_all(&[&header[1..], &segment_table[..n]]);
            return Err(OggError::Truncated);
        }

        let data_len: usize = segment_table.iter().map(|&v| v as usize).sum();
        let mut data = vec![0u8; data_len];
        let n = self.read_exact_or_eof(&mut data).await?;
        if n < data_len {
            self.desync_all(&[&header[1..], &segment_table[..], &data[..n]]);
            return Err(OggError::Truncated);
        }

        if self.options.validate_crc {
            let expected = u32::from_le_bytes([header[22], header[23], header[24], header[25]]);
            let mut crc_header = header;
            crc_header[22..26].copy_from_slice(&[0, 0, 0, 0]);
            let actual = crc::page_checksum(&crc_header, &segment_table, &data);
            if actual != expected {
                self.desync_all(&[&header[1..], &segment_table[..], &data[..]]);
                return Err(OggError::CrcMismatch { expected, actual });
            }
        }

        if header_type & FLAG_END_OF_STREAM != 0 {
            self.finished = true;
        }

        self.pages_read += 1;
        trace!(sequence, granule_position, len = data_len, "Read Ogg page");

        Ok(Some(OggPage {
            header_type,
            granule_position,
            serial,
            sequence,
            payload: Bytes::from(data),
        }))
    }

    /// Pushes bytes back for rescanning and drops out of sync.
    fn desync(&mut self, rest: &[u8]) {
        self.desync_all(&[rest]);
    }

    fn desync_all(&mut self, parts: &[&[u8]]) {
        let mut pending = parts.concat();
        pending.append(&mut self.pending);
        self.pending = pending;
        self.synced = false;
    }

    /// Fills `buf` from pending bytes then the stream. Returns the number of
    /// bytes read, which is smaller than `buf.len()` only at end of stream.
    async fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;

        if !self.pending.is_empty() {
            let to_copy = buf.len().min(self.pending.len());
            buf[..to_copy].copy_from_slice(&self.pending[..to_copy]);
            self.pending.drain(..to_copy);
            total += to_copy;
        }

        while total < buf.len() {
            match self.reader.read(&mut buf[total..]).await? {
                0 => break,
                n => total += n,
            }
        }

        Ok(total)
    }

    /// Searches for the "OggS" pattern and leaves it at the front of the
    /// pending buffer.
    ///
    /// Returns `Ok(false)` when the stream ends before a pattern is found.
    async fn find_sync(&mut self) -> Result<bool> {
        let mut scanned = 0usize;
        loop {
            if let Some(pos) = self
                .pending
                .windows(CAPTURE_PATTERN.len())
                .position(|window| window == CAPTURE_PATTERN)
            {
                if pos > 0 {
                    debug!(skipped = scanned + pos, "Resynchronised on Ogg capture pattern");
                }
                self.pending.drain(..pos);
                self.synced = true;
                return Ok(true);
            }

            // "OggS" may straddle two chunks: keep the last 3 bytes
            if self.pending.len() > 3 {
                let cut = self.pending.len() - 3;
                self.pending.drain(..cut);
                scanned += cut;
            }
            if scanned >= self.options.max_sync_search {
                return Err(OggError::SyncLost(scanned));
            }

            let mut chunk = [0u8; 1024];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(false);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::OggPageWriter;
    use std::io::Cursor;

    fn stream_of(pages: &[Vec<u8>]) -> Cursor<Vec<u8>> {
        Cursor::new(pages.concat())
    }

    #[tokio::test]
    async fn test_reads_pages_in_order() {
        let mut w = OggPageWriter::new(7);
        let pages = vec![
            w.page(0, 960, b"one").unwrap(),
            w.page(0, 1920, b"two").unwrap(),
        ];
        let mut reader = OggPageReader::new(stream_of(&pages), OggReaderOptions::default());

        let first = reader.next_page().await.unwrap().unwrap();
        assert_eq!(first.granule_position, 960);
        assert_eq!(&first.payload[..], b"one");
        assert_eq!(first.serial, 7);

        let second = reader.next_page().await.unwrap().unwrap();
        assert_eq!(second.granule_position, 1920);
        assert_eq!(second.sequence, 1);

        assert!(reader.next_page().await.unwrap().is_none());
        assert!(reader.next_page().await.unwrap().is_none());
        assert_eq!(reader.pages_read(), 2);
    }

    #[tokio::test]
    async fn test_leading_garbage_is_skipped() {
        let mut w = OggPageWriter::new(1);
        let mut bytes = b"ID3 junk".to_vec();
        bytes.extend(w.page(0, 960, b"audio").unwrap());
        let mut reader = OggPageReader::new(Cursor::new(bytes), OggReaderOptions::default());

        let page = reader.next_page().await.unwrap().unwrap();
        assert_eq!(&page.payload[..], b"audio");
    }

    #[tokio::test]
    async fn test_crc_mismatch_is_recoverable() {
        let mut w = OggPageWriter::new(1);
        let good = w.page(0, 960, b"first").unwrap();
        let mut bad = w.page(0, 1920, b"second").unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0xff;
        let after = w.page(0, 2880, b"third").unwrap();

        let mut reader =
            OggPageReader::new(stream_of(&[good, bad, after]), OggReaderOptions::default());
        assert!(reader.next_page().await.unwrap().is_some());

        let err = reader.next_page().await.unwrap_err();
        assert!(matches!(err, OggError::CrcMismatch { .. }));
        assert!(err.is_recoverable());

        let page = reader.next_page().await.unwrap().unwrap();
        assert_eq!(page.granule_position, 2880);
    }

    #[tokio::test]
    async fn test_crc_validation_can_be_disabled() {
        let mut w = OggPageWriter::new(1);
        let mut bad = w.page(0, 960, b"payload").unwrap();
        bad[22] ^= 0xff;
        let options = OggReaderOptions {
            validate_crc: false,
            ..Default::default()
        };
        let mut reader = OggPageReader::new(Cursor::new(bad), options);
        assert!(reader.next_page().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bad_capture_pattern_resyncs() {
        let mut w = OggPageWriter::new(1);
        let mut broken = w.page(0, 960, b"broken").unwrap();
        broken[0] = b'X';
        let good = w.page(0, 1920, b"good").unwrap();
        let options = OggReaderOptions {
            find_sync: false,
            ..Default::default()
        };
        let mut reader = OggPageReader::new(stream_of(&[broken, good]), options);

        assert!(matches!(
            reader.next_page().await,
            Err(OggError::BadCapturePattern)
        ));
        let page = reader.next_page().await.unwrap().unwrap();
        assert_eq!(&page.payload[..], b"good");
    }

    #[tokio::test]
    async fn test_truncated_page_then_end() {
        let mut w = OggPageWriter::new(1);
        let mut page = w.page(0, 960, b"cut short").unwrap();
        page.truncate(page.len() - 4);
        let mut reader = OggPageReader::new(Cursor::new(page), OggReaderOptions::default());

        assert!(matches!(reader.next_page().await, Err(OggError::Truncated)));
        assert!(reader.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_of_stream_flag_finishes() {
        let mut w = OggPageWriter::new(1);
        let last = w.page(FLAG_END_OF_STREAM, 960, b"last").unwrap();
        let trailing = w.page(0, 1920, b"ignored").unwrap();
        let mut reader =
            OggPageReader::new(stream_of(&[last, trailing]), OggReaderOptions::default());

        assert!(reader.next_page().await.unwrap().unwrap().is_end_of_stream());
        assert!(reader.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_has_no_pages() {
        let mut reader = OggPageReader::new(Cursor::new(Vec::new()), OggReaderOptions::default());
        assert!(reader.next_page().await.unwrap().is_none());
    }
}
