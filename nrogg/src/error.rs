use std::io;

/// Errors raised while reading or writing Ogg pages.
///
/// Everything except [`OggError::Io`] describes a problem confined to a
/// single page: the reader can be asked for the next page afterwards and
/// will resynchronise on the following capture pattern.
#[derive(thiserror::Error, Debug)]
pub enum OggError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid Ogg capture pattern")]
    BadCapturePattern,
    #[error("unsupported Ogg version {0}")]
    UnsupportedVersion(u8),
    #[error("CRC32 mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },
    #[error("unexpected EOF while reading page")]
    Truncated,
    #[error("no Ogg sync pattern found in {0} bytes")]
    SyncLost(usize),
    #[error("bad identification header: {0}")]
    BadIdHeader(String),
    #[error("payload of {0} bytes does not fit in a single page")]
    PayloadTooLarge(usize),
}

impl OggError {
    /// Whether reading may continue with the next page.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, OggError::Io(_) | OggError::PayloadTooLarge(_))
    }
}

pub type Result<T> = std::result::Result<T, OggError>;
