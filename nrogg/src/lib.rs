//! # nrogg
//!
//! Ogg container plumbing for the NetRadio broadcast engine.
//!
//! The broadcast loop does not decode audio: it forwards Ogg page payloads
//! to live sinks and derives timing from each page's granule position. This
//! crate therefore works at page level:
//!
//! - [`OggPageReader`]: async, non-seeking page reader with optional CRC32
//!   validation and resynchronisation after damaged pages
//! - [`OpusHead`]: the Opus identification header checked when a stream is
//!   opened
//! - [`OggPageWriter`]: builds valid pages, mostly for fixtures and tests
//!
//! ## Example
//!
//! ```no_run
//! use nrogg::{OggPageReader, OggReaderOptions};
//! use tokio::fs::File;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = File::open("track.opus").await?;
//!     let (mut reader, head) = OggPageReader::open(file, OggReaderOptions::default()).await?;
//!     println!("{} channel(s)", head.channel_count);
//!
//!     while let Some(page) = reader.next_page().await? {
//!         println!("granule {} ({} bytes)", page.granule_position, page.payload.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod crc;
pub mod error;
pub mod opus;
pub mod page;
pub mod reader;
pub mod writer;

pub use error::{OggError, Result};
pub use opus::{OPUS_GRANULE_RATE, OpusHead, opus_tags};
pub use page::{NO_GRANULE, OggPage};
pub use reader::{OggPageReader, OggReaderOptions};
pub use writer::OggPageWriter;
