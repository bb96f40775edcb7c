use std::io::Cursor;

use nrogg::{OggError, OggPageReader, OggPageWriter, OggReaderOptions, OpusHead};

/// Opus stream of `frames` 20 ms pages, 960 samples each.
fn opus_stream(frames: u64) -> Vec<u8> {
    let mut writer = OggPageWriter::new(42);
    let mut bytes = writer
        .opus_headers(&OpusHead::default(), "nrogg-tests")
        .unwrap();
    for i in 1..=frames {
        let flags = if i == frames { 0x04 } else { 0 };
        bytes.extend(writer.page(flags, i * 960, &[i as u8; 80]).unwrap());
    }
    bytes
}

#[tokio::test]
async fn open_file_and_read_all_pages() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("track.opus");
    tokio::fs::write(&path, opus_stream(50)).await?;

    let file = tokio::fs::File::open(&path).await?;
    let (mut reader, head) = OggPageReader::open(file, OggReaderOptions::default()).await?;
    assert_eq!(head.channel_count, 2);

    // OpusTags comes through as an ordinary page at granule 0
    let tags = reader.next_page().await?.expect("tags page");
    assert_eq!(tags.granule_position, 0);
    assert!(tags.payload.starts_with(b"OpusTags"));

    let mut granules = Vec::new();
    while let Some(page) = reader.next_page().await? {
        granules.push(page.granule_position);
    }
    assert_eq!(granules.len(), 50);
    assert_eq!(granules.first(), Some(&960));
    assert_eq!(granules.last(), Some(&(50 * 960)));
    assert!(granules.windows(2).all(|w| w[0] < w[1]));
    Ok(())
}

#[tokio::test]
async fn open_rejects_non_opus_stream() {
    let mut writer = OggPageWriter::new(1);
    let bytes = writer.page(0x02, 0, b"\x01vorbis header").unwrap();

    let result = OggPageReader::open(Cursor::new(bytes), OggReaderOptions::default()).await;
    assert!(matches!(result, Err(OggError::BadIdHeader(_))));
}

#[tokio::test]
async fn open_rejects_empty_stream() {
    let result = OggPageReader::open(Cursor::new(Vec::new()), OggReaderOptions::default()).await;
    assert!(matches!(result, Err(OggError::BadIdHeader(_))));
}

#[tokio::test]
async fn open_rejects_missing_bos_flag() {
    let mut writer = OggPageWriter::new(1);
    let bytes = writer.page(0, 0, &OpusHead::default().to_bytes()).unwrap();

    let result = OggPageReader::open(Cursor::new(bytes), OggReaderOptions::default()).await;
    assert!(matches!(result, Err(OggError::BadIdHeader(_))));
}

#[tokio::test]
async fn corrupt_page_in_the_middle_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = OggPageWriter::new(9);
    let mut bytes = writer.opus_headers(&OpusHead::default(), "t")?;
    let mut pages = Vec::new();
    for i in 1..=5u64 {
        pages.push(writer.page(0, i * 960, &[0xAB; 40])?);
    }
    // Flip a payload byte of the third audio page
    let last = pages[2].len() - 1;
    pages[2][last] ^= 0x55;
    bytes.extend(pages.concat());

    let (mut reader, _) = OggPageReader::open(Cursor::new(bytes), OggReaderOptions::default()).await?;
    let mut ok = 0;
    let mut errors = 0;
    loop {
        match reader.next_page().await {
            Ok(Some(_)) => ok += 1,
            Ok(None) => break,
            Err(e) => {
                assert!(e.is_recoverable());
                errors += 1;
            }
        }
    }
    // tags + 4 intact audio pages
    assert_eq!(ok, 5);
    assert_eq!(errors, 1);
    Ok(())
}

#[tokio::test]
async fn corrupt_segment_count_loses_only_that_page() -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = OggPageWriter::new(9);
    let mut bytes = writer.opus_headers(&OpusHead::default(), "t")?;
    let mut pages = Vec::new();
    for i in 1..=20u64 {
        let flags = if i == 20 { 0x04 } else { 0 };
        pages.push(writer.page(flags, i * 960, &[0xAB; 40])?);
    }
    // The third audio page now claims five lacing values instead of one,
    // so its data length runs over the following pages
    pages[2][26] = 5;
    bytes.extend(pages.concat());

    let (mut reader, _) = OggPageReader::open(Cursor::new(bytes), OggReaderOptions::default()).await?;
    let mut granules = Vec::new();
    let mut errors = 0;
    loop {
        match reader.next_page().await {
            Ok(Some(page)) => granules.push(page.granule_position),
            Ok(None) => break,
            Err(e) => {
                assert!(matches!(e, OggError::CrcMismatch { .. }));
                errors += 1;
            }
        }
    }

    let expected: Vec<u64> = std::iter::once(0)
        .chain((1..=20u64).filter(|&i| i != 3).map(|i| i * 960))
        .collect();
    assert_eq!(errors, 1);
    assert_eq!(granules, expected);
    Ok(())
}
