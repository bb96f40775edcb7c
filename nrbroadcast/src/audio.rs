//! Audio acquisition from the local media directory.

use crate::collaborators::{AudioSourceProvider, AudioStream};
use crate::error::AudioSourceError;
use crate::models::Track;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::debug;

/// Opens track audio files, resolving relative locators against a media
/// directory.
#[derive(Debug, Clone)]
pub struct FileAudioProvider {
    media_dir: PathBuf,
}

impl FileAudioProvider {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn resolve(&self, track: &Track) -> PathBuf {
        let path = Path::new(&track.audio);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_dir.join(path)
        }
    }
}

#[async_trait]
impl AudioSourceProvider for FileAudioProvider {
    async fn open_audio(&self, track: &Track) -> Result<AudioStream, AudioSourceError> {
        if track.audio.is_empty() {
            return Err(AudioSourceError::Unavailable(track.id.clone()));
        }
        let path = self.resolve(track);
        let file = File::open(&path)
            .await
            .map_err(|source| AudioSourceError::Open {
                path: path.clone(),
                source,
            })?;
        debug!(track = %track.id, path = %path.display(), "audio source opened");
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn track(audio: &str) -> Track {
        Track {
            id: "t1".into(),
            title: "T1".into(),
            performer: String::new(),
            year: 0,
            duration: Duration::from_secs(1),
            audio: audio.into(),
        }
    }

    #[tokio::test]
    async fn test_open_relative_to_media_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.opus"), b"OggS-data").unwrap();
        let provider = FileAudioProvider::new(dir.path());

        let mut stream = provider.open_audio(&track("a.opus")).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"OggS-data");
    }

    #[tokio::test]
    async fn test_absolute_locator_ignores_media_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abs.opus");
        std::fs::write(&file, b"x").unwrap();
        let provider = FileAudioProvider::new("/nonexistent");

        assert_eq!(provider.resolve(&track(file.to_str().unwrap())), file);
        assert!(provider.open_audio(&track(file.to_str().unwrap())).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileAudioProvider::new(dir.path());

        match provider.open_audio(&track("missing.opus")).await {
            Err(AudioSourceError::Open { path, .. }) => {
                assert_eq!(path, dir.path().join("missing.opus"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            provider.open_audio(&track("")).await,
            Err(AudioSourceError::Unavailable(_))
        ));
    }
}
