//! Interfaces of the services the engine depends on.
//!
//! Channel persistence, scheduling and media storage live outside the
//! engine. A broadcast loop reaches them only through these traits.

use crate::error::{AudioSourceError, CatalogError};
use crate::models::{ChannelId, Track};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

/// Byte stream of an encoded track, exclusively owned by one loop.
pub type AudioStream = Box<dyn AsyncRead + Send + Unpin>;

/// Lists the channels to broadcast.
#[async_trait]
pub trait ChannelCatalog: Send + Sync {
    /// Called once at startup; a failure aborts the startup.
    async fn list_channels(&self) -> Result<Vec<ChannelId>, CatalogError>;
}

/// Answers "what plays on this channel right now".
#[async_trait]
pub trait ScheduleLookup: Send + Sync {
    /// The track whose schedule window contains `now`, if any.
    ///
    /// Polled continuously by the broadcast loop; errors are treated as
    /// transient.
    async fn current_track(
        &self,
        channel_id: &ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Option<Track>, CatalogError>;
}

/// Opens the encoded audio of a track.
#[async_trait]
pub trait AudioSourceProvider: Send + Sync {
    async fn open_audio(&self, track: &Track) -> Result<AudioStream, AudioSourceError>;
}
