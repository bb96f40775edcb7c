//! Error types for the broadcast engine

use crate::models::ChannelId;
use std::path::PathBuf;

/// Result type alias for orchestrator-level operations
pub type Result<T> = std::result::Result<T, BroadcastError>;

/// Errors surfaced to callers of the orchestrator.
///
/// Failures inside a running loop never show up here; they are logged and
/// retried by the loop itself.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The channel catalog could not be listed at startup
    #[error("channel catalog unavailable: {0}")]
    Catalog(#[source] CatalogError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Schedule lookup failed while answering a query
    #[error("schedule lookup failed: {0}")]
    Schedule(#[source] CatalogError),

    /// The channel is running but has no track scheduled right now
    #[error("nothing scheduled on channel {0}")]
    NothingScheduled(ChannelId),
}

/// Live registry lookups and registrations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no running broadcast for channel {0}")]
    NotFound(ChannelId),

    #[error("channel {0} already has a running broadcast")]
    AlreadyRegistered(ChannelId),
}

/// Errors reported by the external catalog and schedule collaborators
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog backend unavailable: {0}")]
    Unavailable(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("unknown track: {0}")]
    UnknownTrack(String),

    #[error("schedule entry for track {track} on {channel} overlaps an existing entry")]
    Overlap { channel: ChannelId, track: String },

    #[error("invalid track duration for {0}")]
    InvalidDuration(String),
}

/// Errors raised while acquiring a track's audio source
#[derive(Debug, thiserror::Error)]
pub enum AudioSourceError {
    #[error("cannot open audio {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio source unavailable for track {0}")]
    Unavailable(String),
}

/// Errors raised by an output sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,

    #[error("sink does not support subscriptions")]
    SubscribeUnsupported,

    #[error("sink write failed: {0}")]
    Write(String),
}
