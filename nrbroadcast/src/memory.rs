//! In-memory channel catalog and schedule.
//!
//! Backs small deployments (loaded from a YAML catalog file) and tests.

use crate::collaborators::{ChannelCatalog, ScheduleLookup};
use crate::error::CatalogError;
use crate::models::{Channel, ChannelId, ChannelStatus, ScheduleEntry, Track};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    channels: Vec<Channel>,
    tracks: HashMap<String, Track>,
    /// Per channel, sorted by start time
    schedule: HashMap<ChannelId, Vec<ScheduleEntry>>,
}

/// Channel, track and schedule store implementing the catalog and schedule
/// collaborators.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: RwLock<Inner>,
}

/// Serialized form of a catalog, as found in `catalog.yaml`.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub schedule: Vec<ScheduledTrack>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduledTrack {
    pub channel: ChannelId,
    pub track: String,
    pub start: DateTime<Utc>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from its document, validating every schedule entry.
    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        let catalog = Self::new();
        for channel in document.channels {
            catalog.add_channel(channel);
        }
        for track in document.tracks {
            catalog.add_track(track);
        }
        for entry in document.schedule {
            catalog.add_track_to_schedule(&entry.channel, &entry.track, entry.start)?;
        }
        Ok(catalog)
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Adds a channel, replacing one with the same identifier.
    pub fn add_channel(&self, channel: Channel) {
        let mut inner = self.write();
        match inner.channels.iter_mut().find(|c| c.id == channel.id) {
            Some(existing) => *existing = channel,
            None => inner.channels.push(channel),
        }
    }

    pub fn channel(&self, id: &ChannelId) -> Option<Channel> {
        self.read().channels.iter().find(|c| &c.id == id).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.read().channels.clone()
    }

    /// Starts or stops a channel.
    pub fn set_channel_status(
        &self,
        id: &ChannelId,
        status: ChannelStatus,
    ) -> Result<(), CatalogError> {
        let mut inner = self.write();
        let channel = inner
            .channels
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| CatalogError::UnknownChannel(id.clone()))?;
        channel.status = status;
        Ok(())
    }

    pub fn add_track(&self, track: Track) {
        self.write().tracks.insert(track.id.clone(), track);
    }

    pub fn track(&self, id: &str) -> Option<Track> {
        self.read().tracks.get(id).cloned()
    }

    /// Schedules `track_id` on `channel_id` from `start` for the track's
    /// duration.
    ///
    /// Entries of a channel never overlap; a colliding entry is rejected.
    pub fn add_track_to_schedule(
        &self,
        channel_id: &ChannelId,
        track_id: &str,
        start: DateTime<Utc>,
    ) -> Result<ScheduleEntry, CatalogError> {
        let mut inner = self.write();
        if !inner.channels.iter().any(|c| &c.id == channel_id) {
            return Err(CatalogError::UnknownChannel(channel_id.clone()));
        }
        let track = inner
            .tracks
            .get(track_id)
            .ok_or_else(|| CatalogError::UnknownTrack(track_id.to_string()))?;
        let duration = chrono::Duration::from_std(track.duration)
            .ok()
            .filter(|d| *d > chrono::Duration::zero())
            .ok_or_else(|| CatalogError::InvalidDuration(track_id.to_string()))?;
        let end = start
            .checked_add_signed(duration)
            .ok_or_else(|| CatalogError::InvalidDuration(track_id.to_string()))?;

        let entry = ScheduleEntry {
            channel_id: channel_id.clone(),
            track_id: track_id.to_string(),
            start,
            end,
        };

        let entries = inner.schedule.entry(channel_id.clone()).or_default();
        if entries.iter().any(|e| e.overlaps(&entry)) {
            return Err(CatalogError::Overlap {
                channel: channel_id.clone(),
                track: track_id.to_string(),
            });
        }
        let position = entries.partition_point(|e| e.start < entry.start);
        entries.insert(position, entry.clone());

        debug!(channel = %channel_id, track = track_id, start = %entry.start, end = %entry.end, "track scheduled");
        Ok(entry)
    }

    pub fn schedule(&self, channel_id: &ChannelId) -> Vec<ScheduleEntry> {
        self.read()
            .schedule
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The entry covering `now` on a channel.
    pub fn current_entry(&self, channel_id: &ChannelId, now: DateTime<Utc>) -> Option<ScheduleEntry> {
        self.read()
            .schedule
            .get(channel_id)?
            .iter()
            .find(|e| e.contains(now))
            .cloned()
    }
}

#[async_trait]
impl ChannelCatalog for MemoryCatalog {
    async fn list_channels(&self) -> Result<Vec<ChannelId>, CatalogError> {
        Ok(self.read().channels.iter().map(|c| c.id.clone()).collect())
    }
}

#[async_trait]
impl ScheduleLookup for MemoryCatalog {
    async fn current_track(
        &self,
        channel_id: &ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Option<Track>, CatalogError> {
        let Some(entry) = self.current_entry(channel_id, now) else {
            return Ok(None);
        };
        self.track(&entry.track_id)
            .map(Some)
            .ok_or(CatalogError::UnknownTrack(entry.track_id))
    }
}
