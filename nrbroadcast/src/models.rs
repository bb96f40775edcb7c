//! Data model shared with the external catalog collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Whether the channel is open for scheduling.
///
/// The status does not decide whether a broadcast loop runs: every catalog
/// channel gets one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    #[default]
    Stopped,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub status: ChannelStatus,
}

impl Channel {
    pub fn new(id: impl Into<ChannelId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            logo: None,
            status: ChannelStatus::default(),
        }
    }
}

/// A playable track. Immutable once a running loop picked it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub performer: String,
    #[serde(default)]
    pub year: i32,
    /// Nominal duration, used to compute schedule windows
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Audio source locator (path, relative to the media directory or absolute)
    pub audio: String,
}

/// A time-windowed assignment of a track to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub channel_id: ChannelId,
    pub track_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduleEntry {
    /// Whether `now` falls in `[start, end)`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    pub fn overlaps(&self, other: &ScheduleEntry) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// What a channel is playing right now, with the live position in the track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub channel_id: ChannelId,
    pub track_id: String,
    pub title: String,
    pub performer: String,
    pub year: i32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(with = "duration_secs")]
    pub current_time: Duration,
}

/// (De)serialises a `Duration` as fractional seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
