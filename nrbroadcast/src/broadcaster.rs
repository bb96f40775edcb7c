//! Startup orchestration.
//!
//! [`Broadcaster::start_all`] lists the catalog once and launches one loop
//! per channel. It also answers the live queries of transport and API
//! collaborators.

use crate::channel::{ChannelHandle, LoopServices, LoopState, SessionStatus};
use crate::collaborators::{AudioSourceProvider, ChannelCatalog, ScheduleLookup};
use crate::config_ext::BroadcastSettings;
use crate::error::{BroadcastError, RegistryError, Result};
use crate::models::{ChannelId, NowPlaying};
use crate::registry::LiveRegistries;
use crate::sink::{SinkFactory, SinkHandle};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// External services the engine is wired to.
#[derive(Clone)]
pub struct BroadcastServices {
    pub catalog: Arc<dyn ChannelCatalog>,
    pub schedule: Arc<dyn ScheduleLookup>,
    pub audio: Arc<dyn AudioSourceProvider>,
    pub sinks: Arc<dyn SinkFactory>,
}

/// Owns every running broadcast loop.
pub struct Broadcaster {
    registries: LiveRegistries,
    schedule: Arc<dyn ScheduleLookup>,
    channels: BTreeMap<ChannelId, ChannelHandle>,
    cancel: CancellationToken,
}

impl Broadcaster {
    /// Lists the channel catalog and starts one loop per channel.
    ///
    /// Channel status is not consulted: every listed channel gets a loop.
    /// Duplicate identifiers are started once.
    ///
    /// # Errors
    ///
    /// [`BroadcastError::Catalog`] if the catalog cannot be listed. Nothing
    /// has been started in that case.
    pub async fn start_all(
        services: BroadcastServices,
        settings: BroadcastSettings,
        registries: LiveRegistries,
    ) -> Result<Self> {
        let ids = services.catalog.list_channels().await.map_err(|err| {
            error!(error = %err, "Cannot list channels, broadcast not started");
            BroadcastError::Catalog(err)
        })?;

        let cancel = CancellationToken::new();
        let loop_services = LoopServices {
            schedule: Arc::clone(&services.schedule),
            audio: Arc::clone(&services.audio),
        };

        let mut seen = HashSet::new();
        let mut channels = BTreeMap::new();
        for id in ids {
            if !seen.insert(id.clone()) {
                warn!(channel = %id, "Duplicate channel in catalog, skipped");
                continue;
            }

            let sink = services.sinks.create_sink(&id);
            match ChannelHandle::spawn(
                id.clone(),
                &registries,
                sink,
                loop_services.clone(),
                settings.clone(),
                cancel.child_token(),
            ) {
                Ok(handle) => {
                    channels.insert(id, handle);
                }
                Err(err) => {
                    // Another broadcaster sharing these registries owns it
                    warn!(channel = %id, error = %err, "Channel not started");
                }
            }
        }

        info!(channels = channels.len(), "Broadcast started");

        Ok(Self {
            registries,
            schedule: services.schedule,
            channels,
            cancel,
        })
    }

    pub fn registries(&self) -> &LiveRegistries {
        &self.registries
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.keys().cloned().collect()
    }

    pub fn get_sink(&self, id: &ChannelId) -> std::result::Result<SinkHandle, RegistryError> {
        self.registries.get_sink(id)
    }

    pub fn get_offset(&self, id: &ChannelId) -> std::result::Result<Duration, RegistryError> {
        self.registries.get_offset(id)
    }

    pub fn channel_state(&self, id: &ChannelId) -> std::result::Result<LoopState, RegistryError> {
        self.handle(id).map(ChannelHandle::state)
    }

    pub fn session_status(&self, id: &ChannelId) -> std::result::Result<SessionStatus, RegistryError> {
        self.handle(id).map(ChannelHandle::status)
    }

    /// Receiver notified on every status change of a channel's loop.
    pub fn watch_channel(
        &self,
        id: &ChannelId,
    ) -> std::result::Result<watch::Receiver<SessionStatus>, RegistryError> {
        self.handle(id).map(ChannelHandle::watch)
    }

    fn handle(&self, id: &ChannelId) -> std::result::Result<&ChannelHandle, RegistryError> {
        self.channels
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// The track scheduled at `now` on a running channel, with the live
    /// offset as its current time.
    pub async fn now_playing(&self, id: &ChannelId, now: DateTime<Utc>) -> Result<NowPlaying> {
        let current_time = self.registries.get_offset(id)?;
        let track = self
            .schedule
            .current_track(id, now)
            .await
            .map_err(BroadcastError::Schedule)?
            .ok_or_else(|| BroadcastError::NothingScheduled(id.clone()))?;

        Ok(NowPlaying {
            channel_id: id.clone(),
            track_id: track.id,
            title: track.title,
            performer: track.performer,
            year: track.year,
            duration: track.duration,
            current_time,
        })
    }

    /// Stops one channel's loop and waits for it.
    pub async fn stop_channel(&mut self, id: &ChannelId) -> std::result::Result<(), RegistryError> {
        let handle = self
            .channels
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        handle.cancel();
        handle.wait().await;
        Ok(())
    }

    /// Cancels every loop and waits for all of them to release their
    /// resources.
    pub async fn shutdown(self) {
        info!(channels = self.channels.len(), "Stopping broadcast");
        self.cancel.cancel();
        for (_, handle) in self.channels {
            handle.wait().await;
        }
    }
}
