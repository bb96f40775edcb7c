//! Per-channel broadcast loop.
//!
//! Each channel runs one task cycling through three states:
//!
//! - **AwaitingTrack**: poll the schedule, open the current track's audio
//!   and check its Opus header
//! - **Streaming**: read one page per pacing tick, forward it to the sink
//!   and publish the elapsed offset
//! - **Backoff**: wait after a transient failure, then poll again
//!
//! Nothing inside the loop is fatal. The task only stops when its
//! cancellation token fires, at which point it drops the open audio source
//! and removes the channel's registry entries.

use crate::collaborators::{AudioSourceProvider, AudioStream, ScheduleLookup};
use crate::config_ext::BroadcastSettings;
use crate::error::RegistryError;
use crate::models::{ChannelId, Track};
use crate::registry::{LiveEntry, LiveRegistries};
use crate::sink::{Sample, SinkHandle};
use crate::timing::GranuleClock;
use chrono::Utc;
use nrogg::OggPageReader;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle state of a broadcast loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    AwaitingTrack,
    Streaming,
    Backoff,
}

/// Counters accumulated over the life of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub tracks_started: u64,
    pub pages_delivered: u64,
    pub pages_skipped: u64,
    pub sink_failures: u64,
    pub backoffs: u64,
}

/// Snapshot published by a loop after every state change and page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: LoopState,
    /// Track being streamed, set while `state` is `Streaming`
    pub track_id: Option<String>,
    pub stats: SessionStats,
}

/// Collaborators a loop needs to run.
#[derive(Clone)]
pub struct LoopServices {
    pub schedule: Arc<dyn ScheduleLookup>,
    pub audio: Arc<dyn AudioSourceProvider>,
}

/// Handle to a running broadcast loop.
pub struct ChannelHandle {
    id: ChannelId,
    status: watch::Receiver<SessionStatus>,
    cancel: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl ChannelHandle {
    /// Claims the channel's registry entries and starts its loop.
    ///
    /// The entries exist from the moment this returns. Fails with
    /// [`RegistryError::AlreadyRegistered`] if the channel already runs.
    pub fn spawn(
        id: ChannelId,
        registries: &LiveRegistries,
        sink: SinkHandle,
        services: LoopServices,
        settings: BroadcastSettings,
        cancel: CancellationToken,
    ) -> Result<Self, RegistryError> {
        let entry = registries.register(&id, Arc::clone(&sink))?;
        let (status_tx, status) = watch::channel(SessionStatus::default());

        let session = BroadcastSession {
            id: id.clone(),
            entry,
            sink,
            services,
            settings,
            status: status_tx,
        };
        let join_handle = tokio::spawn(session.run(cancel.clone()));

        Ok(Self {
            id,
            status,
            cancel,
            join_handle,
        })
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn state(&self) -> LoopState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every published status.
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Waits for the task to end. Only returns after [`cancel`](Self::cancel).
    pub async fn wait(self) {
        if let Err(err) = self.join_handle.await {
            if err.is_cancelled() {
                warn!(channel = %self.id, "Broadcast task aborted: {err}");
            } else {
                error!(channel = %self.id, "Broadcast task panicked: {err}");
            }
        }
    }
}

/// What the AwaitingTrack step decided.
enum NextStep {
    Idle,
    Backoff,
    Stream(Track, OggPageReader<AudioStream>),
}

/// How a track's streaming ended.
enum StreamEnd {
    Finished,
    Failed,
}

struct BroadcastSession {
    id: ChannelId,
    entry: LiveEntry,
    sink: SinkHandle,
    services: LoopServices,
    settings: BroadcastSettings,
    status: watch::Sender<SessionStatus>,
}

impl BroadcastSession {
    async fn run(mut self, cancel: CancellationToken) {
        info!(channel = %self.id, "Broadcast loop started");

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.cycle() => {}
        }

        self.set_state(LoopState::AwaitingTrack, None);
        self.entry.unregister();
        info!(channel = %self.id, "Broadcast loop stopped");
    }

    /// Runs the state machine until the future is dropped.
    async fn cycle(&mut self) {
        loop {
            self.set_state(LoopState::AwaitingTrack, None);

            match self.next_track().await {
                NextStep::Idle => sleep(self.settings.idle_poll_delay).await,
                NextStep::Backoff => self.backoff().await,
                NextStep::Stream(track, reader) => {
                    if let StreamEnd::Failed = self.stream(track, reader).await {
                        self.backoff().await;
                    }
                }
            }
        }
    }

    async fn backoff(&mut self) {
        self.set_state(LoopState::Backoff, None);
        self.status.send_modify(|s| s.stats.backoffs += 1);
        debug!(channel = %self.id, delay = ?self.settings.backoff_delay, "Backing off");
        sleep(self.settings.backoff_delay).await;
    }

    async fn next_track(&self) -> NextStep {
        let now = Utc::now();
        let track = match self.services.schedule.current_track(&self.id, now).await {
            Ok(Some(track)) => track,
            Ok(None) => {
                trace!(channel = %self.id, "Nothing scheduled");
                return NextStep::Idle;
            }
            Err(err) => {
                error!(channel = %self.id, error = %err, "Schedule lookup failed");
                return NextStep::Backoff;
            }
        };

        let stream = match self.services.audio.open_audio(&track).await {
            Ok(stream) => stream,
            Err(err) => {
                error!(channel = %self.id, track = %track.id, error = %err, "Cannot open track audio");
                return NextStep::Backoff;
            }
        };

        match OggPageReader::open(stream, self.settings.reader_options.clone()).await {
            Ok((reader, head)) => {
                debug!(
                    channel = %self.id,
                    track = %track.id,
                    channels = head.channel_count,
                    pre_skip = head.pre_skip,
                    "Opus header parsed"
                );
                NextStep::Stream(track, reader)
            }
            Err(err) => {
                error!(channel = %self.id, track = %track.id, error = %err, "Invalid Ogg/Opus header");
                NextStep::Backoff
            }
        }
    }

    /// Streams one track, one page per pacing tick.
    ///
    /// The reader is consumed: the audio source is released as soon as the
    /// end of the stream is seen.
    async fn stream(&mut self, track: Track, mut reader: OggPageReader<AudioStream>) -> StreamEnd {
        info!(
            channel = %self.id,
            track = %track.id,
            title = %track.title,
            performer = %track.performer,
            "Track started"
        );
        self.set_state(LoopState::Streaming, Some(track.id.clone()));
        self.status.send_modify(|s| s.stats.tracks_started += 1);

        let mut clock = GranuleClock::new();
        self.publish_offset(Duration::ZERO);

        let mut ticker = interval(self.settings.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let page = match reader.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => {
                    drop(reader);
                    info!(
                        channel = %self.id,
                        track = %track.id,
                        elapsed = ?clock.elapsed(),
                        "Track finished"
                    );
                    return StreamEnd::Finished;
                }
                Err(err) if err.is_recoverable() => {
                    warn!(channel = %self.id, track = %track.id, error = %err, "Skipping damaged page");
                    self.status.send_modify(|s| s.stats.pages_skipped += 1);
                    continue;
                }
                Err(err) => {
                    drop(reader);
                    error!(channel = %self.id, track = %track.id, error = %err, "Audio source failed");
                    return StreamEnd::Failed;
                }
            };

            let timing = clock.advance(page.granule());
            let sample = Sample {
                data: page.payload,
                duration: timing.page_duration,
            };

            match self.sink.write_sample(sample).await {
                Ok(()) => self.status.send_modify(|s| s.stats.pages_delivered += 1),
                Err(err) => {
                    warn!(channel = %self.id, error = %err, "Sink write failed");
                    self.status.send_modify(|s| s.stats.sink_failures += 1);
                }
            }

            self.publish_offset(timing.elapsed);
        }
    }

    fn publish_offset(&self, offset: Duration) {
        if let Err(err) = self.entry.set_offset(offset) {
            debug!(channel = %self.id, error = %err, "Offset not published");
        }
    }

    fn set_state(&self, state: LoopState, track_id: Option<String>) {
        self.status.send_if_modified(|s| {
            if s.state == state && s.track_id == track_id {
                return false;
            }
            trace!(channel = %self.id, from = ?s.state, to = ?state, "State change");
            s.state = state;
            s.track_id = track_id;
            true
        });
    }
}
