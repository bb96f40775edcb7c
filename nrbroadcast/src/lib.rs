//! # nrbroadcast - live multi-channel Opus broadcasting
//!
//! `nrbroadcast` keeps one continuous broadcast loop per radio channel. Each
//! loop asks the schedule what plays now, opens the track's Ogg/Opus audio,
//! and forwards it page by page to the channel's live sink at the 20 ms
//! frame cadence. Elapsed time is read from the pages' granule positions and
//! published per channel.
//!
//! ## Components
//!
//! - [`Broadcaster`]: lists the catalog at startup and spawns the loops
//! - [`ChannelHandle`]: one running loop (AwaitingTrack / Streaming / Backoff)
//! - [`LiveRegistries`]: sharded channel → sink and channel → offset maps
//! - [`BroadcastSink`]: fan-out sink transport sessions subscribe to
//! - [`MemoryCatalog`], [`FileAudioProvider`]: ready-made collaborators
//!
//! ## Quick Start
//!
//! ```no_run
//! use nrbroadcast::{
//!     BroadcastServices, BroadcastSettings, BroadcastSinkFactory, Broadcaster,
//!     FileAudioProvider, LiveRegistries, MemoryCatalog,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(MemoryCatalog::new());
//!     let services = BroadcastServices {
//!         catalog: catalog.clone(),
//!         schedule: catalog,
//!         audio: Arc::new(FileAudioProvider::new("media")),
//!         sinks: Arc::new(BroadcastSinkFactory::default()),
//!     };
//!
//!     let broadcaster =
//!         Broadcaster::start_all(services, BroadcastSettings::default(), LiveRegistries::new())
//!             .await?;
//!
//!     for id in broadcaster.channel_ids() {
//!         println!("{id}: {:?}", broadcaster.get_offset(&id)?);
//!     }
//!
//!     broadcaster.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod broadcaster;
pub mod channel;
pub mod collaborators;
pub mod config_ext;
pub mod constants;
pub mod error;
pub mod memory;
pub mod models;
pub mod registry;
pub mod sink;
pub mod timing;

pub use audio::FileAudioProvider;
pub use broadcaster::{BroadcastServices, Broadcaster};
pub use channel::{ChannelHandle, LoopServices, LoopState, SessionStats, SessionStatus};
pub use collaborators::{AudioSourceProvider, AudioStream, ChannelCatalog, ScheduleLookup};
pub use config_ext::{BroadcastConfigExt, BroadcastSettings};
pub use error::{
    AudioSourceError, BroadcastError, CatalogError, RegistryError, Result, SinkError,
};
pub use memory::{CatalogDocument, MemoryCatalog, ScheduledTrack};
pub use models::{Channel, ChannelId, ChannelStatus, NowPlaying, ScheduleEntry, Track};
pub use registry::{LiveEntry, LiveRegistries, ShardedRegistry};
pub use sink::{BroadcastSink, BroadcastSinkFactory, Sample, SampleSink, SinkFactory, SinkHandle};
pub use timing::{GranuleClock, PageTiming, samples_to_duration};
