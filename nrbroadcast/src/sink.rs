//! Output sinks fed by the broadcast loops.
//!
//! A sink receives one [`Sample`] per Ogg page. The default implementation,
//! [`BroadcastSink`], fans every sample out to the transport subscribers
//! attached at that moment.

use crate::error::SinkError;
use crate::models::ChannelId;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

/// One page payload with the audio duration it covers.
#[derive(Clone, PartialEq, Eq)]
pub struct Sample {
    pub data: Bytes,
    pub duration: Duration,
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("bytes", &self.data.len())
            .field("duration", &self.duration)
            .finish()
    }
}

/// Destination of a channel's live audio.
#[async_trait]
pub trait SampleSink: Send + Sync + fmt::Debug {
    /// Delivers one sample. A failure is reported, never retried.
    async fn write_sample(&self, sample: Sample) -> Result<(), SinkError>;

    /// Attaches a new subscriber receiving every later sample.
    fn subscribe(&self) -> Result<broadcast::Receiver<Sample>, SinkError> {
        Err(SinkError::SubscribeUnsupported)
    }

    /// Refuses further writes. Called when the owning session stops.
    fn close(&self) {}

    fn is_closed(&self) -> bool {
        false
    }
}

pub type SinkHandle = Arc<dyn SampleSink>;

/// Creates the sink of a channel when its session starts.
pub trait SinkFactory: Send + Sync {
    fn create_sink(&self, channel_id: &ChannelId) -> SinkHandle;
}

/// Fan-out sink over `tokio::sync::broadcast`.
///
/// Writing with no subscriber attached is fine: the sample is dropped.
/// Subscribers that fall more than `capacity` samples behind lag and skip.
pub struct BroadcastSink {
    sender: broadcast::Sender<Sample>,
    closed: AtomicBool,
    written: AtomicU64,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            closed: AtomicBool::new(false),
            written: AtomicU64::new(0),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Samples accepted since creation.
    pub fn samples_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for BroadcastSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastSink")
            .field("subscribers", &self.sender.receiver_count())
            .field("closed", &self.is_closed())
            .field("written", &self.samples_written())
            .finish()
    }
}

#[async_trait]
impl SampleSink for BroadcastSink {
    async fn write_sample(&self, sample: Sample) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        // Err only means nobody is listening right now
        if let Ok(n) = self.sender.send(sample) {
            trace!(subscribers = n, "sample delivered");
        }
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<Sample>, SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        Ok(self.sender.subscribe())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Builds a [`BroadcastSink`] per channel.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastSinkFactory {
    capacity: usize,
}

impl BroadcastSinkFactory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for BroadcastSinkFactory {
    fn default() -> Self {
        Self::new(crate::constants::SINK_CAPACITY)
    }
}

impl SinkFactory for BroadcastSinkFactory {
    fn create_sink(&self, _channel_id: &ChannelId) -> SinkHandle {
        Arc::new(BroadcastSink::new(self.capacity))
    }
}
