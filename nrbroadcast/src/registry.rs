//! # Live registries
//!
//! Per-channel state published by the running broadcast loops and read by
//! transport and query collaborators:
//!
//! - **sinks**: channel → output sink handle
//! - **offsets**: channel → elapsed time in the current track
//!
//! ## Concurrency
//!
//! Each registry is split into [`REGISTRY_SHARDS`] independently locked
//! shards. A key always maps to the same shard, so operations on one key are
//! linearizable while channels hashing to different shards never contend.
//! Locks are `std::sync::RwLock` held only for a map operation, never across
//! an await point.
//!
//! # Examples
//!
//! ```
//! use nrbroadcast::{BroadcastSink, ChannelId, LiveRegistries};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let registries = LiveRegistries::new();
//! let id = ChannelId::from("jazz");
//! let entry = registries.register(&id, Arc::new(BroadcastSink::new(16))).unwrap();
//!
//! entry.set_offset(Duration::from_millis(40)).unwrap();
//! assert_eq!(registries.get_offset(&id).unwrap(), Duration::from_millis(40));
//! assert!(registries.get_offset(&ChannelId::from("rock")).is_err());
//! ```

use crate::constants::REGISTRY_SHARDS;
use crate::error::RegistryError;
use crate::models::ChannelId;
use crate::sink::{SampleSink, SinkHandle};
use std::collections::HashMap;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

type Shard<V> = RwLock<HashMap<ChannelId, V>>;

/// A concurrent map keyed by channel, sharded to avoid a global lock.
#[derive(Debug)]
pub struct ShardedRegistry<V> {
    shards: Box<[Shard<V>]>,
    hasher: RandomState,
}

impl<V: Clone> ShardedRegistry<V> {
    pub fn new() -> Self {
        Self::with_shards(REGISTRY_SHARDS)
    }

    pub fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &ChannelId) -> &Shard<V> {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        &self.shards[index]
    }

    fn read(&self, key: &ChannelId) -> RwLockReadGuard<'_, HashMap<ChannelId, V>> {
        self.shard(key)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, key: &ChannelId) -> RwLockWriteGuard<'_, HashMap<ChannelId, V>> {
        self.shard(key)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a new entry. Fails if the key is already present.
    pub fn register(&self, key: &ChannelId, value: V) -> Result<(), RegistryError> {
        let mut shard = self.write(key);
        if shard.contains_key(key) {
            return Err(RegistryError::AlreadyRegistered(key.clone()));
        }
        shard.insert(key.clone(), value);
        Ok(())
    }

    pub fn get(&self, key: &ChannelId) -> Result<V, RegistryError> {
        self.read(key)
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    /// Replaces the value of an existing entry.
    pub fn set(&self, key: &ChannelId, value: V) -> Result<(), RegistryError> {
        match self.write(key).get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RegistryError::NotFound(key.clone())),
        }
    }

    pub fn remove(&self, key: &ChannelId) -> Option<V> {
        self.write(key).remove(key)
    }

    pub fn contains(&self, key: &ChannelId) -> bool {
        self.read(key).contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|p| p.into_inner()).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the keys, sorted.
    pub fn keys(&self) -> Vec<ChannelId> {
        let mut keys: Vec<ChannelId> = self
            .shards
            .iter()
            .flat_map(|s| {
                s.read()
                    .unwrap_or_else(|p| p.into_inner())
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        keys.sort();
        keys
    }
}

impl<V: Clone> Default for ShardedRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The sink and offset registries, shared by every loop and every reader.
///
/// Cloning is cheap and yields a handle to the same registries.
#[derive(Debug, Clone, Default)]
pub struct LiveRegistries {
    sinks: Arc<ShardedRegistry<SinkHandle>>,
    offsets: Arc<ShardedRegistry<Duration>>,
}

impl LiveRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims both entries for a channel, with the offset at zero.
    ///
    /// Fails with [`RegistryError::AlreadyRegistered`] when the channel
    /// already has a running session.
    pub fn register(&self, id: &ChannelId, sink: SinkHandle) -> Result<LiveEntry, RegistryError> {
        self.sinks.register(id, sink)?;
        if let Err(e) = self.offsets.register(id, Duration::ZERO) {
            self.sinks.remove(id);
            return Err(e);
        }
        Ok(LiveEntry {
            id: id.clone(),
            registries: self.clone(),
        })
    }

    pub fn get_sink(&self, id: &ChannelId) -> Result<SinkHandle, RegistryError> {
        self.sinks.get(id)
    }

    pub fn get_offset(&self, id: &ChannelId) -> Result<Duration, RegistryError> {
        self.offsets.get(id)
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.sinks.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

/// A session's claim on its registry entries.
///
/// Only the owning loop writes through it. Both entries are removed and the
/// sink closed when the claim is dropped, including when the owning task
/// unwinds.
#[derive(Debug)]
pub struct LiveEntry {
    id: ChannelId,
    registries: LiveRegistries,
}

impl LiveEntry {
    pub fn set_offset(&self, offset: Duration) -> Result<(), RegistryError> {
        self.registries.offsets.set(&self.id, offset)
    }

    /// Removes both entries.
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for LiveEntry {
    fn drop(&mut self) {
        self.registries.offsets.remove(&self.id);
        if let Some(sink) = self.registries.sinks.remove(&self.id) {
            sink.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BroadcastSink;

    fn sink() -> SinkHandle {
        Arc::new(BroadcastSink::new(4))
    }

    #[test]
    fn test_lookup_of_unknown_channel_is_not_found() {
        let registries = LiveRegistries::new();
        let id = ChannelId::from("ghost");

        assert_eq!(
            registries.get_offset(&id).unwrap_err(),
            RegistryError::NotFound(id.clone())
        );
        assert!(matches!(
            registries.get_sink(&id),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_second_registration_is_rejected() {
        let registries = LiveRegistries::new();
        let id = ChannelId::from("c1");
        let _entry = registries.register(&id, sink()).unwrap();

        let err = registries.register(&id, sink()).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(id.clone()));
        assert_eq!(registries.channels(), vec![id]);
    }

    #[test]
    fn test_channels_are_isolated() {
        let registries = LiveRegistries::new();
        let a = registries.register(&ChannelId::from("a"), sink()).unwrap();
        let _b = registries.register(&ChannelId::from("b"), sink()).unwrap();

        a.set_offset(Duration::from_secs(3)).unwrap();

        assert_eq!(
            registries.get_offset(&ChannelId::from("a")).unwrap(),
            Duration::from_secs(3)
        );
        assert_eq!(
            registries.get_offset(&ChannelId::from("b")).unwrap(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_unregister_removes_both_entries() {
        let registries = LiveRegistries::new();
        let id = ChannelId::from("c1");
        let entry = registries.register(&id, sink()).unwrap();
        let held = registries.get_sink(&id).unwrap();

        entry.unregister();

        assert!(registries.get_sink(&id).is_err());
        assert!(registries.get_offset(&id).is_err());
        assert!(registries.is_empty());
        assert!(held.is_closed());
    }

    #[test]
    fn test_entries_are_removed_when_owner_panics() {
        let registries = LiveRegistries::new();
        let id = ChannelId::from("c1");
        let entry = registries.register(&id, sink()).unwrap();
        let held = registries.get_sink(&id).unwrap();

        let owner = std::thread::spawn(move || {
            entry.set_offset(Duration::from_secs(1)).unwrap();
            panic!("loop crashed");
        });
        assert!(owner.join().is_err());

        assert!(registries.get_offset(&id).is_err());
        assert!(registries.is_empty());
        assert!(held.is_closed());
        // The channel can be claimed again
        assert!(registries.register(&id, sink()).is_ok());
    }

    #[test]
    fn test_set_on_missing_key_fails() {
        let registry: ShardedRegistry<u32> = ShardedRegistry::new();
        let id = ChannelId::from("x");
        assert!(registry.set(&id, 1).is_err());
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_concurrent_writers_lose_no_updates() {
        const WRITERS: usize = 64;
        const WRITES: u64 = 500;

        let registry: Arc<ShardedRegistry<u64>> = Arc::new(ShardedRegistry::with_shards(4));
        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = ChannelId::new(format!("channel-{i}"));
                    registry.register(&id, 0).unwrap();
                    for v in 1..=WRITES {
                        registry.set(&id, v * 1_000 + i as u64).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), WRITERS);
        for i in 0..WRITERS {
            let id = ChannelId::new(format!("channel-{i}"));
            assert_eq!(registry.get(&id).unwrap(), WRITES * 1_000 + i as u64);
        }
    }
}
