// logs.rs
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use nrconfig::Config;
use tracing::Level;
use tracing_subscriber::{
    Registry,
    filter::LevelFilter,
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
};

/// Handle on the installed subscriber, used to change the level at runtime
#[derive(Clone)]
pub struct LogHandle {
    max_level: Arc<RwLock<Level>>,
    reload_handle: reload::Handle<LevelFilter, Registry>,
}

impl LogHandle {
    fn new(level: Level, reload_handle: reload::Handle<LevelFilter, Registry>) -> Self {
        Self {
            max_level: Arc::new(RwLock::new(level)),
            reload_handle,
        }
    }

    pub fn set_max_level(&self, level: Level) -> Result<()> {
        self.reload_handle
            .reload(level_to_levelfilter(level))
            .context("failed to reload log level filter")?;
        *self.max_level.write().unwrap_or_else(|p| p.into_inner()) = level;
        tracing::info!(level = %level, "Log level changed");
        Ok(())
    }

    pub fn max_level(&self) -> Level {
        *self.max_level.read().unwrap_or_else(|p| p.into_inner())
    }
}

/// Installs the global subscriber from the `host.logger` settings
///
/// An unknown level name falls back to TRACE, as does a missing one.
pub fn init_logging(config: &Config) -> Result<LogHandle> {
    let level = config
        .get_log_min_level()
        .ok()
        .and_then(|l| string_to_level(&l))
        .unwrap_or(Level::TRACE);

    let (filter, reload_handle) = reload::Layer::new(level_to_levelfilter(level));
    let subscriber = Registry::default().with(filter);

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let console = enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    subscriber
        .with(console)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(LogHandle::new(level, reload_handle))
}

pub fn string_to_level(s: &str) -> Option<Level> {
    match s.to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    match level {
        Level::ERROR => LevelFilter::ERROR,
        Level::WARN => LevelFilter::WARN,
        Level::INFO => LevelFilter::INFO,
        Level::DEBUG => LevelFilter::DEBUG,
        Level::TRACE => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_level() {
        assert_eq!(string_to_level("info"), Some(Level::INFO));
        assert_eq!(string_to_level("Warn"), Some(Level::WARN));
        assert_eq!(string_to_level("verbose"), None);
    }

    #[test]
    fn test_set_max_level_reloads_filter() {
        let (layer, reload_handle) = reload::Layer::<LevelFilter, Registry>::new(LevelFilter::INFO);
        let handle = LogHandle::new(Level::INFO, reload_handle.clone());

        handle.set_max_level(Level::DEBUG).unwrap();

        assert_eq!(handle.max_level(), Level::DEBUG);
        assert_eq!(reload_handle.clone_current(), Some(LevelFilter::DEBUG));
        drop(layer);
    }

    #[test]
    fn test_reload_fails_once_subscriber_is_gone() {
        let (layer, reload_handle) = reload::Layer::<LevelFilter, Registry>::new(LevelFilter::INFO);
        drop(layer);
        let handle = LogHandle::new(Level::INFO, reload_handle);

        assert!(handle.set_max_level(Level::ERROR).is_err());
        assert_eq!(handle.max_level(), Level::INFO);
    }
}
