//! # nrconfig
//!
//! YAML configuration for NetRadio. The embedded `netradio.yaml` defaults
//! are overlaid with `config.yaml` from the configuration directory, then
//! with `NETRADIO_CONFIG__SECTION__KEY=value` environment variables. Every
//! change made through a setter is written back to `config.yaml`.
//!
//! ## Usage
//!
//! ```no_run
//! use nrconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! let media = config.get_media_dir()?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Feature crates extend [`Config`] through extension traits that read their
//! own subtree (see `nrbroadcast::BroadcastConfigExt`).

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("netradio.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load NetRadio configuration"));
}

const ENV_CONFIG_DIR: &str = "NETRADIO_CONFIG";
const ENV_PREFIX: &str = "NETRADIO_CONFIG__";
const DEFAULT_DIR_NAME: &str = ".netradio";

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_MEDIA_DIR: &str = "media";
const DEFAULT_CATALOG_FILE: &str = "catalog.yaml";

/// Generates a getter/setter pair for `u64` values with a default.
///
/// The getter persists the default when the key is missing or malformed.
#[macro_export]
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        fn $getter(&self) -> anyhow::Result<u64> {
            match self.get_value($path) {
                Ok(serde_yaml::Value::Number(n)) if n.is_u64() => Ok(n.as_u64().unwrap_or($default)),
                _ => {
                    self.$setter($default)?;
                    Ok($default)
                }
            }
        }

        fn $setter(&self, value: u64) -> anyhow::Result<()> {
            self.set_value($path, serde_yaml::Value::Number(serde_yaml::Number::from(value)))
        }
    };
}

/// Generates a getter/setter pair for `bool` values with a default.
#[macro_export]
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        fn $getter(&self) -> anyhow::Result<bool> {
            match self.get_value($path) {
                Ok(serde_yaml::Value::Bool(b)) => Ok(b),
                _ => {
                    self.$setter($default)?;
                    Ok($default)
                }
            }
        }

        fn $setter(&self, value: bool) -> anyhow::Result<()> {
            self.set_value($path, serde_yaml::Value::Bool(value))
        }
    };
}

/// Configuration manager for NetRadio
///
/// Holds the merged YAML tree behind a mutex and writes every change back to
/// `config.yaml` in the configuration directory.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(DEFAULT_DIR_NAME).exists() {
            return DEFAULT_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(DEFAULT_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        DEFAULT_DIR_NAME.to_string()
    }

    /// Creates the directory if needed and checks it is readable and writable
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `NETRADIO_CONFIG` environment variable
    /// 3. `.netradio` in the current directory
    /// 4. `.netradio` in the user's home directory
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// The embedded defaults are merged with `config.yaml` (when present),
    /// keys are lower-cased, `NETRADIO_CONFIG__*` overrides are applied and
    /// the merged result is saved back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "logger", "min_level"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(&Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        Self::apply_overrides(
            config,
            env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)),
        );
    }

    fn apply_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            let key_path = key
                .trim_start_matches(ENV_PREFIX)
                .split("__")
                .collect::<Vec<_>>();
            let yaml_value = Self::convert_env_value(&value);
            let _ = Self::set_value_internal(config, &key_path, yaml_value);
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Resolves a path relative to the config directory and creates it
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<String> {
        let path = Path::new(dir_path);
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.config_dir).join(path)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory = %absolute_path.display(), "Created managed directory");
        }

        Ok(absolute_path.to_string_lossy().to_string())
    }

    /// Gets a directory managed by the configuration
    ///
    /// The directory may be absolute or relative to the configuration
    /// directory. It is created if it doesn't exist, and `default` is
    /// persisted when the key is missing.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) => s,
            _ => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };
        self.resolve_and_create_dir(&dir_path)
    }

    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    /// Directory the audio locators of tracks are resolved against
    pub fn get_media_dir(&self) -> Result<String> {
        self.get_managed_dir(&["media", "directory"], DEFAULT_MEDIA_DIR)
    }

    /// Path of the YAML catalog file, resolved against the config directory
    pub fn get_catalog_file(&self) -> Result<String> {
        let file = match self.get_value(&["catalog", "file"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => {
                self.set_value(
                    &["catalog", "file"],
                    Value::String(DEFAULT_CATALOG_FILE.to_string()),
                )?;
                DEFAULT_CATALOG_FILE.to_string()
            }
        };
        let path = Path::new(&file);
        if path.is_absolute() {
            Ok(file)
        } else {
            Ok(Path::new(&self.config_dir)
                .join(path)
                .to_string_lossy()
                .to_string())
        }
    }

    /// Minimum log level (`ERROR`, `WARN`, `INFO`, `DEBUG` or `TRACE`)
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"])? {
            Value::String(s) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    pub fn get_log_enable_console(&self) -> Result<bool> {
        match self.get_value(&["host", "logger", "enable_console"])? {
            Value::Bool(b) => Ok(b),
            _ => Ok(DEFAULT_LOG_ENABLE_CONSOLE),
        }
    }
}

/// Returns the global configuration instance
///
/// The configuration is lazily loaded on first access.
///
/// # Panics
///
/// Panics on first access if the configuration directory cannot be created
/// or the YAML cannot be parsed.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
