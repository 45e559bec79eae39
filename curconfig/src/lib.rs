//! # Curator Configuration Module
//!
//! This module provides configuration management for Curator, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! Domain crates add their own typed accessors through extension traits on
//! [`Config`] (see `curplaylist::PlaylistConfigExt`).
//!
//! ## Usage
//!
//! ```no_run
//! use curconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! let playlists = config.get_managed_dir(&["playlists", "directory"], "playlists")?;
//! config.set_log_enable_console(false)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("curator.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(Config::load_or_default(""));
}

const ENV_CONFIG_DIR: &str = "CURATOR_CONFIG";
const ENV_PREFIX: &str = "CURATOR_CONFIG__";
const CONFIG_FILE_NAME: &str = "config.yaml";
const DEFAULT_DIR_NAME: &str = ".curator";

// Default values for configuration
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for signed values with default
macro_rules! impl_i64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<i64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_i64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: i64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                Ok(Value::String(s)) => Ok(matches!(s.trim(), "true" | "1" | "yes")),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for Curator
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// A `Config` built with [`Config::in_memory`] has no backing file: setters
/// update the in-memory tree and `save` is a no-op.
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

// Implémentation manuelle de Clone
impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock_data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> PathBuf {
        // 1. Try provided directory
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        // 3. Try current directory
        if Path::new(DEFAULT_DIR_NAME).exists() {
            return PathBuf::from(DEFAULT_DIR_NAME);
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(DEFAULT_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        // Default fallback
        PathBuf::from(DEFAULT_DIR_NAME)
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
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
    /// 2. The `CURATOR_CONFIG` environment variable
    /// 3. `.curator` in the current directory
    /// 4. `.curator` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<PathBuf> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(&dir_path)?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present and well-formed
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    ///
    /// A malformed `config.yaml` is not fatal: it is reported with a warning and
    /// the embedded defaults are used instead.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => match serde_yaml::from_slice::<Value>(&data) {
                Ok(external_value) => {
                    info!(config_file = %path.display(), "Loaded config file");
                    merge_yaml(&mut default_value, &external_value);
                }
                Err(e) => {
                    warn!(
                        config_file = %path.display(),
                        "Malformed config file ({}), using default embedded config",
                        e
                    );
                }
            },
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        let mut config_value = Self::lower_keys_value(default_value);
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds a configuration holding only the embedded defaults, not backed by any file
    ///
    /// Managed directories are resolved relative to `config_dir`.
    pub fn in_memory(config_dir: impl Into<PathBuf>) -> Self {
        let value = serde_yaml::from_str::<Value>(DEFAULT_CONFIG)
            .map(Self::lower_keys_value)
            .unwrap_or_else(|_| Value::Mapping(Mapping::new()));
        Config {
            config_dir: config_dir.into(),
            path: None,
            data: Mutex::new(value),
        }
    }

    /// Loads the configuration, degrading to in-memory defaults when the
    /// configuration directory cannot be used
    pub fn load_or_default(directory: &str) -> Self {
        match Self::load_config(directory) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load Curator configuration: {}, using in-memory defaults", e);
                Self::in_memory(Self::find_config_dir(directory))
            }
        }
    }

    fn lock_data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the directory holding `config.yaml` and the other state files
    pub fn directory(&self) -> &Path {
        &self.config_dir
    }

    /// Returns the path of the backing `config.yaml`, if any
    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Saves the current configuration to the config.yaml file
    ///
    /// The file is written next to its final location and renamed into place.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = {
            let data = self.lock_data();
            serde_yaml::to_string(&*data)?
        };
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["schedule", "time"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock_data();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        let Some((first, rest)) = path.split_first() else {
            *data = value;
            return Ok(());
        };
        if let Value::Mapping(map) = data {
            let key_value = Value::String(first.to_lowercase());
            if rest.is_empty() {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                if !entry.is_mapping() {
                    *entry = Value::Mapping(Mapping::new());
                }
                Self::set_value_internal(entry, rest, value)?;
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
        let data = self.lock_data();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var = %key, "Ignoring environment override: {}", e);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Résout un chemin relatif ou absolu et crée le répertoire si nécessaire
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<PathBuf> {
        let path = Path::new(dir_path);

        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            // Chemin relatif : le résoudre par rapport à config_dir
            self.config_dir.join(path)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory = %absolute_path.display(), "Created managed directory");
        }

        Ok(absolute_path)
    }

    /// Récupère un répertoire géré par la configuration
    ///
    /// Le répertoire peut être absolu ou relatif au répertoire de
    /// configuration. Il sera créé s'il n'existe pas.
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin dans l'arbre de configuration (ex: `&["playlists", "directory"]`)
    /// * `default` - Nom de répertoire par défaut si non configuré
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };
        self.resolve_and_create_dir(&dir_path)
    }

    /// Définit un répertoire géré par la configuration
    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    /// Résout un fichier d'état relatif au répertoire de configuration
    ///
    /// Contrairement à [`Config::get_managed_dir`], le fichier n'est pas créé.
    pub fn get_managed_file(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let file = match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => {
                self.set_value(path, Value::String(default.to_string()))?;
                default.to_string()
            }
        };
        let file_path = Path::new(&file);
        if file_path.is_absolute() {
            Ok(file_path.to_path_buf())
        } else {
            Ok(self.config_dir.join(file_path))
        }
    }

    /// Reads a list of strings, accepting either a YAML sequence or a comma separated string
    pub fn get_string_list(&self, path: &[&str]) -> Result<Option<Vec<String>>> {
        match self.get_value(path) {
            Ok(Value::Sequence(seq)) => Ok(Some(
                seq.into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            )),
            Ok(Value::String(s)) => Ok(Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            _ => Ok(None),
        }
    }

    impl_u64_config!(
        get_service_tick_secs,
        set_service_tick_secs,
        &["service", "tick_secs"],
        60
    );

    impl_u64_config!(
        get_memory_threshold_percent,
        set_memory_threshold_percent,
        &["service", "memory_threshold_percent"],
        85
    );

    impl_bool_config!(
        get_pause_during_playback,
        set_pause_during_playback,
        &["service", "pause_during_playback"],
        true
    );

    impl_i64_config!(
        get_max_backups,
        set_max_backups,
        &["playlists", "max_backups"],
        3
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance
///
/// The instance is lazily loaded on first access; if the configuration
/// directory cannot be used, an in-memory default configuration is returned.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, it merges keys from external into default
/// - For scalars and sequences, external values replace default values
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
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in(dir: &Path) -> Config {
        Config::load_config(dir.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults_are_embedded() {
        let config = Config::in_memory("/tmp/curator-test");
        assert_eq!(config.get_service_tick_secs().unwrap(), 60);
        assert_eq!(config.get_memory_threshold_percent().unwrap(), 85);
        assert_eq!(config.get_max_backups().unwrap(), 3);
        assert!(config.get_pause_during_playback().unwrap());
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
    }

    #[test]
    fn test_load_writes_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(dir.path());
        assert!(dir.path().join("config.yaml").exists());
        assert_eq!(config.file_path(), Some(dir.path().join("config.yaml").as_path()));
    }

    #[test]
    fn test_external_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "service:\n  Tick_Secs: 15\n",
        )
        .unwrap();

        let config = load_in(dir.path());
        assert_eq!(config.get_service_tick_secs().unwrap(), 15);
        // Les autres clés gardent leur valeur par défaut
        assert_eq!(config.get_memory_threshold_percent().unwrap(), 85);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "service: [unbalanced\n").unwrap();

        let config = load_in(dir.path());
        assert_eq!(config.get_service_tick_secs().unwrap(), 60);
    }

    #[test]
    fn test_set_value_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(dir.path());
        config.set_max_backups(-1).unwrap();

        let reloaded = load_in(dir.path());
        assert_eq!(reloaded.get_max_backups().unwrap(), -1);
    }

    #[test]
    fn test_service_and_logging_setters_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(dir.path());
        config.set_service_tick_secs(5).unwrap();
        config.set_memory_threshold_percent(70).unwrap();
        config.set_pause_during_playback(false).unwrap();
        config.set_log_enable_console(false).unwrap();
        config.set_log_min_level("DEBUG".to_string()).unwrap();

        let reloaded = load_in(dir.path());
        assert_eq!(reloaded.get_service_tick_secs().unwrap(), 5);
        assert_eq!(reloaded.get_memory_threshold_percent().unwrap(), 70);
        assert!(!reloaded.get_pause_during_playback().unwrap());
        assert!(!reloaded.get_log_enable_console().unwrap());
        assert_eq!(reloaded.get_log_min_level().unwrap(), "DEBUG");
    }

    #[test]
    fn test_get_value_missing_path() {
        let config = Config::in_memory("/tmp/curator-test");
        assert!(config.get_value(&["nope", "missing"]).is_err());
    }

    #[test]
    fn test_managed_dir_is_created_relative_to_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(dir.path());
        let managed = config
            .get_managed_dir(&["playlists", "directory"], "playlists")
            .unwrap();
        assert_eq!(managed, dir.path().join("playlists"));
        assert!(managed.is_dir());
    }

    #[test]
    fn test_string_list_accepts_csv_and_sequence() {
        let config = Config::in_memory("/tmp/curator-test");
        let players = config
            .get_string_list(&["service", "player_processes"])
            .unwrap()
            .unwrap();
        assert_eq!(players, vec!["kodi", "mpv", "vlc"]);

        config
            .set_value(&["service", "player_processes"], Value::String("a, b,,c".into()))
            .unwrap();
        let players = config
            .get_string_list(&["service", "player_processes"])
            .unwrap()
            .unwrap();
        assert_eq!(players, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_yaml_replaces_scalars() {
        let mut base: Value = serde_yaml::from_str("a: 1\nb: {c: 2, d: 3}\n").unwrap();
        let ext: Value = serde_yaml::from_str("b: {c: 5}\ne: x\n").unwrap();
        merge_yaml(&mut base, &ext);
        let cfg = Config {
            config_dir: PathBuf::from("."),
            path: None,
            data: Mutex::new(base),
        };
        assert_eq!(cfg.get_value(&["b", "c"]).unwrap(), Value::from(5));
        assert_eq!(cfg.get_value(&["b", "d"]).unwrap(), Value::from(3));
        assert_eq!(cfg.get_value(&["e"]).unwrap(), Value::from("x"));
    }
}
