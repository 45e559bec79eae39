//! Extension de curconfig pour les playlists
//!
//! Ce module fournit le trait `PlaylistConfigExt` qui ajoute à
//! `curconfig::Config` les accès typés aux sections `playlists`, `schedule`
//! et `service`.
//!
//! # Corrections automatiques
//!
//! Une valeur de planning malformée n'est jamais fatale : elle est remplacée
//! par une valeur sûre (`time` → `03:00`, `interval` → quotidien,
//! `last_run` → absent) avec un avertissement, et la correction est persistée.
//!
//! # Exemple
//!
//! ```no_run
//! use curconfig::get_config;
//! use curplaylist::PlaylistConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let schedule = config.get_schedule()?;
//! if schedule.enabled {
//!     println!("Next run at {} ({})", schedule.time, schedule.interval);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDateTime;
use curconfig::Config;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::live::LiveSettings;
use crate::policy::{default_snapshot, SettingsSnapshot};
use crate::schedule::{format_timestamp, parse_timestamp, IntervalKind, SchedulePolicy, TimeOfDay};
use crate::service::ServiceSettings;

const DEFAULT_PLAYER_PROCESSES: &[&str] = &["kodi", "mpv", "vlc"];

/// Trait d'extension pour curconfig::Config
pub trait PlaylistConfigExt {
    /// Répertoire des manifestes (créé si besoin)
    fn playlist_dir(&self) -> Result<PathBuf>;

    /// Chemin du document des sets
    fn sets_file_path(&self) -> Result<PathBuf>;

    /// Lit le planning, en corrigeant les valeurs malformées
    fn get_schedule(&self) -> Result<SchedulePolicy>;

    fn set_schedule_enabled(&self, enabled: bool) -> Result<()>;

    fn set_schedule_interval(&self, interval: IntervalKind) -> Result<()>;

    fn set_schedule_time(&self, time: TimeOfDay) -> Result<()>;

    /// Enregistre la date de la dernière exécution réussie
    fn record_schedule_run(&self, at: NaiveDateTime) -> Result<()>;

    /// Réglages de la boucle de service
    fn get_service_settings(&self) -> Result<ServiceSettings>;
}

impl PlaylistConfigExt for Config {
    fn playlist_dir(&self) -> Result<PathBuf> {
        self.get_managed_dir(&["playlists", "directory"], "playlists")
    }

    fn sets_file_path(&self) -> Result<PathBuf> {
        self.get_managed_file(&["playlists", "sets_file"], "playlist_sets.json")
    }

    fn get_schedule(&self) -> Result<SchedulePolicy> {
        let enabled = match self.get_value(&["schedule", "enabled"]) {
            Ok(Value::Bool(b)) => b,
            Ok(Value::String(s)) => matches!(s.trim(), "true" | "1" | "yes"),
            _ => false,
        };

        let interval = match self.get_value(&["schedule", "interval"]) {
            Ok(Value::Number(n)) => n.as_i64().and_then(IntervalKind::from_code),
            Ok(Value::String(s)) => s.parse().ok(),
            Err(_) => Some(IntervalKind::default()),
            Ok(_) => None,
        };
        let interval = match interval {
            Some(i) => i,
            None => {
                warn!("Invalid schedule interval, using daily");
                self.set_schedule_interval(IntervalKind::Daily)?;
                IntervalKind::Daily
            }
        };

        let time = match self.get_value(&["schedule", "time"]) {
            Ok(Value::String(s)) => s.parse::<TimeOfDay>().map_err(|e| (s, e)),
            Ok(other) => Err((format!("{:?}", other), "not a string".to_string())),
            Err(_) => Ok(TimeOfDay::default()),
        };
        let time = match time {
            Ok(t) => t,
            Err((raw, e)) => {
                warn!(value = %raw, "Invalid schedule time ({}), using 03:00", e);
                let t = TimeOfDay::default();
                self.set_schedule_time(t)?;
                t
            }
        };

        let last_run = match self.get_value(&["schedule", "last_run"]) {
            Ok(Value::String(s)) if s.trim().is_empty() => None,
            Ok(Value::Null) | Err(_) => None,
            Ok(Value::String(s)) => match parse_timestamp(&s) {
                Some(t) => Some(t),
                None => {
                    warn!(value = %s, "Invalid last update timestamp, resetting");
                    self.set_value(&["schedule", "last_run"], Value::String(String::new()))?;
                    None
                }
            },
            Ok(other) => {
                warn!(value = ?other, "Invalid last update timestamp, resetting");
                self.set_value(&["schedule", "last_run"], Value::String(String::new()))?;
                None
            }
        };

        Ok(SchedulePolicy {
            enabled,
            interval,
            time,
            last_run,
        })
    }

    fn set_schedule_enabled(&self, enabled: bool) -> Result<()> {
        self.set_value(&["schedule", "enabled"], Value::Bool(enabled))
    }

    fn set_schedule_interval(&self, interval: IntervalKind) -> Result<()> {
        self.set_value(
            &["schedule", "interval"],
            Value::Number(u64::from(interval.code()).into()),
        )
    }

    fn set_schedule_time(&self, time: TimeOfDay) -> Result<()> {
        self.set_value(&["schedule", "time"], Value::String(time.to_string()))
    }

    fn record_schedule_run(&self, at: NaiveDateTime) -> Result<()> {
        self.set_value(
            &["schedule", "last_run"],
            Value::String(format_timestamp(&at)),
        )
    }

    fn get_service_settings(&self) -> Result<ServiceSettings> {
        let player_processes = self
            .get_string_list(&["service", "player_processes"])?
            .unwrap_or_else(|| DEFAULT_PLAYER_PROCESSES.iter().map(|s| s.to_string()).collect());

        Ok(ServiceSettings {
            tick: Duration::from_secs(self.get_service_tick_secs()?.max(1)),
            memory_threshold_percent: self.get_memory_threshold_percent()?.min(100) as f64,
            pause_during_playback: self.get_pause_during_playback()?,
            player_processes,
        })
    }
}

fn yaml_to_setting(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Sequence(seq) => Some(
            seq.iter()
                .filter_map(yaml_to_setting)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Les réglages vivants sont stockés sous `playlists.settings`
impl LiveSettings for Config {
    fn snapshot(&self) -> SettingsSnapshot {
        let mut snapshot = default_snapshot();
        if let Ok(Value::Mapping(map)) = self.get_value(&["playlists", "settings"]) {
            for (k, v) in map {
                match (k.as_str(), yaml_to_setting(&v)) {
                    (Some(key), Some(value)) => {
                        snapshot.insert(key.to_lowercase(), value);
                    }
                    _ => warn!(key = ?k, "Ignoring unreadable playlist setting"),
                }
            }
        }
        snapshot
    }

    fn apply(&self, snapshot: &SettingsSnapshot) -> crate::Result<()> {
        let mut map = Mapping::new();
        for (k, v) in snapshot {
            map.insert(Value::String(k.clone()), Value::String(v.clone()));
        }
        self.set_value(&["playlists", "settings"], Value::Mapping(map))?;
        Ok(())
    }
}
