//! Réglages « vivants » utilisés par les créations ad hoc

use std::sync::Mutex;

use crate::error::Result;
use crate::policy::{default_snapshot, PlaylistSettings, SettingsSnapshot};

/// Source des réglages courants de l'utilisateur.
///
/// Implémenté par `curconfig::Config` (section `playlists.settings`) et par
/// [`MemorySettings`].
pub trait LiveSettings: Send + Sync {
    /// Table complète des réglages courants
    fn snapshot(&self) -> SettingsSnapshot;

    /// Remplace les réglages courants par `snapshot`
    fn apply(&self, snapshot: &SettingsSnapshot) -> Result<()>;

    fn settings(&self) -> PlaylistSettings {
        PlaylistSettings::from_snapshot(&self.snapshot())
    }
}

/// Réglages conservés en mémoire
#[derive(Debug)]
pub struct MemorySettings {
    values: Mutex<SettingsSnapshot>,
}

impl MemorySettings {
    pub fn new(snapshot: SettingsSnapshot) -> Self {
        let mut values = default_snapshot();
        values.extend(snapshot);
        Self {
            values: Mutex::new(values),
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new(SettingsSnapshot::new())
    }
}

impl LiveSettings for MemorySettings {
    fn snapshot(&self) -> SettingsSnapshot {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn apply(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        let mut values = default_snapshot();
        values.extend(snapshot.iter().map(|(k, v)| (k.clone(), v.clone())));
        *self.values.lock().unwrap_or_else(|e| e.into_inner()) = values;
        Ok(())
    }
}
