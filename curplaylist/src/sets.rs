//! Stockage des sets de playlists.
//!
//! Un set associe un nom unique, une liste de dossiers et une table de
//! réglages. Tous les sets vivent dans un seul document JSON :
//!
//! ```json
//! { "<nom>": { "folders": ["..."], "timestamp": 0, "settings": { "clé": "valeur" } } }
//! ```
//!
//! `timestamp` est la date Unix (secondes) de la dernière génération réussie,
//! 0 si le set n'a jamais été généré.
//!
//! Le [`SetStore`] possède le document : chaque opération le relit sous un
//! verrou unique puis le réécrit via un fichier temporaire renommé. Le verrou
//! combine un mutex interne et un verrou consultatif sur `<document>.lock`,
//! partagé entre processus (service et commandes ponctuelles). Un document
//! illisible est traité comme vide, avec un avertissement.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local, NaiveDateTime};
use curconfig::Config;
use fs4::fs_std::FileExt;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config_ext::PlaylistConfigExt;
use crate::error::{Error, Result};
use crate::live::LiveSettings;
use crate::manifest::{remove_manifest, ManifestWriter};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::policy::{PlaylistSettings, SettingsSnapshot};

/// Un set tel que persisté
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSet {
    pub name: String,
    pub folders: Vec<PathBuf>,
    pub settings: SettingsSnapshot,
    /// Secondes Unix de la dernière génération réussie, 0 = jamais
    pub timestamp: i64,
}

impl PlaylistSet {
    /// Dernière génération réussie, en heure locale
    pub fn last_run(&self) -> Option<NaiveDateTime> {
        if self.timestamp <= 0 {
            return None;
        }
        DateTime::from_timestamp(self.timestamp, 0).map(|t| t.with_timezone(&Local).naive_local())
    }

    pub fn playlist_settings(&self) -> PlaylistSettings {
        PlaylistSettings::from_snapshot(&self.settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SetRecord {
    #[serde(default)]
    folders: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: i64,
    #[serde(default, deserialize_with = "lenient_settings")]
    settings: SettingsSnapshot,
}

type Document = BTreeMap<String, SetRecord>;

/// Accepte un entier, un flottant ou rien
fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Accepte des valeurs scalaires non chaînes (booléens, nombres) et les convertit
fn lenient_settings<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<SettingsSnapshot, D::Error> {
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    warn!(key = %k, value = %other, "Ignoring non-scalar set setting");
                    return None;
                }
            };
            Some((k, value))
        })
        .collect())
}

/// Bilan d'une régénération groupée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "updated {}/{} sets", self.succeeded, self.attempted)
    }
}

/// Verrou tenu pendant une lecture ou une modification du document
struct DocumentGuard<'a> {
    file: File,
    _local: MutexGuard<'a, ()>,
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Cannot release playlist sets lock: {}", e);
        }
    }
}

/// Propriétaire unique du document des sets
pub struct SetStore {
    path: PathBuf,
    playlist_dir: PathBuf,
    lock: Mutex<()>,
    pipeline: Pipeline,
    live: Arc<dyn LiveSettings>,
}

impl SetStore {
    /// * `path` - document JSON des sets
    /// * `playlist_dir` - répertoire des manifestes `<nom>.m3u`
    /// * `live` - réglages courants, utilisés par les créations ad hoc
    pub fn new(
        path: impl Into<PathBuf>,
        playlist_dir: impl Into<PathBuf>,
        pipeline: Pipeline,
        live: Arc<dyn LiveSettings>,
    ) -> Self {
        Self {
            path: path.into(),
            playlist_dir: playlist_dir.into(),
            lock: Mutex::new(()),
            pipeline,
            live,
        }
    }

    /// Construit le store décrit par la configuration
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let path = config.sets_file_path()?;
        let playlist_dir = config.playlist_dir()?;
        let writer = ManifestWriter::new(config.get_max_backups()?);
        Ok(Self::new(path, playlist_dir, Pipeline::new(writer), config))
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn playlist_dir(&self) -> &Path {
        &self.playlist_dir
    }

    /// Chemin du manifeste d'un set
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.playlist_dir.join(format!("{}.m3u", name))
    }

    /// Réglages courants, tels qu'ils seraient enregistrés dans un nouveau set
    pub fn live_settings(&self) -> SettingsSnapshot {
        self.live.snapshot()
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Verrou exclusif sur le document, dans ce processus et entre processus
    fn guard(&self) -> Result<DocumentGuard<'_>> {
        let local = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let lock_path = self.lock_path();
        let persistence = |e: std::io::Error| {
            Error::Persistence(format!("cannot lock {}: {}", lock_path.display(), e))
        };
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persistence)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(persistence)?;
        FileExt::lock_exclusive(&file).map_err(persistence)?;
        Ok(DocumentGuard {
            file,
            _local: local,
        })
    }

    fn read_document(&self) -> Result<Document> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }
        match serde_json::from_slice::<Document>(&data) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(
                    file = %self.path.display(),
                    "Malformed playlist sets document ({}), treating as empty",
                    e
                );
                Ok(Document::new())
            }
        }
    }

    fn write_document(&self, doc: &Document) -> Result<()> {
        let persistence = |e: &dyn fmt::Display| {
            Error::Persistence(format!("cannot write {}: {}", self.path.display(), e))
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence(&e))?;
        }
        let json = serde_json::to_string_pretty(doc).map_err(|e| persistence(&e))?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = fs::write(&tmp, json.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(persistence(&e));
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(persistence(&e));
        }
        Ok(())
    }

    /// Relit le document, applique `f`, puis réécrit si `f` l'a modifié
    fn modify<T>(&self, f: impl FnOnce(&mut Document) -> Result<(T, bool)>) -> Result<T> {
        let _guard = self.guard()?;
        let mut doc = self.read_document()?;
        let (value, changed) = f(&mut doc)?;
        if changed {
            self.write_document(&doc)?;
        }
        Ok(value)
    }

    fn validate_name(name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed != name
            || name.contains(['/', '\\'])
            || name == "."
            || name == ".."
        {
            return Err(Error::InvalidSetName(name.to_string()));
        }
        Ok(())
    }

    fn to_set(name: &str, record: &SetRecord) -> PlaylistSet {
        PlaylistSet {
            name: name.to_string(),
            folders: record.folders.iter().map(PathBuf::from).collect(),
            settings: record.settings.clone(),
            timestamp: record.timestamp,
        }
    }

    fn folder_strings(folders: &[PathBuf]) -> Result<Vec<String>> {
        if folders.is_empty() {
            return Err(Error::NoFolders);
        }
        Ok(folders
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect())
    }

    /// Tous les sets, triés par nom
    pub fn list(&self) -> Result<Vec<PlaylistSet>> {
        let _guard = self.guard()?;
        let doc = self.read_document()?;
        Ok(doc.iter().map(|(n, r)| Self::to_set(n, r)).collect())
    }

    pub fn get(&self, name: &str) -> Result<Option<PlaylistSet>> {
        let _guard = self.guard()?;
        let doc = self.read_document()?;
        Ok(doc.get(name).map(|r| Self::to_set(name, r)))
    }

    /// Crée ou remplace un set ; la date de dernière génération est conservée
    /// en cas de remplacement et vaut 0 pour un nouveau set.
    pub fn save(&self, name: &str, folders: &[PathBuf], settings: &SettingsSnapshot) -> Result<()> {
        Self::validate_name(name)?;
        let folders = Self::folder_strings(folders)?;
        self.modify(|doc| {
            let timestamp = doc.get(name).map(|r| r.timestamp).unwrap_or(0);
            doc.insert(
                name.to_string(),
                SetRecord {
                    folders,
                    timestamp,
                    settings: settings.clone(),
                },
            );
            Ok(((), true))
        })?;
        info!(set = name, "Playlist set saved");
        Ok(())
    }

    pub fn update_folders(&self, name: &str, folders: &[PathBuf]) -> Result<()> {
        let folders = Self::folder_strings(folders)?;
        self.modify(|doc| match doc.get_mut(name) {
            Some(record) => {
                record.folders = folders;
                Ok(((), true))
            }
            None => Err(Error::SetNotFound(name.to_string())),
        })
    }

    pub fn update_settings(&self, name: &str, settings: &SettingsSnapshot) -> Result<()> {
        self.modify(|doc| match doc.get_mut(name) {
            Some(record) => {
                record.settings = settings.clone();
                Ok(((), true))
            }
            None => Err(Error::SetNotFound(name.to_string())),
        })
    }

    /// Supprime un set, puis son manifeste et ses sauvegardes.
    ///
    /// Retourne `false` si le set n'existait pas. L'échec de suppression du
    /// manifeste est seulement journalisé.
    pub fn delete_set(&self, name: &str) -> Result<bool> {
        let removed = self.modify(|doc| {
            let removed = doc.remove(name).is_some();
            Ok((removed, removed))
        })?;
        if removed {
            info!(set = name, "Playlist set deleted");
            if Self::validate_name(name).is_ok() {
                remove_manifest(&self.manifest_path(name));
            }
        }
        Ok(removed)
    }

    /// Copie les réglages du set dans les réglages courants.
    ///
    /// Retourne `false` si le set n'existe pas.
    pub fn apply_settings(&self, name: &str) -> Result<bool> {
        let Some(set) = self.get(name)? else {
            return Ok(false);
        };
        let mut snapshot = self.live.snapshot();
        snapshot.extend(set.settings);
        self.live.apply(&snapshot)?;
        info!(set = name, "Set settings applied to live settings");
        Ok(true)
    }

    /// Génère le manifeste d'un set.
    ///
    /// Les réglages effectifs sont les réglages courants surchargés par ceux
    /// du set ; les réglages courants ne sont pas modifiés. En cas de succès,
    /// la date de dernière génération du set est mise à jour.
    pub fn create_playlist_from_set(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        Self::validate_name(name)?;
        let set = self
            .get(name)?
            .ok_or_else(|| Error::SetNotFound(name.to_string()))?;

        let mut snapshot = self.live.snapshot();
        snapshot.extend(set.settings);
        let settings = PlaylistSettings::from_snapshot(&snapshot);
        let outcome = self
            .pipeline
            .run(&set.folders, &settings, &self.manifest_path(name), cancel)?;

        if outcome.is_written() {
            self.mark_run(name)?;
        }
        info!(set = name, "{}", outcome);
        Ok(outcome)
    }

    /// Régénère tous les sets ; un échec n'interrompt pas les suivants
    pub fn update_all(&self, cancel: &CancellationToken) -> Result<BatchSummary> {
        let names: Vec<String> = self.list()?.into_iter().map(|s| s.name).collect();
        let mut summary = BatchSummary::default();

        for name in names {
            if cancel.is_cancelled() {
                warn!("Batch update cancelled");
                break;
            }
            summary.attempted += 1;
            match self.create_playlist_from_set(&name, cancel) {
                Ok(outcome) if outcome.is_written() => summary.succeeded += 1,
                Ok(outcome) => {
                    warn!(set = %name, "Set not updated: {}", outcome);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(set = %name, "Set update failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!("{}", summary);
        Ok(summary)
    }

    /// Génère une playlist ad hoc avec les réglages courants.
    ///
    /// Si `save_as_set` est vrai et que le manifeste est écrit, les dossiers
    /// et les réglages courants sont enregistrés comme set `name`.
    pub fn create_playlist(
        &self,
        folders: &[PathBuf],
        name: &str,
        save_as_set: bool,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        Self::validate_name(name)?;
        if folders.is_empty() {
            return Err(Error::NoFolders);
        }
        let snapshot = self.live.snapshot();
        let settings = PlaylistSettings::from_snapshot(&snapshot);
        let outcome = self
            .pipeline
            .run(folders, &settings, &self.manifest_path(name), cancel)?;

        if outcome.is_written() && save_as_set {
            self.save(name, folders, &snapshot)?;
            self.mark_run(name)?;
        }
        info!(playlist = name, "{}", outcome);
        Ok(outcome)
    }

    fn mark_run(&self, name: &str) -> Result<()> {
        let now = Local::now().timestamp();
        self.modify(|doc| match doc.get_mut(name) {
            Some(record) => {
                record.timestamp = now;
                Ok(((), true))
            }
            // Set supprimé pendant la génération
            None => Ok(((), false)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemorySettings;
    use crate::policy::keys;
    use std::fs::File;

    fn touch(path: &Path, size: u64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap().set_len(size).unwrap();
    }

    fn store(dir: &Path) -> SetStore {
        SetStore::new(
            dir.join("sets.json"),
            dir.join("playlists"),
            Pipeline::new(ManifestWriter::default()),
            Arc::new(MemorySettings::default()),
        )
    }

    fn small_files() -> SettingsSnapshot {
        [(keys::MIN_FILE_SIZE.to_string(), "0".to_string())].into()
    }

    #[test]
    fn test_save_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .save("films", &[PathBuf::from("/media/films")], &small_files())
            .unwrap();

        let set = store.get("films").unwrap().unwrap();
        assert_eq!(set.folders, vec![PathBuf::from("/media/films")]);
        assert_eq!(set.timestamp, 0);
        assert_eq!(set.last_run(), None);
        assert!(store.get("other").unwrap().is_none());
    }

    #[test]
    fn test_save_preserves_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("sets.json"),
            r#"{"films": {"folders": ["/a"], "timestamp": 1700000000, "settings": {}}}"#,
        )
        .unwrap();
        let store = store(dir.path());
        store
            .save("films", &[PathBuf::from("/b")], &SettingsSnapshot::new())
            .unwrap();
        let set = store.get("films").unwrap().unwrap();
        assert_eq!(set.timestamp, 1_700_000_000);
        assert_eq!(set.folders, vec![PathBuf::from("/b")]);
    }

    #[test]
    fn test_malformed_document_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sets.json"), "{ not json").unwrap();
        let store = store(dir.path());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_lenient_document() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("sets.json"),
            r#"{"x": {"folders": ["/a"], "timestamp": 12.7, "settings": {"recursive_scan": false, "scan_depth": 3}}}"#,
        )
        .unwrap();
        let set = store(dir.path()).get("x").unwrap().unwrap();
        assert_eq!(set.timestamp, 12);
        assert_eq!(set.settings.get("recursive_scan").map(String::as_str), Some("false"));
        assert_eq!(set.playlist_settings().scan.max_depth, 3);
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let folders = [PathBuf::from("/a")];
        for name in ["", "a/b", "..", " padded"] {
            assert!(matches!(
                store.save(name, &folders, &SettingsSnapshot::new()),
                Err(Error::InvalidSetName(_))
            ));
        }
        assert!(matches!(
            store.save("ok", &[], &SettingsSnapshot::new()),
            Err(Error::NoFolders)
        ));
    }

    #[test]
    fn test_updates_require_existing_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(
            store.update_folders("nope", &[PathBuf::from("/a")]),
            Err(Error::SetNotFound(_))
        ));
        store
            .save("s", &[PathBuf::from("/a")], &SettingsSnapshot::new())
            .unwrap();
        store.update_settings("s", &small_files()).unwrap();
        store.update_folders("s", &[PathBuf::from("/c")]).unwrap();
        let set = store.get("s").unwrap().unwrap();
        assert_eq!(set.folders, vec![PathBuf::from("/c")]);
        assert_eq!(set.settings, small_files());
    }

    #[test]
    fn test_apply_settings() {
        let dir = tempfile::tempdir().unwrap();
        let live = Arc::new(MemorySettings::default());
        let store = SetStore::new(
            dir.path().join("sets.json"),
            dir.path().join("playlists"),
            Pipeline::new(ManifestWriter::default()),
            live.clone(),
        );
        assert!(!store.apply_settings("missing").unwrap());

        let mut snapshot = SettingsSnapshot::new();
        snapshot.insert(keys::SORT_MODE.into(), "random".into());
        store.save("s", &[PathBuf::from("/a")], &snapshot).unwrap();
        assert!(store.apply_settings("s").unwrap());
        assert_eq!(live.snapshot().get(keys::SORT_MODE).map(String::as_str), Some("random"));
    }

    #[test]
    fn test_create_from_set_updates_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("media/a.mp4"), 1);
        let store = store(dir.path());
        store
            .save("s", &[dir.path().join("media")], &small_files())
            .unwrap();

        let outcome = store
            .create_playlist_from_set("s", &CancellationToken::new())
            .unwrap();
        assert!(outcome.is_written());
        assert!(store.manifest_path("s").exists());
        assert!(store.get("s").unwrap().unwrap().timestamp > 0);
    }

    #[test]
    fn test_create_from_partial_set_uses_live_settings() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("media/small.mp4"), 1024);
        let live = Arc::new(MemorySettings::new(small_files()));
        let store = SetStore::new(
            dir.path().join("sets.json"),
            dir.path().join("playlists"),
            Pipeline::new(ManifestWriter::default()),
            live.clone(),
        );
        let before = live.snapshot();
        let partial: SettingsSnapshot =
            [(keys::SORT_MODE.to_string(), "a_z".to_string())].into();
        store
            .save("s", &[dir.path().join("media")], &partial)
            .unwrap();

        let outcome = store
            .create_playlist_from_set("s", &CancellationToken::new())
            .unwrap();
        assert!(outcome.is_written());
        assert_eq!(live.snapshot(), before);
    }

    #[test]
    fn test_set_settings_override_live_settings() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("media/small.mp4"), 1024);
        let store = SetStore::new(
            dir.path().join("sets.json"),
            dir.path().join("playlists"),
            Pipeline::new(ManifestWriter::default()),
            Arc::new(MemorySettings::new(small_files())),
        );
        let strict: SettingsSnapshot =
            [(keys::MIN_FILE_SIZE.to_string(), "1".to_string())].into();
        store
            .save("s", &[dir.path().join("media")], &strict)
            .unwrap();

        let outcome = store
            .create_playlist_from_set("s", &CancellationToken::new())
            .unwrap();
        assert!(!outcome.is_written());
    }

    #[test]
    fn test_lock_file_is_next_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.list().unwrap();
        assert!(dir.path().join("sets.json.lock").is_file());
    }

    #[test]
    fn test_create_from_missing_set() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store(dir.path()).create_playlist_from_set("ghost", &CancellationToken::new()),
            Err(Error::SetNotFound(_))
        ));
    }

    #[test]
    fn test_update_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("media/a.mp4"), 1);
        let store = store(dir.path());
        store
            .save("good", &[dir.path().join("media")], &small_files())
            .unwrap();
        store
            .save("empty", &[dir.path().join("nothing")], &small_files())
            .unwrap();
        store
            .save("other", &[dir.path().join("media")], &small_files())
            .unwrap();

        let summary = store.update_all(&CancellationToken::new()).unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                attempted: 3,
                succeeded: 2,
                failed: 1
            }
        );
        assert_eq!(summary.to_string(), "updated 2/3 sets");
    }

    #[test]
    fn test_create_playlist_saves_set() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("media/a.mp4"), 1);
        let live = Arc::new(MemorySettings::new(small_files()));
        let store = SetStore::new(
            dir.path().join("sets.json"),
            dir.path().join("playlists"),
            Pipeline::new(ManifestWriter::default()),
            live,
        );
        let folders = [dir.path().join("media")];

        let outcome = store
            .create_playlist(&folders, "adhoc", false, &CancellationToken::new())
            .unwrap();
        assert!(outcome.is_written());
        assert!(store.get("adhoc").unwrap().is_none());

        store
            .create_playlist(&folders, "kept", true, &CancellationToken::new())
            .unwrap();
        let set = store.get("kept").unwrap().unwrap();
        assert_eq!(set.folders, folders.to_vec());
        assert!(set.timestamp > 0);
        assert_eq!(set.settings.get(keys::MIN_FILE_SIZE).map(String::as_str), Some("0"));
    }
}
