//! Écriture des manifestes M3U avec rotation des sauvegardes.
//!
//! Format produit (UTF-8, chaque ligne terminée par `\n`) :
//!
//! ```text
//! #EXTM3U
//! #EXTINF:-1,<nom affiché>
//! <chemin>
//! ```
//!
//! Une paire de lignes par entrée, dans l'ordre reçu. Avant d'écraser un
//! manifeste existant, il est copié dans `backups/<nom>.bak.<horodatage>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::entry::MediaEntry;
use crate::enrich::Enricher;
use crate::error::{Error, Result};
use crate::policy::{DisplayOptions, FolderNamePosition};

/// Nombre de sauvegardes conservées par défaut
pub const DEFAULT_MAX_BACKUPS: i64 = 3;

const BACKUP_DIR: &str = "backups";
const BACKUP_TIMESTAMP: &str = "%Y%m%d_%H%M%S_%3f";

lazy_static! {
    static ref YEAR: Option<Regex> =
        Regex::new(r"(?:^|[^0-9])((?:19|20)[0-9]{2})(?:[^0-9]|$)").ok();
    static ref RESOLUTION: Option<Regex> =
        Regex::new(r"(?i)(?:^|[^0-9a-z])(720p|1080p|2160p|4k)(?:[^0-9a-z]|$)").ok();
}

fn first_capture<'a>(re: &Option<Regex>, text: &'a str) -> Option<&'a str> {
    re.as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Rédacteur de manifestes
#[derive(Clone)]
pub struct ManifestWriter {
    max_backups: i64,
    enricher: Option<Arc<dyn Enricher>>,
}

impl Default for ManifestWriter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKUPS)
    }
}

impl std::fmt::Debug for ManifestWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestWriter")
            .field("max_backups", &self.max_backups)
            .field("enricher", &self.enricher.is_some())
            .finish()
    }
}

impl ManifestWriter {
    /// `max_backups <= 0` désactive les sauvegardes
    pub fn new(max_backups: i64) -> Self {
        Self {
            max_backups,
            enricher: None,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Écrit `entries` dans `destination`.
    ///
    /// Le répertoire de destination est créé si besoin. L'écriture passe par
    /// `<destination>.tmp` puis un renommage : en cas d'échec, le manifeste
    /// existant et ses sauvegardes restent intacts. Les anciennes sauvegardes
    /// ne sont élaguées qu'après le renommage.
    ///
    /// Les entrées dont le chemin n'est pas de l'UTF-8 ou contient un saut de
    /// ligne sont ignorées.
    pub fn write(
        &self,
        entries: &[MediaEntry],
        display: &DisplayOptions,
        destination: &Path,
    ) -> Result<()> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut content = String::from("#EXTM3U\n");
        let mut written = 0usize;
        for entry in entries {
            let Some(path) = manifest_line(entry.path()) else {
                warn!(path = %entry.path().display(), "Path cannot be stored in a manifest, skipping");
                continue;
            };
            content.push_str("#EXTINF:-1,");
            content.push_str(&self.display_name(entry, display));
            content.push('\n');
            content.push_str(path);
            content.push('\n');
            written += 1;
        }

        let tmp = tmp_path(destination);
        if let Err(e) = fs::write(&tmp, content.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::io(&tmp, e));
        }

        let backed_up = self.max_backups > 0 && destination.is_file() && self.backup(destination);

        if let Err(e) = fs::rename(&tmp, destination) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::io(destination, e));
        }
        if backed_up {
            self.prune_backups(destination);
        }

        info!(
            manifest = %destination.display(),
            entries = written,
            skipped = entries.len() - written,
            "Playlist written"
        );
        Ok(())
    }

    /// Nom affiché pour une entrée ; en cas d'échec de mise en forme, le nom
    /// de fichier brut est utilisé.
    pub fn display_name(&self, entry: &MediaEntry, options: &DisplayOptions) -> String {
        match self.format_name(entry, options) {
            Ok(name) => single_line(&name),
            Err(e) => {
                debug!(path = %entry.path().display(), "Display formatting failed: {}", e);
                single_line(&entry.file_name())
            }
        }
    }

    fn format_name(&self, entry: &MediaEntry, options: &DisplayOptions) -> anyhow::Result<String> {
        let file_name = entry
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("file name is not valid UTF-8"))?;
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);

        let mut title = match self.enriched_name(file_name) {
            Some(cleaned) => cleaned,
            None if options.clean_names => clean_name(stem),
            None => stem.to_string(),
        };
        if title.is_empty() {
            return Err(anyhow!("empty display name"));
        }

        if options.show_metadata {
            if let Some(year) = first_capture(&YEAR, stem) {
                if !title.contains(year) {
                    title = format!("{} ({})", title, year);
                }
            }
            if let Some(res) = first_capture(&RESOLUTION, stem) {
                title = format!("{} [{}]", title, res.to_lowercase());
            }
        }

        if options.show_folder_name {
            if let Some(folder) = entry.parent().file_name().and_then(|n| n.to_str()) {
                let folder = if options.clean_names {
                    clean_name(folder)
                } else {
                    folder.to_string()
                };
                let folder = match &options.folder_name_color {
                    Some(color) => format!("[COLOR {}]{}[/COLOR]", color, folder),
                    None => folder,
                };
                title = match options.folder_name_position {
                    FolderNamePosition::Before => format!("{} - {}", folder, title),
                    FolderNamePosition::After => format!("{} - {}", title, folder),
                };
            }
        }

        Ok(title)
    }

    fn enriched_name(&self, file_name: &str) -> Option<String> {
        let enricher = self.enricher.as_ref()?;
        match enricher.enrich(file_name) {
            Ok(Some(enrichment)) => enrichment
                .cleaned_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            Ok(None) => None,
            Err(e) => {
                debug!(file_name, "Enricher failed, ignoring: {}", e);
                None
            }
        }
    }

    /// Copie le manifeste courant dans le dossier des sauvegardes
    fn backup(&self, destination: &Path) -> bool {
        let Some(file_name) = destination.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            return false;
        };
        let backup_dir = backup_dir(destination);
        if let Err(e) = fs::create_dir_all(&backup_dir) {
            warn!(dir = %backup_dir.display(), "Cannot create backup directory: {}", e);
            return false;
        }

        let stamp = Local::now().format(BACKUP_TIMESTAMP);
        let backup = backup_dir.join(format!("{}.bak.{}", file_name, stamp));
        match fs::copy(destination, &backup) {
            Ok(_) => {
                debug!(backup = %backup.display(), "Manifest backed up");
                true
            }
            Err(e) => {
                warn!(manifest = %destination.display(), "Backup failed, continuing: {}", e);
                false
            }
        }
    }

    fn prune_backups(&self, destination: &Path) {
        let mut backups = backup_files(destination);
        // Les horodatages se trient chronologiquement : les plus récents en tête
        backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        for old in backups.into_iter().skip(self.max_backups as usize) {
            match fs::remove_file(&old) {
                Ok(()) => debug!(backup = %old.display(), "Old backup removed"),
                Err(e) => warn!(backup = %old.display(), "Cannot remove old backup: {}", e),
            }
        }
    }
}

/// Chemin tel qu'écrit dans le manifeste, si représentable sur une ligne
fn manifest_line(path: &Path) -> Option<&str> {
    path.to_str().filter(|p| !p.contains(['\n', '\r']))
}

fn tmp_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn backup_dir(destination: &Path) -> PathBuf {
    destination
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(BACKUP_DIR)
}

/// Sauvegardes existantes d'un manifeste
pub fn backup_files(destination: &Path) -> Vec<PathBuf> {
    let Some(file_name) = destination.file_name().map(|n| n.to_string_lossy().into_owned())
    else {
        return Vec::new();
    };
    let prefix = format!("{}.bak.", file_name);
    let Ok(reader) = fs::read_dir(backup_dir(destination)) else {
        return Vec::new();
    };
    reader
        .filter_map(|item| item.ok())
        .map(|item| item.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect()
}

/// Supprime un manifeste et ses sauvegardes ; les échecs sont seulement journalisés
pub fn remove_manifest(destination: &Path) {
    if destination.exists() {
        match fs::remove_file(destination) {
            Ok(()) => info!(manifest = %destination.display(), "Manifest removed"),
            Err(e) => warn!(manifest = %destination.display(), "Cannot remove manifest: {}", e),
        }
    }
    for backup in backup_files(destination) {
        if let Err(e) = fs::remove_file(&backup) {
            warn!(backup = %backup.display(), "Cannot remove backup: {}", e);
        }
    }
}

/// Remplace `.`, `_` et `-` par des espaces et réduit les espaces multiples
pub fn clean_name(raw: &str) -> String {
    raw.replace(['.', '_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn single_line(name: &str) -> String {
    name.replace(['\r', '\n'], " ")
}
