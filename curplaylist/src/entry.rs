//! Fichier média candidat produit par le scanner

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Un fichier accepté par le scanner.
///
/// Immuable une fois produit : une durée résolue plus tard est attachée en
/// construisant une nouvelle entrée avec [`MediaEntry::with_duration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    path: PathBuf,
    parent: PathBuf,
    size_bytes: u64,
    modified: Option<SystemTime>,
    duration_secs: Option<u64>,
}

impl MediaEntry {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, modified: Option<SystemTime>) -> Self {
        let path = path.into();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            parent,
            size_bytes,
            modified,
            duration_secs: None,
        }
    }

    pub fn with_duration(&self, duration_secs: Option<u64>) -> Self {
        Self {
            duration_secs,
            ..self.clone()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration_secs
    }

    /// Nom du fichier, ou le chemin complet s'il n'a pas de nom
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Date de modification en millisecondes depuis l'époque Unix, 0 si inconnue
    pub(crate) fn modified_key(&self) -> u128 {
        self.modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parent_and_name() {
        let e = MediaEntry::new("/media/films/a.mp4", 10, None);
        assert_eq!(e.parent(), Path::new("/media/films"));
        assert_eq!(e.file_name(), "a.mp4");
        assert_eq!(e.modified_key(), 0);
    }

    #[test]
    fn test_with_duration_builds_new_entry() {
        let t = UNIX_EPOCH + Duration::from_secs(5);
        let e = MediaEntry::new("/a/b.mkv", 1, Some(t));
        let d = e.with_duration(Some(90));
        assert_eq!(e.duration_secs(), None);
        assert_eq!(d.duration_secs(), Some(90));
        assert_eq!(d.modified_key(), 5000);
        assert_eq!(d.path(), e.path());
    }
}
