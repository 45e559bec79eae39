//! Prédicats de filtrage du scanner

use std::path::Path;
use std::time::SystemTime;

use crate::policy::ScanPolicy;

/// Décide, sans I/O, si un fichier est retenu et si un dossier est parcouru.
#[derive(Debug, Clone, Copy)]
pub struct PathFilter<'a> {
    policy: &'a ScanPolicy,
}

impl<'a> PathFilter<'a> {
    pub fn new(policy: &'a ScanPolicy) -> Self {
        Self { policy }
    }

    /// Un fichier est retenu si son extension est autorisée, si aucune
    /// sous-chaîne exclue n'apparaît dans son nom (en minuscules) et si sa
    /// taille est dans les bornes.
    pub fn accepts(&self, file_name: &str, size_bytes: u64) -> bool {
        let lower = file_name.to_lowercase();

        let extension = match Path::new(&lower).extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy()),
            None => return false,
        };
        if !self.policy.extensions.contains(&extension) {
            return false;
        }

        if self
            .policy
            .exclude_name_substrings
            .iter()
            .any(|pattern| lower.contains(pattern.as_str()))
        {
            return false;
        }

        size_bytes >= self.policy.min_size_bytes
            && self.policy.max_size_bytes.is_none_or(|max| size_bytes <= max)
    }

    /// Date de modification dans la plage configurée, si le filtre est actif
    pub fn accepts_modified(&self, modified: Option<SystemTime>) -> bool {
        self.policy.date_filter.admits(modified)
    }

    /// Un sous-dossier d'un dossier de profondeur `depth` est parcouru si le
    /// scan est récursif, si `depth < max_depth` et si son nom n'est pas exclu.
    pub fn descends(&self, dir_name: &str, depth: usize) -> bool {
        self.policy.recursive
            && depth < self.policy.max_depth
            && !self
                .policy
                .exclude_folder_names
                .contains(&dir_name.to_lowercase())
    }
}
