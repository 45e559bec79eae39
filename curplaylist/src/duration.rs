//! Résolution des durées pour les tris par durée

use std::path::Path;

use lofty::config::ParseOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use tracing::debug;

use crate::entry::MediaEntry;

/// Lit la durée d'un fichier média en secondes.
///
/// Retourne `None` si le conteneur n'est pas reconnu, si le fichier est
/// illisible ou si la durée annoncée est nulle.
pub fn probe_duration(path: &Path) -> Option<u64> {
    let tagged_file = match Probe::open(path).and_then(|p| p.options(ParseOptions::new()).read()) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), "No duration available: {}", e);
            return None;
        }
    };

    match tagged_file.properties().duration().as_secs() {
        0 => None,
        secs => Some(secs),
    }
}

/// Attache à chaque entrée sa durée lue sur disque
pub fn resolve_durations(entries: Vec<MediaEntry>) -> Vec<MediaEntry> {
    entries
        .into_iter()
        .map(|e| {
            let duration = probe_duration(e.path());
            e.with_duration(duration)
        })
        .collect()
}
