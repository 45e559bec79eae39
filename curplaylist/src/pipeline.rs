//! Enchaînement scan → tri → écriture

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::duration::resolve_durations;
use crate::error::Result;
use crate::manifest::ManifestWriter;
use crate::ordering::order;
use crate::policy::PlaylistSettings;
use crate::scanner::{DirectoryScanner, NoProgress, ProgressSink, ScanStatus};

/// Résultat d'une génération
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Manifeste écrit
    Written { path: PathBuf, entries: usize },
    /// Scan interrompu : aucun manifeste n'a été produit
    Partial(ScanStatus),
    /// Scan complet mais aucun fichier retenu : aucun manifeste n'a été produit
    NoEntries,
}

impl RunOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, RunOutcome::Written { .. })
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Written { path, entries } => {
                write!(f, "wrote {} entries to {}", entries, path.display())
            }
            RunOutcome::Partial(ScanStatus::Cancelled) => f.write_str("scan cancelled"),
            RunOutcome::Partial(ScanStatus::TimedOut) => f.write_str("scan timed out"),
            RunOutcome::Partial(ScanStatus::Complete) => f.write_str("scan incomplete"),
            RunOutcome::NoEntries => f.write_str("no valid files found"),
        }
    }
}

/// Pipeline paramétré par des [`PlaylistSettings`] explicites
#[derive(Clone)]
pub struct Pipeline {
    writer: ManifestWriter,
    progress: Arc<dyn ProgressSink>,
}

impl Pipeline {
    pub fn new(writer: ManifestWriter) -> Self {
        Self {
            writer,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn writer(&self) -> &ManifestWriter {
        &self.writer
    }

    /// Scanne `folders`, trie, puis écrit le manifeste `destination`.
    ///
    /// Un scan interrompu ou sans résultat n'écrit rien.
    pub fn run(
        &self,
        folders: &[PathBuf],
        settings: &PlaylistSettings,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let outcome = DirectoryScanner::scan(folders, &settings.scan, cancel)
            .with_progress(self.progress.clone())
            .finish();

        if outcome.is_partial() {
            warn!(
                manifest = %destination.display(),
                found = outcome.entries.len(),
                "Scan interrupted, playlist not written"
            );
            return Ok(RunOutcome::Partial(outcome.status));
        }
        if outcome.entries.is_empty() {
            info!(manifest = %destination.display(), "No valid files found");
            return Ok(RunOutcome::NoEntries);
        }

        let mut entries = outcome.entries;
        if settings.ordering.file_sort_mode.needs_duration() {
            self.progress.progress(90, "Reading durations");
            entries = resolve_durations(entries);
        }

        let ordered = order(entries, &settings.ordering);
        if ordered.is_empty() {
            return Ok(RunOutcome::NoEntries);
        }

        self.progress.progress(95, "Writing playlist");
        self.writer.write(&ordered, &settings.display, destination)?;
        self.progress.progress(100, "Done");

        Ok(RunOutcome::Written {
            path: destination.to_path_buf(),
            entries: ordered.len(),
        })
    }
}
