//! # curplaylist - Génération de playlists M3U à partir de dossiers de médias
//!
//! Cette crate fournit :
//! - Un scanner de dossiers incrémental, annulable et borné dans le temps
//! - Le tri des dossiers et des fichiers (alphabétique, taille, durée, aléatoire…)
//! - L'écriture atomique des manifestes M3U avec rotation des sauvegardes
//! - Les « sets » nommés (dossiers + réglages) persistés en JSON
//! - Une boucle de service qui régénère les sets selon un planning
//!
//! # Architecture
//!
//! - **DirectoryScanner** : parcours des dossiers, filtré par [`ScanPolicy`]
//! - **order** : regroupement par dossier puis tri selon [`OrderingPolicy`]
//! - **ManifestWriter** : écriture du fichier M3U et de ses sauvegardes
//! - **Pipeline** : scan → tri → écriture avec des réglages explicites
//! - **SetStore** : CRUD des sets et génération à partir d'un set
//! - **ServiceLoop** : régénération planifiée, suspendue sous pression mémoire
//!   ou pendant une lecture
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use curplaylist::SetStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> curplaylist::Result<()> {
//! let store = SetStore::from_config(curconfig::get_config())?;
//!
//! let outcome = store.create_playlist(
//!     &[PathBuf::from("/media/movies")],
//!     "Movies",
//!     true,
//!     &CancellationToken::new(),
//! )?;
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```

mod config_ext;
mod duration;
mod enrich;
mod entry;
mod error;
mod filter;
mod live;
mod manifest;
mod ordering;
mod pipeline;
mod policy;
mod scanner;
mod schedule;
mod service;
mod sets;

// Réexports publics
pub use config_ext::PlaylistConfigExt;
pub use duration::{probe_duration, resolve_durations};
pub use enrich::{Enricher, Enrichment};
pub use entry::MediaEntry;
pub use error::{Error, Result};
pub use filter::PathFilter;
pub use live::{LiveSettings, MemorySettings};
pub use manifest::{backup_files, clean_name, remove_manifest, ManifestWriter, DEFAULT_MAX_BACKUPS};
pub use ordering::{order, order_with_rng};
pub use pipeline::{Pipeline, RunOutcome};
pub use policy::{
    default_snapshot, keys, DateFilter, DisplayOptions, FileSortMode, FolderNamePosition,
    FolderSortMode, OrderingPolicy, ParseModeError, PlaylistSettings, ScanPolicy,
    SettingsSnapshot, DATE_FORMAT, MAX_SCAN_DEPTH,
};
pub use scanner::{DirectoryScanner, NoProgress, ProgressSink, Scan, ScanOutcome, ScanStatus};
pub use schedule::{
    format_timestamp, is_due, next_due, parse_timestamp, IntervalKind, SchedulePolicy, TimeOfDay,
    ANCHOR_DAY,
};
pub use service::{
    CycleReport, MemoryGuard, NeverPlaying, PlaybackGuard, ProcessPlaybackGuard, ResourceGuard,
    ServiceLoop, ServiceSettings,
};
pub use sets::{BatchSummary, PlaylistSet, SetStore};
