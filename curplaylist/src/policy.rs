//! Politiques typées du pipeline : scan, tri et affichage.
//!
//! Les réglages sont persistés sous forme de table plate `clé → valeur`
//! ([`SettingsSnapshot`]), à la fois dans les sets et dans la configuration
//! vivante. [`PlaylistSettings::from_snapshot`] valide cette table une seule
//! fois contre une table de valeurs par défaut ; une valeur malformée est
//! remplacée par sa valeur par défaut avec un avertissement.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDate};
use tracing::warn;

/// Table plate des réglages, telle que persistée
pub type SettingsSnapshot = BTreeMap<String, String>;

/// Plafond absolu de profondeur de scan
pub const MAX_SCAN_DEPTH: usize = 64;

const MB: u64 = 1024 * 1024;

/// Format des dates du filtre de modification
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub mod keys {
    pub const FILE_EXTENSIONS: &str = "file_extensions";
    pub const EXCLUDE_PATTERN: &str = "exclude_pattern";
    pub const EXCLUDE_FOLDERS: &str = "exclude_folders";
    pub const MIN_FILE_SIZE: &str = "min_file_size";
    pub const MAX_FILE_SIZE: &str = "max_file_size";
    pub const RECURSIVE_SCAN: &str = "recursive_scan";
    pub const SCAN_DEPTH: &str = "scan_depth";
    pub const BATCH_SIZE: &str = "batch_size";
    pub const SCAN_TIMEOUT: &str = "scan_timeout_seconds";
    pub const ENABLE_DATE_FILTER: &str = "enable_date_filter";
    pub const MIN_FILE_DATE: &str = "min_file_date";
    pub const MAX_FILE_DATE: &str = "max_file_date";
    pub const FOLDER_SORT_MODE: &str = "folder_sort_mode";
    pub const SORT_MODE: &str = "sort_mode";
    pub const CUSTOM_FOLDER_ORDER: &str = "custom_folder_order";
    pub const NEWEST_TO_TOP: &str = "newest_files_to_top_count";
    pub const NEWEST_PER_FOLDER_TO_TOP: &str = "newest_files_per_folder_to_top_count";
    pub const FILES_PER_FOLDER: &str = "file_count_per_folder";
    pub const GLOBAL_FILE_COUNT: &str = "global_file_count";
    pub const SHOW_FOLDER_NAMES: &str = "show_folder_names";
    pub const FOLDER_NAME_POSITION: &str = "folder_name_position";
    pub const FOLDER_NAME_COLOR: &str = "folder_name_color";
    pub const CLEAN_NAMES: &str = "clean_names";
    pub const SHOW_METADATA: &str = "show_metadata";
}

/// Table des valeurs par défaut, seule source de vérité pour les réglages absents
const DEFAULTS: &[(&str, &str)] = &[
    (keys::FILE_EXTENSIONS, ".mp4,.mkv,.avi,.mov,.wmv"),
    (keys::EXCLUDE_PATTERN, "sample,trailer"),
    (keys::EXCLUDE_FOLDERS, ""),
    (keys::MIN_FILE_SIZE, "50"),
    (keys::MAX_FILE_SIZE, "0"),
    (keys::RECURSIVE_SCAN, "true"),
    (keys::SCAN_DEPTH, "2"),
    (keys::BATCH_SIZE, "50"),
    (keys::SCAN_TIMEOUT, "300"),
    (keys::ENABLE_DATE_FILTER, "false"),
    (keys::MIN_FILE_DATE, "2000-01-01"),
    (keys::MAX_FILE_DATE, "2100-01-01"),
    (keys::FOLDER_SORT_MODE, "none"),
    (keys::SORT_MODE, "newest_first"),
    (keys::CUSTOM_FOLDER_ORDER, ""),
    (keys::NEWEST_TO_TOP, "0"),
    (keys::NEWEST_PER_FOLDER_TO_TOP, "0"),
    (keys::FILES_PER_FOLDER, "0"),
    (keys::GLOBAL_FILE_COUNT, "0"),
    (keys::SHOW_FOLDER_NAMES, "false"),
    (keys::FOLDER_NAME_POSITION, "before"),
    (keys::FOLDER_NAME_COLOR, ""),
    (keys::CLEAN_NAMES, "true"),
    (keys::SHOW_METADATA, "false"),
];

fn default_of(key: &str) -> &'static str {
    DEFAULTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or("")
}

/// Erreur de lecture d'un mode de tri ou d'une position
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseModeError {
    kind: &'static str,
    value: String,
}

impl ParseModeError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

fn normalize_mode(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect()
}

/// Ordre des dossiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderSortMode {
    /// Ordre de première apparition pendant le scan
    #[default]
    None,
    /// Dossier contenant le fichier le plus récent en premier
    RecentlyModified,
    AToZ,
    ZToA,
    Custom,
}

impl FolderSortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderSortMode::None => "none",
            FolderSortMode::RecentlyModified => "recently_modified",
            FolderSortMode::AToZ => "a_z",
            FolderSortMode::ZToA => "z_a",
            FolderSortMode::Custom => "custom",
        }
    }
}

impl fmt::Display for FolderSortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderSortMode {
    type Err = ParseModeError;

    /// Accepte les noms ainsi que les codes numériques historiques (0 à 4)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_mode(s).as_str() {
            "0" | "none" => Ok(FolderSortMode::None),
            "1" | "recentlymodified" | "recent" | "newest" => Ok(FolderSortMode::RecentlyModified),
            "2" | "az" | "alphabetical" => Ok(FolderSortMode::AToZ),
            "3" | "za" => Ok(FolderSortMode::ZToA),
            "4" | "custom" | "customorder" => Ok(FolderSortMode::Custom),
            _ => Err(ParseModeError::new("folder sort mode", s)),
        }
    }
}

/// Ordre des fichiers à l'intérieur d'un dossier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSortMode {
    #[default]
    NewestFirst,
    OldestFirst,
    AToZ,
    ZToA,
    Random,
    SizeAsc,
    SizeDesc,
    DurationAsc,
    DurationDesc,
    /// Conserve l'ordre du scan
    None,
}

impl FileSortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSortMode::NewestFirst => "newest_first",
            FileSortMode::OldestFirst => "oldest_first",
            FileSortMode::AToZ => "a_z",
            FileSortMode::ZToA => "z_a",
            FileSortMode::Random => "random",
            FileSortMode::SizeAsc => "size_asc",
            FileSortMode::SizeDesc => "size_desc",
            FileSortMode::DurationAsc => "duration_asc",
            FileSortMode::DurationDesc => "duration_desc",
            FileSortMode::None => "none",
        }
    }

    /// Vrai si ce mode a besoin des durées
    pub fn needs_duration(&self) -> bool {
        matches!(self, FileSortMode::DurationAsc | FileSortMode::DurationDesc)
    }
}

impl fmt::Display for FileSortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileSortMode {
    type Err = ParseModeError;

    /// Accepte les noms ainsi que les codes numériques historiques (0 à 7)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_mode(s).as_str() {
            "0" | "newestfirst" | "newest" => Ok(FileSortMode::NewestFirst),
            "oldestfirst" | "oldest" => Ok(FileSortMode::OldestFirst),
            "1" | "az" => Ok(FileSortMode::AToZ),
            "2" | "za" => Ok(FileSortMode::ZToA),
            "3" | "random" | "shuffle" => Ok(FileSortMode::Random),
            "4" | "sizeasc" | "sizesmallest" => Ok(FileSortMode::SizeAsc),
            "5" | "sizedesc" | "sizelargest" => Ok(FileSortMode::SizeDesc),
            "6" | "durationasc" | "durationshortest" => Ok(FileSortMode::DurationAsc),
            "7" | "durationdesc" | "durationlongest" | "durationlargest" => {
                Ok(FileSortMode::DurationDesc)
            }
            "none" | "scan" => Ok(FileSortMode::None),
            _ => Err(ParseModeError::new("file sort mode", s)),
        }
    }
}

/// Position du nom de dossier par rapport au nom du fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderNamePosition {
    #[default]
    Before,
    After,
}

impl FolderNamePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderNamePosition::Before => "before",
            FolderNamePosition::After => "after",
        }
    }
}

impl FromStr for FolderNamePosition {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_mode(s).as_str() {
            "0" | "before" | "beforename" => Ok(FolderNamePosition::Before),
            "1" | "after" | "aftername" => Ok(FolderNamePosition::After),
            _ => Err(ParseModeError::new("folder name position", s)),
        }
    }
}

/// Filtre appliqué par le scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPolicy {
    /// Extensions en minuscules, avec le point (`.mp4`)
    pub extensions: BTreeSet<String>,
    /// Sous-chaînes interdites dans le nom de fichier (minuscules)
    pub exclude_name_substrings: BTreeSet<String>,
    /// Noms de dossiers à ne pas parcourir (minuscules)
    pub exclude_folder_names: BTreeSet<String>,
    pub min_size_bytes: u64,
    /// `None` : pas de borne supérieure
    pub max_size_bytes: Option<u64>,
    pub recursive: bool,
    /// Profondeur maximale ; 0 = racine seulement. Toujours ≤ [`MAX_SCAN_DEPTH`].
    pub max_depth: usize,
    pub batch_size: usize,
    pub timeout: Option<Duration>,
    pub date_filter: DateFilter,
}

/// Plage de dates de modification, bornes incluses, en jours locaux
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFilter {
    pub enabled: bool,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateFilter {
    /// Une date de modification inconnue est toujours admise
    pub fn admits(&self, modified: Option<SystemTime>) -> bool {
        if !self.enabled {
            return true;
        }
        match modified {
            Some(t) => {
                let day = DateTime::<Local>::from(t).date_naive();
                self.from <= day && day <= self.to
            }
            None => true,
        }
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        PlaylistSettings::default().scan
    }
}

impl ScanPolicy {
    /// Construit l'ensemble d'extensions normalisées depuis une liste séparée par des virgules
    pub fn parse_extensions(csv: &str) -> BTreeSet<String> {
        split_csv(csv)
            .map(|e| {
                let e = e.to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{}", e)
                }
            })
            .collect()
    }
}

/// Règles de tri et de limitation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderingPolicy {
    pub folder_sort_mode: FolderSortMode,
    pub file_sort_mode: FileSortMode,
    /// Noms de dossiers (minuscules) pour [`FolderSortMode::Custom`]
    pub custom_folder_order: Vec<String>,
    pub promote_newest_count: usize,
    /// Nombre de fichiers les plus récents remontés en tête de chaque dossier
    pub promote_newest_per_folder: usize,
    pub per_folder_limit: Option<usize>,
    pub global_limit: Option<usize>,
}

/// Options d'affichage des noms dans le manifeste
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayOptions {
    pub show_folder_name: bool,
    pub folder_name_position: FolderNamePosition,
    pub folder_name_color: Option<String>,
    pub clean_names: bool,
    pub show_metadata: bool,
}

/// Ensemble typé des réglages d'une génération de playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSettings {
    pub scan: ScanPolicy,
    pub ordering: OrderingPolicy,
    pub display: DisplayOptions,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self::from_snapshot(&SettingsSnapshot::new())
    }
}

/// Lecteur de table avec repli sur la valeur par défaut
struct SnapshotReader<'a> {
    snapshot: &'a SettingsSnapshot,
}

impl SnapshotReader<'_> {
    fn raw(&self, key: &str) -> &str {
        self.snapshot
            .get(key)
            .map(String::as_str)
            .unwrap_or_else(|| default_of(key))
    }

    fn parse<T: FromStr + Default>(&self, key: &str) -> T
    where
        T::Err: fmt::Display,
    {
        let raw = self.raw(key).trim();
        match raw.parse::<T>() {
            Ok(v) => v,
            Err(e) => {
                let default = default_of(key);
                warn!(key, value = raw, "Invalid setting ({}), using default {:?}", e, default);
                default.parse::<T>().unwrap_or_default()
            }
        }
    }

    fn boolean(&self, key: &str) -> bool {
        match self.raw(key).trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" | "" => false,
            other => {
                let default = default_of(key) == "true";
                warn!(key, value = other, "Invalid boolean setting, using default {}", default);
                default
            }
        }
    }

    fn count(&self, key: &str) -> u64 {
        self.parse::<u64>(key)
    }

    fn optional_count(&self, key: &str) -> Option<usize> {
        match self.count(key) {
            0 => None,
            n => Some(n as usize),
        }
    }

    fn date(&self, key: &str) -> NaiveDate {
        let raw = self.raw(key).trim();
        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => date,
            Err(e) => {
                let default = default_of(key);
                warn!(key, value = raw, "Invalid date setting ({}), using default {:?}", e, default);
                NaiveDate::parse_from_str(default, DATE_FORMAT).unwrap_or(NaiveDate::MIN)
            }
        }
    }

    fn csv_lower(&self, key: &str) -> Vec<String> {
        split_csv(self.raw(key)).map(|s| s.to_lowercase()).collect()
    }
}

fn split_csv(csv: &str) -> impl Iterator<Item = &str> {
    csv.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn join_csv<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

impl PlaylistSettings {
    /// Construit les réglages typés depuis une table plate.
    ///
    /// Les clés absentes prennent leur valeur par défaut ; les valeurs
    /// malformées aussi, avec un avertissement.
    pub fn from_snapshot(snapshot: &SettingsSnapshot) -> Self {
        let r = SnapshotReader { snapshot };

        let max_depth = r.count(keys::SCAN_DEPTH) as usize;
        if max_depth > MAX_SCAN_DEPTH {
            warn!(max_depth, "Scan depth capped at {}", MAX_SCAN_DEPTH);
        }
        let batch_size = match r.count(keys::BATCH_SIZE) {
            0 => {
                warn!("Batch size 0 is invalid, using default");
                default_of(keys::BATCH_SIZE).parse().unwrap_or(50)
            }
            n => n as usize,
        };

        let date_filter = DateFilter {
            enabled: r.boolean(keys::ENABLE_DATE_FILTER),
            from: r.date(keys::MIN_FILE_DATE),
            to: r.date(keys::MAX_FILE_DATE),
        };
        if date_filter.enabled && date_filter.from > date_filter.to {
            warn!(from = %date_filter.from, to = %date_filter.to, "Empty date range, every dated file is excluded");
        }

        let scan = ScanPolicy {
            extensions: ScanPolicy::parse_extensions(r.raw(keys::FILE_EXTENSIONS)),
            exclude_name_substrings: r.csv_lower(keys::EXCLUDE_PATTERN).into_iter().collect(),
            exclude_folder_names: r.csv_lower(keys::EXCLUDE_FOLDERS).into_iter().collect(),
            min_size_bytes: r.count(keys::MIN_FILE_SIZE).saturating_mul(MB),
            max_size_bytes: match r.count(keys::MAX_FILE_SIZE) {
                0 => None,
                n => Some(n.saturating_mul(MB)),
            },
            recursive: r.boolean(keys::RECURSIVE_SCAN),
            max_depth: max_depth.min(MAX_SCAN_DEPTH),
            batch_size,
            timeout: match r.count(keys::SCAN_TIMEOUT) {
                0 => None,
                n => Some(Duration::from_secs(n)),
            },
            date_filter,
        };

        let ordering = OrderingPolicy {
            folder_sort_mode: r.parse(keys::FOLDER_SORT_MODE),
            file_sort_mode: r.parse(keys::SORT_MODE),
            custom_folder_order: r.csv_lower(keys::CUSTOM_FOLDER_ORDER),
            promote_newest_count: r.count(keys::NEWEST_TO_TOP) as usize,
            promote_newest_per_folder: r.count(keys::NEWEST_PER_FOLDER_TO_TOP) as usize,
            per_folder_limit: r.optional_count(keys::FILES_PER_FOLDER),
            global_limit: r.optional_count(keys::GLOBAL_FILE_COUNT),
        };

        let color = r.raw(keys::FOLDER_NAME_COLOR).trim();
        let display = DisplayOptions {
            show_folder_name: r.boolean(keys::SHOW_FOLDER_NAMES),
            folder_name_position: r.parse(keys::FOLDER_NAME_POSITION),
            folder_name_color: (!color.is_empty()).then(|| color.to_string()),
            clean_names: r.boolean(keys::CLEAN_NAMES),
            show_metadata: r.boolean(keys::SHOW_METADATA),
        };

        Self {
            scan,
            ordering,
            display,
        }
    }

    /// Table plate équivalente ; inverse exact de [`PlaylistSettings::from_snapshot`]
    pub fn to_snapshot(&self) -> SettingsSnapshot {
        let bytes_to_mb = |b: u64| (b / MB).to_string();

        let mut s = SettingsSnapshot::new();
        let mut put = |k: &str, v: String| {
            s.insert(k.to_string(), v);
        };

        put(keys::FILE_EXTENSIONS, join_csv(&self.scan.extensions));
        put(
            keys::EXCLUDE_PATTERN,
            join_csv(&self.scan.exclude_name_substrings),
        );
        put(
            keys::EXCLUDE_FOLDERS,
            join_csv(&self.scan.exclude_folder_names),
        );
        put(keys::MIN_FILE_SIZE, bytes_to_mb(self.scan.min_size_bytes));
        put(
            keys::MAX_FILE_SIZE,
            bytes_to_mb(self.scan.max_size_bytes.unwrap_or(0)),
        );
        put(keys::RECURSIVE_SCAN, self.scan.recursive.to_string());
        put(keys::SCAN_DEPTH, self.scan.max_depth.to_string());
        put(keys::BATCH_SIZE, self.scan.batch_size.to_string());
        put(
            keys::SCAN_TIMEOUT,
            self.scan.timeout.map(|d| d.as_secs()).unwrap_or(0).to_string(),
        );
        put(
            keys::ENABLE_DATE_FILTER,
            self.scan.date_filter.enabled.to_string(),
        );
        put(
            keys::MIN_FILE_DATE,
            self.scan.date_filter.from.format(DATE_FORMAT).to_string(),
        );
        put(
            keys::MAX_FILE_DATE,
            self.scan.date_filter.to.format(DATE_FORMAT).to_string(),
        );
        put(keys::FOLDER_SORT_MODE, self.ordering.folder_sort_mode.to_string());
        put(keys::SORT_MODE, self.ordering.file_sort_mode.to_string());
        put(
            keys::CUSTOM_FOLDER_ORDER,
            join_csv(&self.ordering.custom_folder_order),
        );
        put(
            keys::NEWEST_TO_TOP,
            self.ordering.promote_newest_count.to_string(),
        );
        put(
            keys::NEWEST_PER_FOLDER_TO_TOP,
            self.ordering.promote_newest_per_folder.to_string(),
        );
        put(
            keys::FILES_PER_FOLDER,
            self.ordering.per_folder_limit.unwrap_or(0).to_string(),
        );
        put(
            keys::GLOBAL_FILE_COUNT,
            self.ordering.global_limit.unwrap_or(0).to_string(),
        );
        put(keys::SHOW_FOLDER_NAMES, self.display.show_folder_name.to_string());
        put(
            keys::FOLDER_NAME_POSITION,
            self.display.folder_name_position.as_str().to_string(),
        );
        put(
            keys::FOLDER_NAME_COLOR,
            self.display.folder_name_color.clone().unwrap_or_default(),
        );
        put(keys::CLEAN_NAMES, self.display.clean_names.to_string());
        put(keys::SHOW_METADATA, self.display.show_metadata.to_string());
        s
    }
}

/// Table plate contenant toutes les valeurs par défaut
pub fn default_snapshot() -> SettingsSnapshot {
    DEFAULTS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
