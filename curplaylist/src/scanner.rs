//! Parcours récursif des dossiers racine.
//!
//! [`DirectoryScanner::scan`] retourne un [`Scan`], itérateur paresseux et
//! fini sur les [`MediaEntry`] acceptées. Chaque appel repart de zéro.
//!
//! Chaque racine est parcourue avec [`walkdir`] en suivant les liens
//! symboliques : les fichiers d'un dossier, triés par nom, précèdent ses
//! sous-dossiers. Les entrées sont examinées par lots de `batch_size` ; un
//! lot s'arrête aussi à l'entrée dans un dossier. L'annulation et le délai
//! maximal sont vérifiés entre deux lots, jamais au milieu d'un lot. Une
//! erreur de lecture (y compris une boucle de liens) est journalisée et
//! l'entrée est ignorée.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, FilterEntry, WalkDir};

use crate::entry::MediaEntry;
use crate::filter::PathFilter;
use crate::policy::ScanPolicy;

/// Observateur de progression, appelé une fois par dossier racine
pub trait ProgressSink: Send + Sync {
    fn progress(&self, percent: u8, message: &str);
}

/// Observateur qui ignore tout
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _percent: u8, _message: &str) {}
}

/// Manière dont un scan s'est terminé
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Complete,
    Cancelled,
    TimedOut,
}

impl ScanStatus {
    pub fn is_partial(&self) -> bool {
        !matches!(self, ScanStatus::Complete)
    }
}

/// Résultat complet d'un scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub entries: Vec<MediaEntry>,
    pub status: ScanStatus,
}

impl ScanOutcome {
    pub fn is_partial(&self) -> bool {
        self.status.is_partial()
    }
}

pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Démarre un scan des `roots` selon `policy`.
    ///
    /// Le délai `policy.timeout` commence à courir à cet appel.
    pub fn scan<I, P>(roots: I, policy: &ScanPolicy, cancel: &CancellationToken) -> Scan
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: VecDeque<PathBuf> = roots
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        let mut policy = policy.clone();
        policy.batch_size = policy.batch_size.max(1);

        Scan {
            deadline: policy.timeout.map(|t| Instant::now() + t),
            policy,
            cancel: cancel.clone(),
            root_count: roots.len(),
            roots,
            walker: None,
            ready: VecDeque::new(),
            seen: HashSet::new(),
            progress: None,
            status: None,
            accepted: 0,
            folders: 0,
        }
    }
}

type EntryFilter = Box<dyn FnMut(&DirEntry) -> bool + Send>;
type Walker = FilterEntry<walkdir::IntoIter, EntryFilter>;

/// Parcours d'une racine : fichiers avant dossiers, puis par nom
fn walk(root: &Path, policy: &ScanPolicy) -> Walker {
    let descend = policy.clone();
    let keep: EntryFilter = Box::new(move |entry: &DirEntry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || PathFilter::new(&descend)
                .descends(&entry.file_name().to_string_lossy(), entry.depth() - 1)
    });

    WalkDir::new(root)
        .follow_links(true)
        .max_depth(policy.max_depth + 1)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(keep)
}

/// Scan en cours ; voir [`DirectoryScanner::scan`]
pub struct Scan {
    policy: ScanPolicy,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    root_count: usize,
    roots: VecDeque<PathBuf>,
    walker: Option<Walker>,
    ready: VecDeque<MediaEntry>,
    seen: HashSet<PathBuf>,
    progress: Option<Arc<dyn ProgressSink>>,
    status: Option<ScanStatus>,
    accepted: usize,
    folders: usize,
}

impl Scan {
    /// Rapporte la progression à `sink` au début de chaque dossier racine
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// `None` tant que le scan n'est pas terminé
    pub fn status(&self) -> Option<ScanStatus> {
        self.status
    }

    /// Consomme le scan et retourne toutes les entrées avec le statut final
    pub fn finish(mut self) -> ScanOutcome {
        let entries: Vec<MediaEntry> = self.by_ref().collect();
        ScanOutcome {
            entries,
            status: self.status.unwrap_or(ScanStatus::Complete),
        }
    }

    fn interruption(&self) -> Option<ScanStatus> {
        if self.cancel.is_cancelled() {
            return Some(ScanStatus::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ScanStatus::TimedOut),
            _ => None,
        }
    }

    fn stop(&mut self, status: ScanStatus) {
        match status {
            ScanStatus::Complete => info!(
                accepted = self.accepted,
                folders = self.folders,
                "Scan complete"
            ),
            ScanStatus::Cancelled => warn!(
                accepted = self.accepted,
                folders = self.folders,
                "Scan cancelled, returning partial result"
            ),
            ScanStatus::TimedOut => warn!(
                accepted = self.accepted,
                folders = self.folders,
                "Scan timed out, returning partial result"
            ),
        }
        self.status = Some(status);
        self.roots.clear();
        self.walker = None;
    }

    fn start_root(&mut self, root: PathBuf) {
        let index = self.root_count - self.roots.len() - 1;
        if let Some(sink) = &self.progress {
            let percent = (index * 100 / self.root_count.max(1)) as u8;
            sink.progress(percent, &format!("Scanning {}", root.display()));
        }
        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => self.walker = Some(walk(&root, &self.policy)),
            Ok(_) => warn!(root = %root.display(), "Scan root is not a directory, skipping"),
            Err(e) => warn!(root = %root.display(), "Cannot access scan root: {}", e),
        }
    }

    /// Examine au plus `batch_size` entrées ; s'arrête après l'entrée dans un dossier
    fn process_batch(&mut self) {
        let Some(walker) = self.walker.as_mut() else {
            return;
        };
        let filter = PathFilter::new(&self.policy);
        let mut exhausted = false;

        for _ in 0..self.policy.batch_size {
            let entry = match walker.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    match e.loop_ancestor() {
                        Some(ancestor) => debug!(
                            ancestor = %ancestor.display(),
                            "Symbolic link loop, skipping: {}",
                            e
                        ),
                        None => warn!("Cannot read entry, skipping: {}", e),
                    }
                    continue;
                }
                None => {
                    exhausted = true;
                    break;
                }
            };

            if entry.file_type().is_dir() {
                debug!(dir = %entry.path().display(), depth = entry.depth(), "Scanning folder");
                self.folders += 1;
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %entry.path().display(), "Cannot stat entry, skipping: {}", e);
                    continue;
                }
            };
            let modified = meta.modified().ok();
            if filter.accepts(&entry.file_name().to_string_lossy(), meta.len())
                && filter.accepts_modified(modified)
                && self.seen.insert(entry.path().to_path_buf())
            {
                self.ready
                    .push_back(MediaEntry::new(entry.into_path(), meta.len(), modified));
                self.accepted += 1;
            }
        }

        if exhausted {
            self.walker = None;
        }
    }
}

impl Iterator for Scan {
    type Item = MediaEntry;

    fn next(&mut self) -> Option<MediaEntry> {
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some(entry);
            }
            if self.status.is_some() {
                return None;
            }
            // Point de contrôle : entre deux lots
            if let Some(status) = self.interruption() {
                self.stop(status);
                continue;
            }

            if self.walker.is_some() {
                self.process_batch();
                continue;
            }

            match self.roots.pop_front() {
                Some(root) => self.start_root(root),
                None => self.stop(ScanStatus::Complete),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PlaylistSettings;
    use std::fs::File;
    use std::time::Duration;

    fn touch(path: &Path, size: u64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap().set_len(size).unwrap();
    }

    fn policy() -> ScanPolicy {
        let mut p = PlaylistSettings::default().scan;
        p.min_size_bytes = 0;
        p.batch_size = 2;
        p
    }

    fn names(entries: &[MediaEntry]) -> Vec<String> {
        entries.iter().map(|e| e.file_name()).collect()
    }

    #[test]
    fn test_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("root.mp4"), 1);
        touch(&dir.path().join("a/one.mp4"), 1);
        touch(&dir.path().join("a/b/two.mp4"), 1);
        touch(&dir.path().join("a/b/c/three.mp4"), 1);

        let mut p = policy();
        p.max_depth = 2;
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(out.status, ScanStatus::Complete);
        assert_eq!(names(&out.entries), vec!["root.mp4", "one.mp4", "two.mp4"]);

        p.max_depth = 0;
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(names(&out.entries), vec!["root.mp4"]);
    }

    #[test]
    fn test_excluded_folder_is_not_entered() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Extras/bonus.mp4"), 1);
        touch(&dir.path().join("main/film.mp4"), 1);

        let mut p = policy();
        p.exclude_folder_names.insert("extras".into());
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(names(&out.entries), vec!["film.mp4"]);
    }

    #[test]
    fn test_cancelled_scan_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(&dir.path().join(format!("f{i}.mp4")), 1);
        }
        let token = CancellationToken::new();
        let mut scan = DirectoryScanner::scan([dir.path()], &policy(), &token);

        // Le premier lot (2 fichiers) est produit avant l'annulation
        let first = scan.next().unwrap();
        assert_eq!(first.file_name(), "f0.mp4");
        token.cancel();
        let rest: Vec<_> = scan.by_ref().collect();
        assert_eq!(names(&rest), vec!["f1.mp4"]);
        assert_eq!(scan.status(), Some(ScanStatus::Cancelled));
    }

    #[test]
    fn test_zero_timeout_times_out() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.mp4"), 1);
        let mut p = policy();
        p.timeout = Some(Duration::ZERO);
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(out.status, ScanStatus::TimedOut);
        assert!(out.entries.is_empty());
        assert!(out.is_partial());
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.mp4"), 1);
        let missing = dir.path().join("missing");
        let out = DirectoryScanner::scan(
            [missing.as_path(), dir.path()],
            &policy(),
            &CancellationToken::new(),
        )
        .finish();
        assert_eq!(out.status, ScanStatus::Complete);
        assert_eq!(names(&out.entries), vec!["a.mp4"]);
    }

    #[test]
    fn test_overlapping_roots_yield_unique_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("sub/a.mp4"), 1);
        let sub = dir.path().join("sub");
        let out = DirectoryScanner::scan(
            [dir.path(), sub.as_path()],
            &policy(),
            &CancellationToken::new(),
        )
        .finish();
        assert_eq!(out.entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_visited_once() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/film.mp4"), 1);
        std::os::unix::fs::symlink(dir.path(), dir.path().join("a/loop")).unwrap();

        let mut p = policy();
        p.max_depth = 10;
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(names(&out.entries), vec!["film.mp4"]);
    }

    #[test]
    fn test_modification_date_filter() {
        use chrono::NaiveDate;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("old.mp4"), 1);
        touch(&dir.path().join("recent.mp4"), 1);
        // 2015-01-01
        let old = std::time::UNIX_EPOCH + Duration::from_secs(1_420_070_400);
        File::options()
            .write(true)
            .open(dir.path().join("old.mp4"))
            .unwrap()
            .set_modified(old)
            .unwrap();

        let mut p = policy();
        p.date_filter.enabled = true;
        p.date_filter.from = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        p.date_filter.to = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(names(&out.entries), vec!["old.mp4"]);

        p.date_filter.enabled = false;
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(names(&out.entries), vec!["old.mp4", "recent.mp4"]);
    }

    #[test]
    fn test_non_recursive_scan_stays_in_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.mp4"), 1);
        touch(&dir.path().join("a/inner.mp4"), 1);
        touch(&dir.path().join("c.mkv"), 1);

        let mut p = policy();
        p.recursive = false;
        p.max_depth = 5;
        let out = DirectoryScanner::scan([dir.path()], &p, &CancellationToken::new()).finish();
        assert_eq!(names(&out.entries), vec!["b.mp4", "c.mkv"]);
    }

    struct Recorder(std::sync::Mutex<Vec<u8>>);

    impl ProgressSink for Recorder {
        fn progress(&self, percent: u8, _message: &str) {
            self.0.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn test_progress_once_per_root() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let sink = Arc::new(Recorder(std::sync::Mutex::new(Vec::new())));
        let _ = DirectoryScanner::scan([a.path(), b.path()], &policy(), &CancellationToken::new())
            .with_progress(sink.clone())
            .finish();
        assert_eq!(*sink.0.lock().unwrap(), vec![0, 50]);
    }
}
