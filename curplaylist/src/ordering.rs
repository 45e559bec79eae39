//! Tri des entrées scannées.
//!
//! Étapes, dans l'ordre :
//! 1. regroupement par dossier parent
//! 2. tri des dossiers
//! 3. tri des fichiers dans chaque dossier
//! 4. remontée des N fichiers les plus récents de chaque dossier
//! 5. limite par dossier
//! 6. concaténation
//! 7. remontée des N fichiers les plus récents
//! 8. limite globale
//!
//! Le résultat est déterministe sauf en mode [`FileSortMode::Random`].
//! Une donnée manquante (date, durée) vaut 0.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::entry::MediaEntry;
use crate::policy::{FileSortMode, FolderSortMode, OrderingPolicy};

struct FolderGroup {
    dir: PathBuf,
    /// Clé de tri alphabétique : nom du dossier en minuscules
    name_key: String,
    newest: u128,
    entries: Vec<MediaEntry>,
}

fn basename_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| path.to_string_lossy().to_lowercase())
}

/// Trie `entries` selon `policy`
pub fn order(entries: Vec<MediaEntry>, policy: &OrderingPolicy) -> Vec<MediaEntry> {
    order_with_rng(entries, policy, &mut rand::rng())
}

/// Comme [`order`], avec un générateur aléatoire fourni pour le mode `Random`
pub fn order_with_rng<R: Rng + ?Sized>(
    entries: Vec<MediaEntry>,
    policy: &OrderingPolicy,
    rng: &mut R,
) -> Vec<MediaEntry> {
    let mut groups = group_by_parent(entries);
    sort_folders(&mut groups, policy);

    let mut ordered = Vec::new();
    for mut group in groups {
        sort_files(&mut group.entries, policy.file_sort_mode, rng);
        if policy.promote_newest_per_folder > 0 {
            group.entries = promote_newest(group.entries, policy.promote_newest_per_folder);
        }
        if let Some(limit) = policy.per_folder_limit {
            group.entries.truncate(limit);
        }
        ordered.extend(group.entries);
    }

    if policy.promote_newest_count > 0 {
        ordered = promote_newest(ordered, policy.promote_newest_count);
    }

    if let Some(limit) = policy.global_limit {
        ordered.truncate(limit);
    }
    ordered
}

/// Regroupe par dossier parent, dans l'ordre de première apparition
fn group_by_parent(entries: Vec<MediaEntry>) -> Vec<FolderGroup> {
    let mut index: HashMap<PathBuf, usize> = HashMap::new();
    let mut groups: Vec<FolderGroup> = Vec::new();

    for entry in entries {
        let slot = match index.get(entry.parent()) {
            Some(&i) => i,
            None => {
                let dir = entry.parent().to_path_buf();
                index.insert(dir.clone(), groups.len());
                groups.push(FolderGroup {
                    name_key: basename_key(&dir),
                    dir,
                    newest: 0,
                    entries: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[slot];
        group.newest = group.newest.max(entry.modified_key());
        group.entries.push(entry);
    }
    groups
}

fn alphabetical(a: &FolderGroup, b: &FolderGroup) -> Ordering {
    a.name_key.cmp(&b.name_key).then_with(|| a.dir.cmp(&b.dir))
}

fn sort_folders(groups: &mut [FolderGroup], policy: &OrderingPolicy) {
    match policy.folder_sort_mode {
        FolderSortMode::None => {}
        FolderSortMode::AToZ => groups.sort_by(alphabetical),
        FolderSortMode::ZToA => {
            groups.sort_by(alphabetical);
            groups.reverse();
        }
        FolderSortMode::RecentlyModified => {
            // Tri stable : à date égale, l'ordre du scan est conservé
            groups.sort_by(|a, b| b.newest.cmp(&a.newest));
        }
        FolderSortMode::Custom => {
            let rank = |g: &FolderGroup| {
                policy
                    .custom_folder_order
                    .iter()
                    .position(|name| *name == g.name_key)
                    .unwrap_or(policy.custom_folder_order.len())
            };
            groups.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| alphabetical(a, b)));
        }
    }
}

fn name_cmp(a: &MediaEntry, b: &MediaEntry) -> Ordering {
    basename_key(a.path())
        .cmp(&basename_key(b.path()))
        .then_with(|| a.path().cmp(b.path()))
}

fn sort_files<R: Rng + ?Sized>(entries: &mut [MediaEntry], mode: FileSortMode, rng: &mut R) {
    let duration = |e: &MediaEntry| e.duration_secs().unwrap_or(0);
    match mode {
        FileSortMode::None => {}
        FileSortMode::NewestFirst => {
            entries.sort_by(|a, b| b.modified_key().cmp(&a.modified_key()))
        }
        FileSortMode::OldestFirst => {
            entries.sort_by(|a, b| a.modified_key().cmp(&b.modified_key()))
        }
        FileSortMode::AToZ => entries.sort_by(name_cmp),
        FileSortMode::ZToA => {
            entries.sort_by(name_cmp);
            entries.reverse();
        }
        FileSortMode::Random => entries.shuffle(rng),
        FileSortMode::SizeAsc => entries.sort_by_key(|e| e.size_bytes()),
        FileSortMode::SizeDesc => entries.sort_by(|a, b| b.size_bytes().cmp(&a.size_bytes())),
        FileSortMode::DurationAsc => entries.sort_by_key(duration),
        FileSortMode::DurationDesc => entries.sort_by(|a, b| duration(b).cmp(&duration(a))),
    }
}

/// Remonte en tête les `count` entrées les plus récentes, de la plus récente à
/// la plus ancienne ; à date égale, la position d'origine départage.
/// Les autres entrées gardent leur ordre relatif.
fn promote_newest(entries: Vec<MediaEntry>, count: usize) -> Vec<MediaEntry> {
    let mut ranked: Vec<usize> = (0..entries.len()).collect();
    ranked.sort_by(|&a, &b| {
        entries[b]
            .modified_key()
            .cmp(&entries[a].modified_key())
            .then(a.cmp(&b))
    });
    ranked.truncate(count);

    let mut promoted = vec![false; entries.len()];
    for &i in &ranked {
        promoted[i] = true;
    }

    let mut slots: Vec<Option<MediaEntry>> = entries.into_iter().map(Some).collect();
    let mut result = Vec::with_capacity(slots.len());
    for &i in &ranked {
        if let Some(entry) = slots[i].take() {
            result.push(entry);
        }
    }
    for (i, slot) in slots.into_iter().enumerate() {
        if !promoted[i] {
            if let Some(entry) = slot {
                result.push(entry);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::{Duration, UNIX_EPOCH};

    fn entry(path: &str, size: u64, mtime: u64) -> MediaEntry {
        MediaEntry::new(path, size, Some(UNIX_EPOCH + Duration::from_secs(mtime)))
    }

    fn paths(entries: &[MediaEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.path().to_string_lossy().into_owned())
            .collect()
    }

    fn sample() -> Vec<MediaEntry> {
        vec![
            entry("/m/Beta/b2.mp4", 20, 5),
            entry("/m/alpha/a1.mp4", 30, 1),
            entry("/m/Beta/b1.mp4", 10, 9),
            entry("/m/gamma/g1.mp4", 5, 3),
            entry("/m/alpha/a2.mp4", 1, 7),
        ]
    }

    fn policy(folder: FolderSortMode, file: FileSortMode) -> OrderingPolicy {
        OrderingPolicy {
            folder_sort_mode: folder,
            file_sort_mode: file,
            ..OrderingPolicy::default()
        }
    }

    #[test]
    fn test_folder_none_keeps_first_appearance() {
        let out = order(sample(), &policy(FolderSortMode::None, FileSortMode::None));
        assert_eq!(
            paths(&out),
            vec![
                "/m/Beta/b2.mp4",
                "/m/Beta/b1.mp4",
                "/m/alpha/a1.mp4",
                "/m/alpha/a2.mp4",
                "/m/gamma/g1.mp4",
            ]
        );
    }

    #[test]
    fn test_folder_a_z_is_case_insensitive() {
        let out = order(sample(), &policy(FolderSortMode::AToZ, FileSortMode::AToZ));
        assert_eq!(
            paths(&out),
            vec![
                "/m/alpha/a1.mp4",
                "/m/alpha/a2.mp4",
                "/m/Beta/b1.mp4",
                "/m/Beta/b2.mp4",
                "/m/gamma/g1.mp4",
            ]
        );
    }

    #[test]
    fn test_folder_z_a_is_reverse_of_a_z() {
        // Mêmes noms de dossiers sous deux parents différents
        let mut input = sample();
        input.push(entry("/n/alpha/x.mp4", 1, 1));
        let mode = FileSortMode::SizeAsc;

        let az = order(input.clone(), &policy(FolderSortMode::AToZ, mode));
        let za = order(input, &policy(FolderSortMode::ZToA, mode));

        let folders = |v: &[MediaEntry]| {
            let mut dirs: Vec<PathBuf> = Vec::new();
            for e in v {
                if dirs.last().map(PathBuf::as_path) != Some(e.parent()) {
                    dirs.push(e.parent().to_path_buf());
                }
            }
            dirs
        };
        let mut reversed = folders(&az);
        reversed.reverse();
        assert_eq!(folders(&za), reversed);
    }

    #[test]
    fn test_custom_order_puts_unlisted_last_alphabetically() {
        let mut p = policy(FolderSortMode::Custom, FileSortMode::AToZ);
        p.custom_folder_order = vec!["gamma".into()];
        let out = order(sample(), &p);
        assert_eq!(
            paths(&out),
            vec![
                "/m/gamma/g1.mp4",
                "/m/alpha/a1.mp4",
                "/m/alpha/a2.mp4",
                "/m/Beta/b1.mp4",
                "/m/Beta/b2.mp4",
            ]
        );
    }

    #[test]
    fn test_recently_modified_folders() {
        let out = order(
            sample(),
            &policy(FolderSortMode::RecentlyModified, FileSortMode::NewestFirst),
        );
        assert_eq!(
            paths(&out),
            vec![
                "/m/Beta/b1.mp4",
                "/m/Beta/b2.mp4",
                "/m/alpha/a2.mp4",
                "/m/alpha/a1.mp4",
                "/m/gamma/g1.mp4",
            ]
        );
    }

    #[test]
    fn test_size_and_duration_modes() {
        let out = order(sample(), &policy(FolderSortMode::AToZ, FileSortMode::SizeDesc));
        assert_eq!(paths(&out)[0], "/m/alpha/a1.mp4");

        let timed = vec![
            entry("/d/a.mp4", 1, 1).with_duration(Some(100)),
            entry("/d/b.mp4", 1, 1),
            entry("/d/c.mp4", 1, 1).with_duration(Some(50)),
        ];
        let out = order(timed.clone(), &policy(FolderSortMode::None, FileSortMode::DurationAsc));
        assert_eq!(paths(&out), vec!["/d/b.mp4", "/d/c.mp4", "/d/a.mp4"]);
        let out = order(timed, &policy(FolderSortMode::None, FileSortMode::DurationDesc));
        assert_eq!(paths(&out), vec!["/d/a.mp4", "/d/c.mp4", "/d/b.mp4"]);
    }

    #[test]
    fn test_missing_mtime_sorts_as_oldest() {
        let input = vec![
            MediaEntry::new("/d/unknown.mp4", 1, None),
            entry("/d/known.mp4", 1, 10),
        ];
        let out = order(input, &policy(FolderSortMode::None, FileSortMode::NewestFirst));
        assert_eq!(paths(&out), vec!["/d/known.mp4", "/d/unknown.mp4"]);
    }

    #[test]
    fn test_random_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let input = sample();
        let out = order_with_rng(
            input.clone(),
            &policy(FolderSortMode::AToZ, FileSortMode::Random),
            &mut rng,
        );
        let mut a = paths(&out);
        let mut b = paths(&input);
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_limits() {
        let mut p = policy(FolderSortMode::AToZ, FileSortMode::AToZ);
        p.per_folder_limit = Some(1);
        let out = order(sample(), &p);
        assert_eq!(
            paths(&out),
            vec!["/m/alpha/a1.mp4", "/m/Beta/b1.mp4", "/m/gamma/g1.mp4"]
        );

        p.global_limit = Some(2);
        assert_eq!(order(sample(), &p).len(), 2);
    }

    #[test]
    fn test_promote_newest_moves_exactly_n() {
        let base = policy(FolderSortMode::AToZ, FileSortMode::AToZ);
        let unpromoted = paths(&order(sample(), &base));

        for n in 0..=7 {
            let mut p = base.clone();
            p.promote_newest_count = n;
            let out = paths(&order(sample(), &p));
            let moved = n.min(out.len());

            // Les plus récents d'abord : b1 (9), a2 (7), b2 (5), g1 (3), a1 (1)
            let newest = ["/m/Beta/b1.mp4", "/m/alpha/a2.mp4", "/m/Beta/b2.mp4", "/m/gamma/g1.mp4", "/m/alpha/a1.mp4"];
            assert_eq!(&out[..moved], &newest[..moved]);

            let rest: Vec<String> = unpromoted
                .iter()
                .filter(|p| !newest[..moved].contains(&p.as_str()))
                .cloned()
                .collect();
            assert_eq!(&out[moved..], rest.as_slice());
        }
    }

    #[test]
    fn test_promote_ties_keep_original_position() {
        let input = vec![
            entry("/d/x.mp4", 1, 5),
            entry("/d/y.mp4", 1, 9),
            entry("/d/z.mp4", 1, 9),
        ];
        let mut p = policy(FolderSortMode::None, FileSortMode::None);
        p.promote_newest_count = 1;
        assert_eq!(
            paths(&order(input, &p)),
            vec!["/d/y.mp4", "/d/x.mp4", "/d/z.mp4"]
        );
    }

    #[test]
    fn test_promote_newest_per_folder() {
        let mut p = policy(FolderSortMode::AToZ, FileSortMode::AToZ);
        p.promote_newest_per_folder = 1;
        assert_eq!(
            paths(&order(sample(), &p)),
            vec![
                "/m/alpha/a2.mp4",
                "/m/alpha/a1.mp4",
                "/m/Beta/b1.mp4",
                "/m/Beta/b2.mp4",
                "/m/gamma/g1.mp4",
            ]
        );

        // La remontée précède la limite par dossier
        p.file_sort_mode = FileSortMode::OldestFirst;
        p.per_folder_limit = Some(1);
        assert_eq!(
            paths(&order(sample(), &p)),
            vec!["/m/alpha/a2.mp4", "/m/Beta/b1.mp4", "/m/gamma/g1.mp4"]
        );
    }
}
