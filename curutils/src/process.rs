use sysinfo::System;

/// Processus trouvé par [`find_running_process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub pid: u32,
    pub name: String,
}

/// Retourne le pourcentage de mémoire physique utilisée (0.0 à 100.0).
///
/// Retourne `None` si la mémoire totale ne peut pas être lue.
pub fn memory_usage_percent() -> Option<f64> {
    let mut system = System::new();
    system.refresh_memory();
    usage_percent(system.used_memory(), system.total_memory())
}

fn usage_percent(used: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(used as f64 * 100.0 / total as f64)
}

/// Cherche un processus dont le nom correspond à l'un des `names`.
///
/// La comparaison ignore la casse et l'extension `.exe` ; un nom de la liste
/// correspond aussi lorsqu'il est un préfixe du nom du processus (`kodi`
/// reconnaît `kodi.bin`).
pub fn find_running_process<S: AsRef<str>>(names: &[S]) -> Option<RunningProcess> {
    if names.is_empty() {
        return None;
    }

    let mut system = System::new();
    system.refresh_processes();

    system.processes().iter().find_map(|(pid, process)| {
        let name = process.name();
        if names.iter().any(|n| matches_name(name, n.as_ref())) {
            Some(RunningProcess {
                pid: pid.as_u32(),
                name: name.to_string(),
            })
        } else {
            None
        }
    })
}

fn matches_name(process_name: &str, wanted: &str) -> bool {
    let wanted = wanted.trim().to_lowercase();
    if wanted.is_empty() {
        return false;
    }
    let lower = process_name.to_lowercase();
    let stem = lower.strip_suffix(".exe").unwrap_or(&lower);
    stem == wanted || stem.starts_with(&format!("{}.", wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percent() {
        assert_eq!(usage_percent(0, 0), None);
        assert_eq!(usage_percent(50, 200), Some(25.0));
    }

    #[test]
    fn test_matches_name() {
        assert!(matches_name("kodi", "kodi"));
        assert!(matches_name("Kodi.exe", "kodi"));
        assert!(matches_name("kodi.bin", "KODI"));
        assert!(!matches_name("kodiak", "kodi"));
        assert!(!matches_name("mpv", ""));
    }

    #[test]
    fn test_empty_names_never_match() {
        let names: [&str; 0] = [];
        assert_eq!(find_running_process(&names), None);
    }

    #[test]
    fn test_memory_probe_is_bounded() {
        if let Some(used) = memory_usage_percent() {
            assert!((0.0..=100.0).contains(&used));
        }
    }
}
