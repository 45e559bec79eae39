/// Sondes système utilisées par la boucle de service.
///
/// Ce module fournit deux mesures ponctuelles de l'état de la machine :
///
/// - [`memory_usage_percent`] : pourcentage de mémoire physique utilisée
/// - [`find_running_process`] : détection d'un processus (typiquement un lecteur
///   multimédia) parmi une liste de noms
///
/// # Examples
///
/// ```no_run
/// use curutils::{find_running_process, memory_usage_percent};
///
/// if let Some(used) = memory_usage_percent() {
///     println!("Mémoire utilisée: {:.1}%", used);
/// }
/// let player = find_running_process(&["kodi", "mpv"]);
/// println!("Lecteur actif: {:?}", player);
/// ```
mod process;

pub use process::{RunningProcess, find_running_process, memory_usage_percent};
