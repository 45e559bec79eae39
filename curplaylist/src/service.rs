//! Boucle de régénération automatique.
//!
//! À chaque cycle :
//! 1. le planning doit être activé ;
//! 2. la pression mémoire doit rester sous le seuil ;
//! 3. aucun lecteur multimédia ne doit être actif (si demandé) ;
//! 4. chaque set dont l'échéance est atteinte est régénéré, sur le pool
//!    bloquant de tokio.
//!
//! Entre deux cycles, la boucle dort jusqu'à la prochaine échéance, au plus
//! `tick`, et se termine dès que le jeton d'annulation est déclenché.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use curconfig::Config;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config_ext::PlaylistConfigExt;
use crate::error::{Error, Result};
use crate::schedule::{is_due, next_due, SchedulePolicy};
use crate::sets::{BatchSummary, SetStore};

/// Réglages de la boucle, lus dans la section `service`
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub tick: Duration,
    pub memory_threshold_percent: f64,
    pub pause_during_playback: bool,
    pub player_processes: Vec<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            memory_threshold_percent: 85.0,
            pause_during_playback: true,
            player_processes: vec!["kodi".into(), "mpv".into(), "vlc".into()],
        }
    }
}

/// Garde de pression sur les ressources
pub trait ResourceGuard: Send + Sync {
    fn is_safe(&self) -> bool;
}

/// Refuse les cycles quand la mémoire utilisée atteint le seuil
#[derive(Debug, Clone, Copy)]
pub struct MemoryGuard {
    threshold_percent: f64,
}

impl MemoryGuard {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }
}

impl ResourceGuard for MemoryGuard {
    fn is_safe(&self) -> bool {
        match curutils::memory_usage_percent() {
            Some(used) if used >= self.threshold_percent => {
                warn!(used = used, threshold = self.threshold_percent, "High memory usage");
                false
            }
            Some(_) => true,
            None => {
                debug!("Memory usage unavailable, assuming safe");
                true
            }
        }
    }
}

/// Détection d'une lecture en cours
pub trait PlaybackGuard: Send + Sync {
    fn is_playing(&self) -> bool;
}

/// Considère qu'une lecture est en cours si un lecteur connu tourne
#[derive(Debug, Clone)]
pub struct ProcessPlaybackGuard {
    players: Vec<String>,
}

impl ProcessPlaybackGuard {
    pub fn new(players: Vec<String>) -> Self {
        Self { players }
    }
}

impl PlaybackGuard for ProcessPlaybackGuard {
    fn is_playing(&self) -> bool {
        match curutils::find_running_process(&self.players) {
            Some(process) => {
                debug!(player = %process.name, pid = process.pid, "Media player running");
                true
            }
            None => false,
        }
    }
}

/// Ne détecte jamais de lecture
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPlaying;

impl PlaybackGuard for NeverPlaying {
    fn is_playing(&self) -> bool {
        false
    }
}

/// Issue d'un cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    Disabled,
    ResourcePressure,
    PlaybackActive,
    /// Sets échus traités (éventuellement aucun)
    Ran(BatchSummary),
}

/// Boucle de service
pub struct ServiceLoop {
    store: Arc<SetStore>,
    config: Arc<Config>,
    tick: Duration,
    resources: Box<dyn ResourceGuard>,
    playback: Box<dyn PlaybackGuard>,
}

impl ServiceLoop {
    pub fn new(
        store: Arc<SetStore>,
        config: Arc<Config>,
        tick: Duration,
        resources: Box<dyn ResourceGuard>,
        playback: Box<dyn PlaybackGuard>,
    ) -> Self {
        Self {
            store,
            config,
            tick: tick.max(Duration::from_secs(1)),
            resources,
            playback,
        }
    }

    /// Construit la boucle à partir de la section `service` de la configuration
    pub fn from_config(store: Arc<SetStore>, config: Arc<Config>) -> Result<Self> {
        let settings = config.get_service_settings()?;
        let playback: Box<dyn PlaybackGuard> = if settings.pause_during_playback {
            Box::new(ProcessPlaybackGuard::new(settings.player_processes.clone()))
        } else {
            Box::new(NeverPlaying)
        };
        Ok(Self::new(
            store,
            config,
            settings.tick,
            Box::new(MemoryGuard::new(settings.memory_threshold_percent)),
            playback,
        ))
    }

    fn schedule(&self) -> SchedulePolicy {
        match self.config.get_schedule() {
            Ok(schedule) => schedule,
            Err(e) => {
                warn!("Cannot read schedule: {}, scheduling disabled", e);
                SchedulePolicy::default()
            }
        }
    }

    /// Exécute un cycle comme s'il était `now`
    pub async fn run_cycle(&self, now: NaiveDateTime, cancel: &CancellationToken) -> CycleReport {
        let schedule = self.schedule();
        if !schedule.enabled {
            return CycleReport::Disabled;
        }
        if !self.resources.is_safe() {
            info!("Skipping update cycle: resource pressure");
            return CycleReport::ResourcePressure;
        }
        if self.playback.is_playing() {
            info!("Skipping update cycle: playback in progress");
            return CycleReport::PlaybackActive;
        }

        let sets = match self.store.list() {
            Ok(sets) => sets,
            Err(e) => {
                error!("Cannot read playlist sets: {}", e);
                return CycleReport::Ran(BatchSummary::default());
            }
        };

        let mut summary = BatchSummary::default();
        for set in sets {
            if cancel.is_cancelled() {
                break;
            }
            if !is_due(now, set.last_run(), schedule.interval, schedule.time) {
                continue;
            }

            summary.attempted += 1;
            let store = self.store.clone();
            let child = cancel.child_token();
            let name = set.name.clone();
            let result =
                tokio::task::spawn_blocking(move || store.create_playlist_from_set(&name, &child))
                    .await
                    .map_err(|e| Error::Task(e.to_string()))
                    .and_then(|r| r);

            match result {
                Ok(outcome) if outcome.is_written() => summary.succeeded += 1,
                Ok(outcome) => {
                    warn!(set = %set.name, "Scheduled update produced no playlist: {}", outcome);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(set = %set.name, "Scheduled update failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        if summary.attempted > 0 {
            info!("Scheduled update: {}", summary);
        }
        if summary.succeeded > 0 {
            if let Err(e) = self.config.record_schedule_run(now) {
                warn!("Cannot record last update time: {}", e);
            }
        }
        CycleReport::Ran(summary)
    }

    /// Durée de sommeil avant le prochain cycle : jusqu'à la prochaine
    /// échéance, bornée par `tick`. Une échéance déjà atteinte (set en échec
    /// ou garde active) attend un `tick` complet.
    pub fn sleep_duration(&self, now: NaiveDateTime) -> Duration {
        let schedule = self.schedule();
        if !schedule.enabled {
            return self.tick;
        }
        let Ok(sets) = self.store.list() else {
            return self.tick;
        };

        let next = sets
            .iter()
            .filter_map(|s| next_due(now, s.last_run(), schedule.interval, schedule.time))
            .min();

        match next {
            Some(at) if at > now => (at - now)
                .to_std()
                .map(|d| d.clamp(Duration::from_secs(1), self.tick))
                .unwrap_or(self.tick),
            _ => self.tick,
        }
    }

    /// Tourne jusqu'à l'annulation de `cancel`
    pub async fn run(&self, cancel: CancellationToken) {
        info!(tick_secs = self.tick.as_secs(), "Playlist service started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let now = Local::now().naive_local();
            let report = self.run_cycle(now, &cancel).await;
            debug!(?report, "Cycle finished");

            let pause = self.sleep_duration(Local::now().naive_local());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!("Playlist service stopped");
    }
}
