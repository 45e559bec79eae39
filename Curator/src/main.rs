mod logs;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::{Parser, Subcommand};
use curconfig::{Config, get_config};
use curplaylist::{
    IntervalKind, ManifestWriter, Pipeline, PlaylistConfigExt, ProgressSink, RunOutcome,
    ServiceLoop, SetStore, TimeOfDay, format_timestamp, next_due,
};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "curator", about = "Media folder playlist curator", version)]
struct Cli {
    /// Configuration directory (defaults to $CURATOR_CONFIG, ./.curator, ~/.curator)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a playlist from folders with the current settings
    Create {
        #[arg(long)]
        name: String,
        /// Also save folders and settings as a set
        #[arg(long)]
        save_set: bool,
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
    /// Manage playlist sets
    Sets {
        #[command(subcommand)]
        action: SetsAction,
    },
    /// Show or edit the update schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Regenerate sets on schedule until Ctrl+C
    Service,
    /// Show or edit service, backup and logging options
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SetsAction {
    List,
    /// Save a set with the current settings
    Save {
        name: String,
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
    /// Regenerate one set
    Run { name: String },
    /// Regenerate every set
    RunAll,
    Delete { name: String },
    /// Copy a set's settings into the current settings
    Apply { name: String },
    SetFolders {
        name: String,
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    Show,
    Set {
        #[arg(long)]
        enabled: Option<bool>,
        /// hourly, daily or weekly
        #[arg(long)]
        interval: Option<IntervalKind>,
        /// HH:MM
        #[arg(long)]
        time: Option<TimeOfDay>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set {
        /// Seconds between two service checks
        #[arg(long)]
        tick_secs: Option<u64>,
        /// Skip service cycles above this memory usage
        #[arg(long)]
        memory_threshold: Option<u64>,
        #[arg(long)]
        pause_during_playback: Option<bool>,
        /// Manifest backups kept, 0 disables backups
        #[arg(long)]
        max_backups: Option<i64>,
        #[arg(long)]
        log_console: Option<bool>,
        /// error, warn, info, debug or trace
        #[arg(long)]
        log_level: Option<String>,
    },
}

/// Relaie la progression dans les logs
struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&self, percent: u8, message: &str) {
        info!(percent = percent, "{}", message);
    }
}

fn load_config(dir: Option<&PathBuf>) -> Result<Arc<Config>> {
    match dir {
        Some(dir) => {
            let dir = dir
                .to_str()
                .ok_or_else(|| anyhow!("configuration path is not valid UTF-8"))?;
            Ok(Arc::new(Config::load_config(dir)?))
        }
        None => Ok(get_config()),
    }
}

fn open_store(config: &Arc<Config>) -> Result<Arc<SetStore>> {
    let pipeline = Pipeline::new(ManifestWriter::new(config.get_max_backups()?))
        .with_progress(Arc::new(LogProgress));
    let store = SetStore::from_config(config.clone())?.with_pipeline(pipeline);
    Ok(Arc::new(store))
}

/// Annule `cancel` au premier Ctrl+C
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            cancel.cancel();
        }
    });
}

/// Exécute une génération bloquante sur le pool dédié
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> curplaylist::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f)
        .await
        .context("playlist task panicked")??)
}

fn report(outcome: &RunOutcome) -> ExitCode {
    if outcome.is_written() {
        println!("{}", outcome);
        ExitCode::SUCCESS
    } else {
        eprintln!("No playlist written: {}", outcome);
        ExitCode::FAILURE
    }
}

async fn run_sets(action: SetsAction, store: Arc<SetStore>, cancel: CancellationToken) -> Result<ExitCode> {
    match action {
        SetsAction::List => {
            let sets = store.list()?;
            if sets.is_empty() {
                println!("No playlist sets");
            }
            for set in sets {
                let last = set
                    .last_run()
                    .map(|t| format_timestamp(&t))
                    .unwrap_or_else(|| "never".to_string());
                println!("{} (last run: {})", set.name, last);
                for folder in &set.folders {
                    println!("  {}", folder.display());
                }
            }
        }
        SetsAction::Save { name, folders } => {
            let settings = store.live_settings();
            store.save(&name, &folders, &settings)?;
            println!("Saved set {}", name);
        }
        SetsAction::Run { name } => {
            let outcome = blocking(move || store.create_playlist_from_set(&name, &cancel)).await?;
            return Ok(report(&outcome));
        }
        SetsAction::RunAll => {
            let summary = blocking(move || store.update_all(&cancel)).await?;
            println!("{}", summary);
            if summary.failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        SetsAction::Delete { name } => {
            if !store.delete_set(&name)? {
                eprintln!("No set named {}", name);
                return Ok(ExitCode::FAILURE);
            }
            println!("Deleted set {}", name);
        }
        SetsAction::Apply { name } => {
            if !store.apply_settings(&name)? {
                eprintln!("No set named {}", name);
                return Ok(ExitCode::FAILURE);
            }
            println!("Applied settings of {}", name);
        }
        SetsAction::SetFolders { name, folders } => {
            store.update_folders(&name, &folders)?;
            println!("Updated folders of {}", name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_schedule(action: ScheduleAction, config: &Config) -> Result<ExitCode> {
    if let ScheduleAction::Set {
        enabled,
        interval,
        time,
    } = action
    {
        if let Some(enabled) = enabled {
            config.set_schedule_enabled(enabled)?;
        }
        if let Some(interval) = interval {
            config.set_schedule_interval(interval)?;
        }
        if let Some(time) = time {
            config.set_schedule_time(time)?;
        }
    }

    let schedule = config.get_schedule()?;
    println!("enabled:  {}", schedule.enabled);
    println!("interval: {}", schedule.interval);
    println!("time:     {}", schedule.time);
    match schedule.last_run {
        Some(t) => println!("last run: {}", format_timestamp(&t)),
        None => println!("last run: never"),
    }
    if schedule.enabled {
        let now = Local::now().naive_local();
        if let Some(next) = next_due(now, schedule.last_run, schedule.interval, schedule.time) {
            println!("next run: {}", format_timestamp(&next));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_config(action: ConfigAction, config: &Config) -> Result<ExitCode> {
    if let ConfigAction::Set {
        tick_secs,
        memory_threshold,
        pause_during_playback,
        max_backups,
        log_console,
        log_level,
    } = action
    {
        if let Some(secs) = tick_secs {
            config.set_service_tick_secs(secs.max(1))?;
        }
        if let Some(percent) = memory_threshold {
            if percent > 100 {
                return Err(anyhow!("memory threshold must be at most 100, got {}", percent));
            }
            config.set_memory_threshold_percent(percent)?;
        }
        if let Some(pause) = pause_during_playback {
            config.set_pause_during_playback(pause)?;
        }
        if let Some(count) = max_backups {
            config.set_max_backups(count)?;
        }
        if let Some(enabled) = log_console {
            config.set_log_enable_console(enabled)?;
        }
        if let Some(level) = log_level {
            let level = logs::string_to_level(&level)
                .ok_or_else(|| anyhow!("unknown log level {:?}", level))?;
            config.set_log_min_level(level.to_string())?;
        }
    }

    println!("service tick:          {}s", config.get_service_tick_secs()?);
    println!("memory threshold:      {}%", config.get_memory_threshold_percent()?);
    println!("pause during playback: {}", config.get_pause_during_playback()?);
    println!("max backups:           {}", config.get_max_backups()?);
    println!("log to console:        {}", config.get_log_enable_console()?);
    println!("log level:             {}", config.get_log_min_level()?);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    let log = logs::init_logging(&config);
    if cli.verbose {
        log.set_max_level(Level::DEBUG);
    }

    let cancel = CancellationToken::new();

    match cli.command {
        Command::Create {
            name,
            save_set,
            folders,
        } => {
            let store = open_store(&config)?;
            cancel_on_ctrl_c(cancel.clone());
            let outcome =
                blocking(move || store.create_playlist(&folders, &name, save_set, &cancel)).await?;
            Ok(report(&outcome))
        }
        Command::Sets { action } => {
            let store = open_store(&config)?;
            cancel_on_ctrl_c(cancel.clone());
            run_sets(action, store, cancel).await
        }
        Command::Schedule { action } => run_schedule(action, &config),
        Command::Config { action } => run_config(action, &config),
        Command::Service => {
            let store = open_store(&config)?;
            let service = ServiceLoop::from_config(store, config.clone())?;
            cancel_on_ctrl_c(cancel.clone());
            info!("Press Ctrl+C to stop...");
            service.run(cancel).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}
