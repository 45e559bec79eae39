// logs.rs
use curconfig::Config;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Registry,
    filter::LevelFilter,
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
};

/// Variable d'environnement acceptant une directive `EnvFilter`
pub const LOG_ENV: &str = "CURATOR_LOG";

/// Poignée sur le niveau de log courant
pub struct LogHandle {
    reload_handle: reload::Handle<LevelFilter, Registry>,
}

impl LogHandle {
    pub fn set_max_level(&self, level: Level) {
        let level_filter = LevelFilter::from_level(level);
        if let Err(e) = self.reload_handle.reload(level_filter) {
            eprintln!("Failed to reload log level filter: {}", e);
        }
    }
}

pub fn init_logging(config: &Config) -> LogHandle {
    let log_level = match config.get_log_min_level() {
        Ok(l) => string_to_level(&l)
            .map(LevelFilter::from_level)
            .unwrap_or(LevelFilter::INFO),
        Err(_) => LevelFilter::INFO,
    };

    // `CURATOR_LOG=curplaylist=debug` remplace le niveau de la configuration
    let env_filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok());
    let log_level = if env_filter.is_some() {
        LevelFilter::TRACE
    } else {
        log_level
    };

    let (filter, reload_handle) = reload::Layer::new(log_level);

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let console = enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
    });

    Registry::default()
        .with(filter)
        .with(env_filter)
        .with(console)
        .init();

    LogHandle { reload_handle }
}

pub fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}
