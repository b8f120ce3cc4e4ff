use tracing::Level;

pub const LOG_LEVEL_ENV: &str = "NRFEED_LOG";

pub fn init_logging() {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    init_logging_with(level);
}

pub fn init_logging_with(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_thread_names(true)
        .try_init();
}
