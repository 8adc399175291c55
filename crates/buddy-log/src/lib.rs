// ABOUTME: Tracing setup for the opco-buddy binaries
// ABOUTME: One-shot commands log to stderr; the interactive session logs to a file so answers stay readable

use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Dependencies that are chatty at INFO
const QUIET: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

/// RUST_LOG when set, otherwise `default` with HTTP internals held at WARN
fn filter(default: Level) -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::from_default_env();
    }
    QUIET
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(
            EnvFilter::default().add_directive(default.into()),
            EnvFilter::add_directive,
        )
}

/// Log to stderr at INFO
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(filter(Level::INFO)).init();
}

/// Log to `log_file(app_name)` at INFO and return its path.
/// On failure a warning goes to stderr and the session runs without logs.
pub fn init_file(app_name: &str) -> Option<PathBuf> {
    match init_file_inner(app_name) {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("Warning: failed to set up file logging: {e}");
            None
        }
    }
}

/// ~/.config/opco-buddy/logs/{app_name}.log
pub fn log_file(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| {
        dir.join("opco-buddy")
            .join("logs")
            .join(format!("{app_name}.log"))
    })
}

fn init_file_inner(app_name: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = log_file(app_name).ok_or("could not determine config directory")?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_env_filter(filter(Level::INFO))
        .with_ansi(false)
        .init();

    Ok(path)
}
