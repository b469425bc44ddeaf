use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_DIR: &str = ".archive";

/// Log to a file, since the terminal belongs to the chat screen
pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let log_dir = std::env::current_dir()?.join(LOG_DIR);
    std::fs::create_dir_all(&log_dir)?;
    setup_logging_in(&log_dir, verbose)
}

fn setup_logging_in(log_dir: &Path, verbose: bool) -> anyhow::Result<()> {
    let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, "tui.log");

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let filter = if verbose {
        EnvFilter::new("dspy_archive=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dspy_archive=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
