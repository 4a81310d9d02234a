//! Process logging.
//!
//! `log` + `env_logger` with an `info` default filter (`RUST_LOG` still wins).
//! With a log file configured, records are appended to it as
//! `timestamp - LEVEL - message`; otherwise env_logger's stderr output is used.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::LogSettings;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Install the global logger. A second call is a no-op.
pub fn init(settings: &LogSettings) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.level));

    if let Some(path) = &settings.file {
        let file = open_log_file(path)?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} - {} - {}",
                    chrono::Local::now().format(TIMESTAMP_FORMAT),
                    record.level(),
                    record.args()
                )
            });
    }

    if builder.try_init().is_err() {
        log::debug!("logger already initialised");
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
