//! Logging init: append to a file under the XDG state dir, or to stderr.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,sma_core=debug,sma=debug";

/// Per-event writer: a clone of the log file, or stderr if cloning fails.
enum LogSink {
    File(fs::File),
    Stderr,
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct SharedFile(fs::File);

impl<'a> MakeWriter<'a> for SharedFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogSink::File)
            .unwrap_or(LogSink::Stderr)
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `~/.local/state/sma/sma.log`
pub fn log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sma")?;
    Ok(xdg_dirs.get_state_home().join("sma").join("sma.log"))
}

/// Initialize structured logging to the state-dir log file.
/// Returns Err when the file cannot be opened so the caller can fall back to stderr.
pub fn init_logging() -> Result<()> {
    let path = log_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(BoxMakeWriter::new(SharedFile(file)))
        .with_ansi(false)
        .init();

    tracing::info!("sma logging initialized at {}", path.display());
    Ok(())
}

/// Logging to stderr only; used for `log_to_console` and as the fallback.
pub fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

/// Picks the sink from the `log_to_console` setting, never failing.
pub fn init(log_to_console: bool) {
    if log_to_console {
        init_logging_stderr();
        return;
    }
    if let Err(e) = init_logging() {
        init_logging_stderr();
        tracing::warn!("log file unavailable ({:#}), logging to stderr", e);
    }
}
