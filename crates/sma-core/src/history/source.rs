//! Where channel history comes from.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use super::{parse_history, HistoryError, HistoryRecord};

/// Produces the full (unfiltered) history of a channel.
///
/// Blocking; call from `spawn_blocking` if used from async code.
pub trait HistorySource: Send + Sync {
    fn fetch_history(&self, token: &str, channel: &str) -> Result<Vec<HistoryRecord>, HistoryError>;
}

/// Runs `slack-history-export -t TOKEN -c CHANNEL -F json -f FILE` and parses
/// the file it writes. The file lives in a temp dir removed on return.
#[derive(Debug, Clone)]
pub struct ExportCommandSource {
    program: String,
}

impl ExportCommandSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_error(&self, reason: impl Into<String>) -> HistoryError {
        HistoryError::Command {
            program: self.program.clone(),
            reason: reason.into(),
        }
    }
}

impl Default for ExportCommandSource {
    fn default() -> Self {
        Self::new("slack-history-export")
    }
}

impl HistorySource for ExportCommandSource {
    fn fetch_history(&self, token: &str, channel: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
        let scratch = tempfile::Builder::new()
            .prefix("sma-history")
            .tempdir()
            .map_err(|e| self.command_error(format!("temp dir: {}", e)))?;
        let out_path = scratch.path().join("history.json");

        tracing::debug!(program = %self.program, channel, "running history export");
        let output = Command::new(&self.program)
            .arg("-t")
            .arg(token)
            .arg("-c")
            .arg(channel)
            .args(["-F", "json", "-f"])
            .arg(&out_path)
            .output()
            .map_err(|e| self.command_error(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.command_error(format!("{}: {}", output.status, stderr.trim())));
        }

        let json = fs::read_to_string(&out_path).map_err(|source| HistoryError::Read {
            path: out_path.display().to_string(),
            source,
        })?;
        parse_history(&json)
    }
}

/// Reads an export that was produced earlier.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistorySource for JsonFileSource {
    fn fetch_history(&self, _token: &str, _channel: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
        let json = fs::read_to_string(&self.path).map_err(|source| HistoryError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        parse_history(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn json_file_source_reads_export() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"[{"type":"message","text":"hi","ts":"10.5"}]"#)
            .unwrap();
        f.flush().unwrap();
        let records = JsonFileSource::new(f.path())
            .fetch_history("unused", "general")
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "hi");
    }

    #[test]
    fn json_file_source_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileSource::new(dir.path().join("nope.json"))
            .fetch_history("t", "c")
            .unwrap_err();
        assert!(matches!(err, HistoryError::Read { .. }));
    }

    #[test]
    fn missing_export_program_is_command_error() {
        let source = ExportCommandSource::new("sma-test-no-such-program-7f3a");
        let err = source.fetch_history("xoxp", "general").unwrap_err();
        match err {
            HistoryError::Command { program, .. } => {
                assert_eq!(program, "sma-test-no-such-program-7f3a")
            }
            other => panic!("expected Command error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn failing_export_program_reports_status() {
        let err = ExportCommandSource::new("false")
            .fetch_history("xoxp", "general")
            .unwrap_err();
        assert!(matches!(err, HistoryError::Command { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn export_program_that_writes_nothing_is_read_error() {
        let err = ExportCommandSource::new("true")
            .fetch_history("xoxp", "general")
            .unwrap_err();
        assert!(matches!(err, HistoryError::Read { .. }));
    }
}
