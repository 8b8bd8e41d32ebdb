//! Progress and error reporting for a run
//!
//! Progress is emitted as structured tracing events. Errors are additionally
//! appended to an optional error log file that stays open for the lifetime
//! of the [`Reporter`].

use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Append-only file receiving one line per reported error
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    file: File,
}

impl ErrorLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open error log: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, message: &str) {
        let line = format!(
            "{} {}\n",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            message
        );
        if let Err(e) = self.file.write_all(line.as_bytes()) {
            warn!("Failed to write error log {}: {}", self.path.display(), e);
        }
    }
}

/// Run-scoped progress counter and error sink
#[derive(Debug, Default)]
pub struct Reporter {
    phase: &'static str,
    total: usize,
    current: usize,
    errors: usize,
    error_log: Option<ErrorLog>,
}

impl Reporter {
    pub fn new(error_log: Option<ErrorLog>) -> Self {
        Self {
            error_log,
            ..Self::default()
        }
    }

    /// Start a new counted phase of `total` steps
    pub fn begin(&mut self, phase: &'static str, total: usize) {
        self.phase = phase;
        self.total = total;
        self.current = 0;
        info!(phase, total, "Starting");
    }

    /// Advance the counter by one step
    pub fn step(&mut self) {
        self.current = (self.current + 1).min(self.total.max(1));
    }

    pub fn info(&self, message: impl Display) {
        info!(
            phase = self.phase,
            "[{}/{}] {}", self.current, self.total, message
        );
    }

    /// Report a recoverable error; the run continues
    pub fn error(&mut self, message: impl Display) {
        let message = message.to_string();
        self.errors += 1;
        error!(
            phase = self.phase,
            "[{}/{}] {}", self.current, self.total, message
        );
        if let Some(log) = self.error_log.as_mut() {
            log.append(&message);
        }
    }

    /// Number of errors reported so far
    pub fn errors(&self) -> usize {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counter_progression() {
        let mut reporter = Reporter::new(None);
        reporter.begin("sync", 2);
        reporter.step();
        reporter.step();
        reporter.step();
        assert_eq!(reporter.current, 2);

        reporter.begin("orphans", 0);
        assert_eq!(reporter.current, 0);
    }

    #[test]
    fn test_errors_are_appended_to_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("errors.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        {
            let log = ErrorLog::open(&path).unwrap();
            let mut reporter = Reporter::new(Some(log));
            reporter.begin("sync", 1);
            reporter.step();
            reporter.info("Cloning a/b");
            reporter.error("Failed to clone a/b - boom");
            reporter.error("Failed to pull c/d - diverged");
            assert_eq!(reporter.errors(), 2);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier run");
        assert!(lines[1].ends_with("Failed to clone a/b - boom"));
        assert!(lines[2].ends_with("Failed to pull c/d - diverged"));
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let result = ErrorLog::open(Path::new("/nonexistent/dir/errors.log"));
        assert!(result.is_err());
    }
}
