//! Append-only activity log
//!
//! One line per event, `[2024-05-01 12:00:00.123] INFO - message`, appended to
//! `log_dir/processing.log`. This is an operator-facing artifact kept next to the
//! run logs; diagnostic logging goes through `tracing`.

use crate::config::Config;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Line severity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// Normal progress
    Info,
    /// Item failure
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => f.write_str("INFO"),
            Level::Error => f.write_str("ERROR"),
        }
    }
}

/// Writer for the activity log file
#[derive(Clone, Debug)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    /// Log to `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log to the configured location
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.activity_log_path())
    }

    /// Location of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an INFO line
    pub async fn info(&self, message: impl AsRef<str>) {
        self.write(Level::Info, message.as_ref()).await;
    }

    /// Append an ERROR line
    pub async fn error(&self, message: impl AsRef<str>) {
        self.write(Level::Error, message.as_ref()).await;
    }

    /// Append a line; failures are reported through tracing and otherwise ignored
    pub async fn write(&self, level: Level, message: &str) {
        let line = format_line(Local::now(), level, message);
        if let Err(e) = self.append(&line).await {
            tracing::warn!(path = ?self.path, error = %e, "failed to write activity log");
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Render one log line, newline included
pub fn format_line(at: DateTime<Local>, level: Level, message: &str) -> String {
    format!(
        "[{}] {} - {}\n",
        at.format(LINE_TIMESTAMP_FORMAT),
        level,
        message
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn line_format_has_millisecond_timestamp_and_level() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 7).unwrap();
        assert_eq!(
            format_line(at, Level::Info, "processing clip.mp4"),
            "[2024-05-01 12:00:07.000] INFO - processing clip.mp4\n"
        );
        assert_eq!(
            format_line(at, Level::Error, "boom"),
            "[2024-05-01 12:00:07.000] ERROR - boom\n"
        );
    }

    #[tokio::test]
    async fn lines_are_appended_in_order() {
        let dir = TempDir::new().unwrap();
        let log = ActivityLog::new(dir.path().join("logs").join("processing.log"));

        log.info("first").await;
        log.error("second").await;

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] INFO - first"));
        assert!(lines[1].ends_with("] ERROR - second"));
    }

    #[tokio::test]
    async fn unwritable_log_does_not_panic() {
        let dir = TempDir::new().unwrap();
        // The log path is an existing directory, so opening it for append fails
        let log = ActivityLog::new(dir.path());
        log.info("ignored").await;
    }
}
