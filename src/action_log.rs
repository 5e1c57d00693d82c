//! Append-only record of user-visible actions.
//!
//! Recording is fire-and-forget: a sink that fails only emits a warning and
//! never changes the outcome of the action being recorded.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;

use crate::util::local_date_time::FORMAT;

pub trait ActionLog: Send + Sync {
    fn record(&self, action: &str, details: &str);
}

/// Emits every action as a `tracing` event on the `action` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActionLog;

impl ActionLog for TracingActionLog {
    fn record(&self, action: &str, details: &str) {
        tracing::info!(target: "action", action, "{}", details);
    }
}

/// Appends `[YYYY-MM-DD HH:MM:SS] action: details` lines to a file.
#[derive(Debug)]
pub struct FileActionLog {
    path: PathBuf,
    write: Mutex<()>,
}

impl FileActionLog {
    pub fn new(path: impl Into<PathBuf>) -> FileActionLog {
        FileActionLog {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl ActionLog for FileActionLog {
    fn record(&self, action: &str, details: &str) {
        let line = format!("[{}] {}: {}", Local::now().format(FORMAT), action, details);
        if let Err(err) = self.append(&line) {
            tracing::warn!(
                "Unable to write action log '{}': {}",
                self.path.display(),
                err
            );
        }
    }
}

/// Keeps actions in memory.
#[derive(Debug, Default)]
pub struct MemoryActionLog {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemoryActionLog {
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ActionLog for MemoryActionLog {
    fn record(&self, action: &str, details: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((action.to_string(), details.to_string()));
    }
}

/// Shared handle to the configured sink.
#[derive(Clone)]
pub struct ActionLogger(Arc<dyn ActionLog>);

impl ActionLogger {
    pub fn new(log: Arc<dyn ActionLog>) -> ActionLogger {
        ActionLogger(log)
    }

    pub fn record(&self, action: &str, details: impl AsRef<str>) {
        self.0.record(action, details.as_ref());
    }
}

impl Default for ActionLogger {
    fn default() -> Self {
        ActionLogger(Arc::new(TracingActionLog))
    }
}

impl std::fmt::Debug for ActionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActionLogger")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("actions.log");
        let log = FileActionLog::new(&path);

        log.record("Login", "User alice logged in");
        log.record("Logout", "User alice logged out");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Login: User alice logged in"));
        assert!(lines[1].ends_with("] Logout: User alice logged out"));
    }

    #[test]
    fn failing_sink_doesnt_panic() {
        let dir = tempfile::tempdir().unwrap();
        // A directory can't be opened for appending.
        let log = FileActionLog::new(dir.path());
        log.record("Login", "User alice logged in");
    }

    #[test]
    fn logger_forwards_to_sink() {
        let sink = Arc::new(MemoryActionLog::default());
        let logger = ActionLogger::new(sink.clone());
        logger.record("Course Added", format!("Admin {} added course: {}", "root", "Algebra"));

        assert_eq!(
            sink.entries(),
            vec![(
                "Course Added".to_string(),
                "Admin root added course: Algebra".to_string()
            )]
        );
    }
}
