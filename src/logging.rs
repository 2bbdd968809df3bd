// src/logging.rs
//
// Timestamped logging for the gateway core.
// Every line goes to stderr, and to a log file once file logging is enabled.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
/// Also writes to the log file when file logging is enabled.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Name of the symlink that always points at the newest log file (Unix only).
const LATEST_LOG_LINK: &str = "motegate.log";

/// Initialise file logging to the given directory.
/// Creates a timestamped log file and a `motegate.log` symlink (Unix only).
/// Returns the path of the new log file.
pub fn init_file_logging(log_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(log_dir)?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-motegate.log")
        .to_string();
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Windows symlinks require elevated privileges
    #[cfg(unix)]
    {
        let symlink_path = log_dir.join(LATEST_LOG_LINK);
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!(
                "{} [logging] Failed to create {} symlink: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                LATEST_LOG_LINK,
                e
            );
        }
    }

    let mut guard = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(file);
    drop(guard);

    // tlog! would contend on LOG_FILE while we hold it, so log after release
    tlog!("[logging] File logging started: {}", log_path.display());

    Ok(log_path)
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    let mut guard = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
    if guard.take().is_some() {
        eprintln!(
            "{} [logging] File logging stopped",
            chrono::Local::now().format("%H:%M:%S%.3f")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_writes_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = init_file_logging(dir.path()).expect("init logging");

        tlog!("[test] hello {}", 42);
        stop_file_logging();

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert!(contents.contains("[logging] File logging started"));
        assert!(contents.contains("[test] hello 42"));

        #[cfg(unix)]
        assert!(dir.path().join(LATEST_LOG_LINK).exists());

        // Second stop is a no-op
        stop_file_logging();
    }
}
