//! Optional wire log.
//!
//! When a log directory is configured, every streamed exchange gets an
//! append-only file holding the request body and each raw line received,
//! stamped with UTC time. Without a directory the handle is empty and
//! writes are no-ops.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// Current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let ts = utc_timestamp();
            let _ = writeln!(file, "[{}] {}: {}", ts, direction, data);
            let _ = file.flush();
        }
    }
}

/// Open (or create) `{log_dir}/{log_id}.log` and return a shared handle.
///
/// Characters that are unsafe in file names are replaced in `log_id`.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        let path = dir.join(format!("{}.log", sanitize(log_id)));
        std::fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    Arc::new(Mutex::new(file))
}

fn sanitize(log_id: &str) -> String {
    log_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
