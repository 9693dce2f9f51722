// src/logging.rs
//
// Level-tagged, timestamped logging to stderr and an optional log file,
// plus the `LogSink` seam the UDP transport logs through.
//
// Line format: `HH:MM:SS.mmm LEVEL [component] message`

use once_cell::sync::Lazy;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Name of the symlink that always points at the newest log file
#[cfg_attr(not(unix), allow(dead_code))]
const LATEST_LINK: &str = "udpcan-latest.log";

/// Open log file. `None` means stderr only.
static LOG_FILE: Mutex<Option<LineWriter<File>>> = Mutex::new(None);

fn timestamp() -> impl fmt::Display {
    chrono::Local::now().format("%H:%M:%S%.3f")
}

/// Write one log line. Use `tlog!` rather than calling this directly.
#[doc(hidden)]
pub fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    let line = format!("{} {:<5} {}", timestamp(), level, args);
    eprintln!("{}", line);
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(file) = guard.as_mut() {
            // Write errors are dropped; stderr already has the line
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Log at `Info`, or at an explicit level with a leading `@Level,`:
///
/// ```ignore
/// tlog!("[udpcan_cli] Echoing on {}", addr);
/// tlog!(@Warn, "[udp_can] Receive error: {}", e);
/// ```
#[macro_export]
macro_rules! tlog {
    (@$level:ident, $($arg:tt)+) => {
        $crate::logging::emit($crate::logging::LogLevel::$level, format_args!($($arg)+))
    };
    ($($arg:tt)+) => {
        $crate::logging::emit($crate::logging::LogLevel::Info, format_args!($($arg)+))
    };
}

/// Start copying log lines into `udpcan-<date>-<time>.log` under `log_dir`.
///
/// On Unix `udpcan-latest.log` is pointed at the new file. Calling this
/// again switches to a fresh file.
pub fn init_file_logging(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Cannot create log directory {}: {}", log_dir.display(), e))?;

    let filename = format!("udpcan-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"));
    let log_path = log_dir.join(&filename);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Cannot open log file {}: {}", log_path.display(), e))?;

    #[cfg(unix)]
    {
        let link = log_dir.join(LATEST_LINK);
        let _ = std::fs::remove_file(&link);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &link) {
            tlog!(@Warn, "[logging] Cannot link {}: {}", LATEST_LINK, e);
        }
    }

    // Lock released before logging below
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(LineWriter::new(file));
    }
    tlog!(
        "[logging] udpcan {} logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_path.display()
    );
    Ok(())
}

/// Flush and close the log file. Later lines go to stderr only.
pub fn stop_file_logging() {
    let closed = LOG_FILE
        .lock()
        .map(|mut guard| guard.take().is_some())
        .unwrap_or(false);
    if closed {
        tlog!("[logging] File logging stopped");
    }
}

// ============================================================================
// Log Sink
// ============================================================================

/// Severity attached to a transport log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        // pad() so `{:<5}` aligns the level column
        f.pad(s)
    }
}

/// Destination for log lines emitted by the transport session and its
/// receive pipeline. Shared across threads, so it must be `Send + Sync`.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn log(&self, level: LogLevel, message: &str) {
        self(level, message)
    }
}

/// Forwards to `tlog!` with a fixed component tag.
/// Lines below `min_level` are dropped.
pub struct TlogSink {
    tag: &'static str,
    min_level: LogLevel,
}

impl TlogSink {
    pub fn new(tag: &'static str, min_level: LogLevel) -> Self {
        Self { tag, min_level }
    }
}

impl LogSink for TlogSink {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }
        emit(level, format_args!("[{}] {}", self.tag, message));
    }
}

static DEFAULT_SINK: Lazy<Arc<dyn LogSink>> =
    Lazy::new(|| Arc::new(TlogSink::new("udp_can", LogLevel::Info)));

/// Process-wide sink used by sessions that were not given their own.
pub fn default_sink() -> Arc<dyn LogSink> {
    DEFAULT_SINK.clone()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink_receives_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let sink = move |level: LogLevel, msg: &str| {
            captured.lock().unwrap().push(format!("{} {}", level, msg));
        };

        sink.log(LogLevel::Warn, "socket hiccup");
        sink.log(LogLevel::Info, "connected");

        let lines = lines.lock().unwrap();
        assert_eq!(lines.as_slice(), ["WARN socket hiccup", "INFO connected"]);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_file_logging_tags_lines_with_level() {
        let dir = std::env::temp_dir().join(format!("udpcan-log-test-{}", std::process::id()));
        init_file_logging(&dir).expect("init logging");
        tlog!("[test] hello file");
        TlogSink::new("test", LogLevel::Debug).log(LogLevel::Warn, "socket hiccup");
        TlogSink::new("test", LogLevel::Error).log(LogLevel::Warn, "filtered out");
        stop_file_logging();

        let log_file = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| {
                let name = p.file_name().unwrap().to_string_lossy().into_owned();
                name.starts_with("udpcan-") && name != LATEST_LINK
            })
            .expect("no log file written");
        let content = std::fs::read_to_string(&log_file).unwrap();

        assert!(content.contains("INFO  [test] hello file"));
        assert!(content.contains("WARN  [test] socket hiccup"));
        assert!(!content.contains("filtered out"));
        #[cfg(unix)]
        assert!(dir.join(LATEST_LINK).exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
