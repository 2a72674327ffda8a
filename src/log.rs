//! File logging for the swarm engine.
//!
//! Log levels:
//! - ERROR: an operation could not complete
//! - WARN: a best-effort step failed and was swallowed, or the store holds
//!   something odd (unknown dependencies, cycles)
//! - INFO: lifecycle milestones (branch created, merged, landed, cleaned)
//! - DEBUG: locks, retries, config resolution
//! - TRACE: every git invocation
//!
//! Nothing is written until [`init`] or [`init_to`] is called. Debug mode can
//! be enabled with `--debug` or `SWARM_DEBUG=1`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

fn env_debug() -> bool {
    std::env::var("SWARM_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Log to `~/.swarm/swarm.log`, truncating it.
pub fn init(debug: bool) {
    if let Some(dir) = dirs::home_dir().map(|h| h.join(".swarm")) {
        if std::fs::create_dir_all(&dir).is_ok() {
            init_to(&dir.join("swarm.log"), debug);
            return;
        }
    }
    set_level(level_for(debug));
}

/// Log to `path`, truncating it. Only the first call picks the file.
pub fn init_to(path: &Path, debug: bool) {
    set_level(level_for(debug));
    let _ = std::fs::write(path, "");
    let _ = LOG_PATH.set(path.to_path_buf());
}

fn level_for(debug: bool) -> LogLevel {
    if debug || env_debug() {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

pub fn set_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: LogLevel) -> bool {
    level <= self::level() && LOG_PATH.get().is_some()
}

fn format_line(level: LogLevel, timestamp: &str, msg: &str) -> String {
    format!("[{}] [{}] {}", timestamp, level.as_str(), msg)
}

pub fn log_at(level: LogLevel, msg: &str) {
    if level > self::level() {
        return;
    }
    let Some(path) = LOG_PATH.get() else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        let _ = writeln!(file, "{}", format_line(level, &timestamp, msg));
    }
}

#[macro_export]
macro_rules! swlog {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! swlog_error {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Error, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! swlog_warn {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! swlog_debug {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Debug, &format!($($arg)*))
    };
}

/// Skips formatting entirely unless tracing is on; git calls are frequent.
#[macro_export]
macro_rules! swlog_trace {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::LogLevel::Trace) {
            $crate::log::log_at($crate::log::LogLevel::Trace, &format!($($arg)*))
        }
    };
}
