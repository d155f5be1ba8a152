use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};

use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: Option<File>,
    tui_tx: Option<mpsc::Sender<LogRecord>>,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for TUI rendering (mapped in ui.rs)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// One log line as delivered to the controller's log panel.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub prefix: String,
    pub color: u8,
    pub timestamp: String,
    pub message: String,
}

/// Initialize the global logger. Clears the log file. If the file cannot be
/// opened, records still reach the TUI.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join("app.log");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .map_err(|e| eprintln!("nguctl: cannot open {}: {}", log_path.display(), e))
        .ok();

    LOGGER
        .set(Mutex::new(Logger { file, tui_tx: None, prefixes: HashMap::new() }))
        .ok();
}

fn with_logger<R>(f: impl FnOnce(&mut Logger) -> R) -> Option<R> {
    let logger = LOGGER.get()?;
    let mut l = logger.lock().unwrap_or_else(|e| e.into_inner());
    Some(f(&mut l))
}

/// Wire the TUI log channel.
pub fn set_tui_sender(tx: mpsc::Sender<LogRecord>) {
    with_logger(|l| l.tui_tx = Some(tx));
}

/// Register a prefix with a color used by the `*_p` functions.
pub fn register_prefix(prefix: &str, color: u8) {
    with_logger(|l| {
        l.prefixes.insert(prefix.to_string(), color);
    });
}

fn write_log(level: Level, prefix: &str, msg: &str) {
    let ts = Local::now().format("%H:%M:%S").to_string();

    with_logger(|l| {
        // File always gets plain text
        if let Some(file) = l.file.as_mut() {
            if prefix.is_empty() {
                writeln!(file, "[{}] [{}] {}", ts, level.as_str(), msg).ok();
            } else {
                writeln!(file, "[{}] [{}] [{}] {}", ts, level.as_str(), prefix, msg).ok();
            }
        }
        if let Some(tx) = &l.tui_tx {
            let color = l.prefixes.get(prefix).copied().unwrap_or(0);
            tx.send(LogRecord {
                level,
                prefix: prefix.to_string(),
                color,
                timestamp: ts,
                message: msg.to_string(),
            })
            .ok();
        }
    });
}

pub fn info(msg: &str) {
    write_log(Level::Info, "", msg);
}

pub fn warn(msg: &str) {
    write_log(Level::Warn, "", msg);
}

pub fn error(msg: &str) {
    write_log(Level::Error, "", msg);
}

pub fn info_p(prefix: &str, msg: &str) {
    write_log(Level::Info, prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log(Level::Warn, prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log(Level::Error, prefix, msg);
}
