//! Per-session log file for the editor and the CLI.
//!
//! `init()` truncates `<data dir>/StickerStudio/stickerstudio.log`, so the
//! file only ever describes the latest run:
//!
//!   Windows:  `%APPDATA%\StickerStudio\stickerstudio.log`
//!   Linux:    `~/.local/share/StickerStudio/stickerstudio.log`
//!   macOS:    `~/Library/Application Support/StickerStudio/stickerstudio.log`
//!
//! Log through `log_info!`, `log_warn!` and `log_err!`.  Nothing is written
//! until a sink is opened, so library users and unit tests stay silent.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

struct Sink {
    file: Mutex<File>,
    path: PathBuf,
}

static SINK: OnceLock<Sink> = OnceLock::new();

/// Where this session is logging, once a sink is open.
pub fn log_path() -> Option<&'static Path> {
    SINK.get().map(|s| s.path.as_path())
}

pub fn is_enabled() -> bool {
    SINK.get().is_some()
}

/// `[HH:MM:SS] [LEVEL] message`
pub fn format_line(clock: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", clock, level.tag(), msg)
}

fn append(line: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.file.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Backend of the logging macros.  I/O failures are dropped.
pub fn write(level: Level, msg: &str) {
    if is_enabled() {
        append(&format_line(&clock(), level, msg));
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the session log in the platform data directory and hook panics.
pub fn init() {
    let path = data_dir().join("StickerStudio").join("stickerstudio.log");
    if let Err(e) = init_at(&path) {
        eprintln!("[logger] cannot open {}: {}", path.display(), e);
    }
}

/// Open (truncating) `path` as the session log.  Only the first successful
/// call takes effect.
pub fn init_at(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    if SINK.set(Sink { file: Mutex::new(file), path: path.to_path_buf() }).is_err() {
        return Ok(());
    }

    append(&format!(
        "=== StickerStudio {} session, unix time {} ===",
        env!("CARGO_PKG_VERSION"),
        unix_seconds()
    ));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        append(&format_line(&clock(), Level::Error, &format!("panic: {}", info)));
        previous(info);
    }));
    Ok(())
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// UTC wall clock, `HH:MM:SS`.
fn clock() -> String {
    let secs = unix_seconds();
    format!("{:02}:{:02}:{:02}", (secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60)
}
