//! Run log for PixelAI.
//!
//! One file per run, truncated on `init`, under the platform data directory
//! (`PixelAI/pixelai.log` below `%APPDATA%`, `~/Library/Application Support`
//! or `$XDG_DATA_HOME` / `~/.local/share`).
//!
//! The `log_info!`, `log_warn!` and `log_err!` macros format like `format!`.
//! Until `init` succeeds they do nothing, so library callers and tests never
//! touch the disk.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static SINK: OnceLock<Mutex<File>> = OnceLock::new();

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Append one raw line. Lock or I/O failures are swallowed.
pub fn write_line(line: &str) {
    let Some(sink) = SINK.get() else { return };
    if let Ok(mut file) = sink.lock() {
        let _ = writeln!(file, "{}", line);
    }
}

/// Append `[HH:MM:SS] [LEVEL] msg`.
pub fn write(level: &str, msg: &str) {
    if SINK.get().is_some() {
        write_line(&format_line(&clock(unix_secs()), level, msg));
    }
}

/// Open the run log at its default location.
pub fn init() {
    init_at(&default_log_file());
}

/// Open (truncate) the run log at `path` and mirror panics into it.
/// Later calls are ignored once a log is open.
pub fn init_at(path: &Path) {
    if SINK.get().is_some() {
        return;
    }
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let opened = OpenOptions::new().create(true).write(true).truncate(true).open(path);
    let file = match opened {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    if SINK.set(Mutex::new(file)).is_err() {
        return;
    }

    write_line(&format!("=== PixelAI run, unix time {} ===", unix_secs()));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format_line(&clock(unix_secs()), "PANIC", &info.to_string()));
        default_hook(info);
    }));
}

fn format_line(ts: &str, level: &str, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level, msg)
}

fn default_log_file() -> PathBuf {
    data_root().join("PixelAI").join("pixelai.log")
}

/// First available per-user data directory, else the working directory.
fn data_root() -> PathBuf {
    let env = |key: &str| std::env::var_os(key).map(PathBuf::from);
    let candidates: [Option<PathBuf>; 3] = if cfg!(target_os = "windows") {
        [env("APPDATA"), None, None]
    } else if cfg!(target_os = "macos") {
        [env("HOME").map(|h| h.join("Library").join("Application Support")), None, None]
    } else {
        [
            env("XDG_DATA_HOME"),
            env("HOME").map(|h| h.join(".local").join("share")),
            None,
        ]
    };
    candidates.into_iter().flatten().next().unwrap_or_else(|| PathBuf::from("."))
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// UTC wall clock within the day.
fn clock(secs: u64) -> String {
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, day % 3600 / 60, day % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format() {
        assert_eq!(clock(3 * 3600 + 4 * 60 + 5), "03:04:05");
        assert_eq!(clock(86_400 + 59), "00:00:59");
        assert_eq!(format_line("01:02:03", "WARN", "x"), "[01:02:03] [WARN] x");
    }

    #[test]
    fn logging_without_init_is_harmless() {
        crate::log_info!("nothing to see {}", 1);
        crate::log_err!("still nothing");
    }

    #[test]
    fn log_file_lives_under_the_app_folder() {
        let path = default_log_file();
        assert!(path.ends_with(Path::new("PixelAI").join("pixelai.log")));
    }
}
