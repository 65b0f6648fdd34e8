//! Process-wide log setup for unit tree tooling.
//!
//! # Responsibility
//! - Route `log` records into size-rotated `unittree*.log` files.
//! - Turn panics into a single `panic_captured` line before the default hook runs.
//!
//! # Invariants
//! - The logger starts at most once; later calls must repeat the same settings.
//! - Nothing in here panics on bad input.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const FILE_BASENAME: &str = "unittree";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED: usize = 4;
const PANIC_TEXT_LIMIT: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    level: LevelFilter,
    dir: PathBuf,
}

impl LogSettings {
    fn parse(level: &str, log_dir: &str) -> Result<Self, String> {
        let level = match level.trim() {
            "" => return Err("log level is blank".to_string()),
            raw if raw.eq_ignore_ascii_case("warning") => LevelFilter::Warn,
            raw => raw
                .parse::<LevelFilter>()
                .ok()
                .filter(|level| *level != LevelFilter::Off)
                .ok_or_else(|| format!("unknown log level `{raw}`"))?,
        };

        let dir = PathBuf::from(log_dir.trim());
        if dir.as_os_str().is_empty() {
            return Err("log directory is blank".to_string());
        }
        if dir.is_relative() {
            return Err(format!("log directory `{}` is not absolute", dir.display()));
        }
        Ok(Self { level, dir })
    }

    fn level_name(&self) -> &'static str {
        match self.level {
            LevelFilter::Trace => "trace",
            LevelFilter::Debug => "debug",
            LevelFilter::Info => "info",
            LevelFilter::Warn => "warn",
            LevelFilter::Error | LevelFilter::Off => "error",
        }
    }
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts file logging at `level` under the absolute directory `log_dir`.
///
/// Calling it again with equivalent settings is a no-op; different
/// settings are refused because the first logger stays in place.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let wanted = LogSettings::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(wanted.clone()))?;
    if active.settings == wanted {
        return Ok(());
    }
    Err(format!(
        "logger already running with level={} dir={}; cannot restart with level={} dir={}",
        active.settings.level_name(),
        active.settings.dir.display(),
        wanted.level_name(),
        wanted.dir.display()
    ))
}

/// Level and directory of the running logger, if any.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.settings.level_name(), active.settings.dir.clone()))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(settings: LogSettings) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&settings.dir)
        .map_err(|err| format!("cannot create log directory {}: {err}", settings.dir.display()))?;

    let handle = Logger::try_with_str(settings.level_name())
        .map_err(|err| format!("invalid log level filter: {err}"))?
        .log_to_file(file_spec(&settings.dir))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("cannot start logger: {err}"))?;

    hook_panics();
    info!(
        "event=logging_start module=logging status=ok level={} dir={} version={}",
        settings.level_name(),
        settings.dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        settings,
        _handle: handle,
    })
}

fn file_spec(dir: &Path) -> FileSpec {
    FileSpec::default()
        .directory(dir)
        .basename(FILE_BASENAME)
}

// Only reached from `start`, which the OnceCell runs once.
fn hook_panics() {
    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|text| (*text).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<opaque payload>".to_string());
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |loc| format!("{}:{}", loc.file(), loc.line()),
        );
        error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            one_line(&payload, PANIC_TEXT_LIMIT)
        );
        chained(info);
    }));
}

fn one_line(text: &str, limit: usize) -> String {
    let mut flat: String = text
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .take(limit)
        .collect();
    if text.chars().nth(limit).is_some() {
        flat.push('…');
    }
    flat
}
