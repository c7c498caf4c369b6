//! log4rs setup: `app.log` for the root logger, `audit.log` for dataset lifecycle events.
//!
//! The library never initializes logging on its own; without a backend the `log` macros
//! are no-ops.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LoggingSettings;

/// Target for dataset create/complete/fail/delete/restore/purge events.
pub const AUDIT_TARGET: &str = "crockdata::audit";

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

pub type LogResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns the log4rs error when the file is missing, invalid or a logger is already set.
pub fn init_path(path: &Path) -> LogResult<()> {
    log4rs::init_file(path, log4rs::config::Deserializers::default()).map_err(|e| e.to_string().into())
}

pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, name: &str, keep: u32) -> LogResult<RollingFileAppender> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{name}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{name}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Builds the two-file configuration without installing it.
///
/// # Errors
/// Directory creation or appender construction failures.
pub fn build_config(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> LogResult<Config> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, LevelFilter::Info))
        .build(Root::builder().appender("app").build(lvl))?;
    Ok(config)
}

/// Installs rolling `app.log` and `audit.log` under `dir` (default: current directory).
///
/// # Errors
/// Appender construction failures, or a logger already installed in this process.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> LogResult<()> {
    let config = build_config(dir, level, retention)?;
    log4rs::init_config(config)?;
    Ok(())
}

pub fn configure_from_settings(settings: &LoggingSettings) -> LogResult<()> {
    configure_logging(settings.dir.as_deref(), settings.level.as_deref(), settings.retention)
}

/// Reads `CROCKDATA_LOG_DIR`, `CROCKDATA_LOG_LEVEL` and `CROCKDATA_LOG_RETENTION`.
///
/// # Errors
/// Same as [`configure_logging`].
pub fn configure_from_env() -> LogResult<()> {
    let dir = std::env::var("CROCKDATA_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("CROCKDATA_LOG_LEVEL").ok();
    let retention = std::env::var("CROCKDATA_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}
