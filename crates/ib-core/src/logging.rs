//! Process-wide log configuration.
//!
//! The first call to [`init`] or [`set_log_level`] installs a `tracing`
//! subscriber writing to stderr behind a reloadable level filter. Later calls
//! only swap the filter, so the most recent level wins for every model in the
//! process. When the host application has already installed its own global
//! subscriber, that subscriber is left untouched and only the recorded level
//! changes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

/// Verbosity, as raw host integers `0..=4`. Higher is more verbose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
#[repr(u8)]
pub enum LogLevel {
    /// Suppress all output.
    #[default]
    None = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    /// Map a raw host value, clamping out-of-range values to the nearest level.
    pub fn from_raw(raw: i32) -> LogLevel {
        LogLevel::from(raw.clamp(0, 4) as u8)
    }

    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::None => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl From<u8> for LogLevel {
    fn from(raw: u8) -> Self {
        match raw {
            0 => LogLevel::None,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        level as u8
    }
}

/// System-level logging configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    pub level: LogLevel,
    /// Colorize output. Only honored by the call that installs the subscriber.
    pub ansi: bool,
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::None as u8);
static FILTER: OnceLock<Option<reload::Handle<LevelFilter, Registry>>> = OnceLock::new();
/// Serializes level changes so the recorded level matches the active filter.
static APPLY: Mutex<()> = Mutex::new(());

fn install(config: &LogConfig) -> Option<reload::Handle<LevelFilter, Registry>> {
    let (filter, handle) = reload::Layer::new(config.level.as_filter());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_target(false);

    match tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => Some(handle),
        Err(_) => None,
    }
}

/// Apply `config`.
///
/// The subscriber is installed by the first call asking for a level above
/// [`LogLevel::None`]; until then the level is only recorded, leaving the
/// global subscriber slot free for the host.
pub fn init(config: LogConfig) {
    let _guard = APPLY.lock().unwrap_or_else(PoisonError::into_inner);
    let handle = if config.level == LogLevel::None {
        FILTER.get()
    } else {
        Some(FILTER.get_or_init(|| install(&config)))
    };
    if let Some(Some(handle)) = handle {
        // Fails only once the subscriber is gone, at which point nothing logs.
        let _ = handle.reload(config.level.as_filter());
    }
    LEVEL.store(config.level as u8, Ordering::Release);
}

/// Set the process-wide level. The last caller wins.
pub fn set_log_level(level: LogLevel) {
    init(LogConfig {
        level,
        ..Default::default()
    });
}

/// The most recently requested level.
pub fn log_level() -> LogLevel {
    LogLevel::from(LEVEL.load(Ordering::Acquire))
}

/// Whether this crate's subscriber is the global one.
pub fn owns_subscriber() -> bool {
    matches!(FILTER.get(), Some(Some(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing in this test binary asks for a level above `None`.
    #[test]
    fn test_none_leaves_subscriber_slot_free() {
        set_log_level(LogLevel::None);
        assert_eq!(log_level(), LogLevel::None);
        assert!(!owns_subscriber());
    }

    #[test]
    fn test_from_raw_clamps() {
        assert_eq!(LogLevel::from_raw(-3), LogLevel::None);
        assert_eq!(LogLevel::from_raw(0), LogLevel::None);
        assert_eq!(LogLevel::from_raw(2), LogLevel::Warn);
        assert_eq!(LogLevel::from_raw(99), LogLevel::Debug);
    }

    #[test]
    fn test_filters() {
        assert_eq!(LogLevel::None.as_filter(), LevelFilter::OFF);
        assert_eq!(LogLevel::Debug.as_filter(), LevelFilter::DEBUG);
        assert!(LogLevel::Info > LogLevel::Warn);
    }

    #[test]
    fn test_serde_as_integer() {
        let level: LogLevel = serde_json::from_str("1").unwrap();
        assert_eq!(level, LogLevel::Error);
        assert_eq!(serde_json::to_string(&LogLevel::Info).unwrap(), "3");
    }
}
