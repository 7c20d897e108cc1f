//! Logging setup: a `tracing` subscriber whose only job is level filtering
//! and format selection. Every event is always emitted by the call site;
//! the *sink* decides what survives, rather than call sites suppressing
//! events themselves based on configured level.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn level_str(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Install the global tracing subscriber. Safe to call once per process;
/// subsequent calls are no-ops (via `try_init`'s idempotent failure path).
///
/// `-v`/`-q` take priority over `[logging] level` when given explicitly;
/// `Verbosity::Normal` means "no flag was passed", so the configured level
/// (or "info") applies in that case.
pub fn init(verbosity: Verbosity, json: bool, configured_level: Option<&str>) {
    let base = if verbosity != Verbosity::Normal {
        verbosity.level_str()
    } else {
        configured_level.unwrap_or("info")
    };
    let filter = EnvFilter::try_new(base).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    let _ = result;
}
