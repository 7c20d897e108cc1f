//! `RunContext` — the explicit context threaded through the pipeline in
//! place of module-level globals: configuration, cancellation, and a
//! progress sink all travel with the call instead of living in statics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;

/// A progress event emitted by the crawler/chunk builder/query engine.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub current: u64,
    /// Best estimate of the total; `0` means unknown (render a spinner).
    pub total: u64,
    pub message: String,
}

/// Cooperative cancellation flag, checked at coarse checkpoints: after each
/// crawled file, after each chunk flush, between query terms.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Context threaded through crawl/build/query so no module reaches for
/// global mutable state.
#[derive(Clone)]
pub struct RunContext {
    pub config: Config,
    pub cancel: CancelToken,
    pub progress: ProgressSink,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            progress: Arc::new(|_event| {}),
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    pub fn report(&self, current: u64, total: u64, message: impl Into<String>) {
        (self.progress)(ProgressEvent {
            current,
            total,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn cancel_token_is_observable_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn progress_sink_receives_events() {
        let seen: Arc<Mutex<Vec<(u64, u64, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let ctx = RunContext::new(Config::default()).with_progress(Arc::new(move |ev| {
            seen_clone.lock().unwrap().push((ev.current, ev.total, ev.message));
        }));
        ctx.report(1, 10, "scanning");
        let log = seen.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], (1, 10, "scanning".to_string()));
    }
}
