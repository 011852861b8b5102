//! Rate monitoring and alerting (spec.md §4.I "Rate monitoring").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::RateMonitorConfig;
use crate::error::ErrorKind;

/// An alert raised when an error kind crosses its configured threshold
/// within its window (spec.md §4.I supplement).
#[derive(Debug, Clone)]
pub struct RateAlert {
    /// The error kind that crossed its threshold.
    pub kind: ErrorKind,
    /// The count observed within the current window.
    pub count: u64,
    /// The configured window.
    pub window: Duration,
}

struct WindowState {
    threshold: u64,
    window: Duration,
    window_start: std::time::Instant,
    count: u64,
}

/// Per-kind sliding-window error-rate tracker, guarded by a single mutex
/// (spec.md §5 concurrency notes).
pub struct RateMonitor {
    state: Mutex<HashMap<ErrorKind, WindowState>>,
}

const DEFAULT_WINDOW_SECS: u64 = 300;

impl RateMonitor {
    /// Build a monitor from configuration, falling back to spec.md §4.I's
    /// default thresholds (parse=10, validation=50, processing=5,
    /// transport=20) over a five-minute window for any kind the
    /// configuration does not mention.
    #[must_use]
    pub fn new(config: &RateMonitorConfig) -> Self {
        let now = std::time::Instant::now();
        let mut state = HashMap::new();
        for kind in ErrorKind::ALL {
            let (threshold, window) = config
                .thresholds
                .get(kind.as_str())
                .map_or((default_threshold(kind), Duration::from_secs(DEFAULT_WINDOW_SECS)), |configured| {
                    (configured.count, configured.window())
                });
            state.insert(kind, WindowState { threshold, window, window_start: now, count: 0 });
        }
        Self { state: Mutex::new(state) }
    }

    /// Record one occurrence of `kind`, resetting the window if it has
    /// elapsed, and return a [`RateAlert`] if this occurrence crossed the
    /// threshold.
    pub fn record_error(&self, kind: ErrorKind) -> Option<RateAlert> {
        let mut guard = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = guard.get_mut(&kind)?;
        let now = std::time::Instant::now();
        if now.duration_since(entry.window_start) > entry.window {
            entry.window_start = now;
            entry.count = 0;
        }
        entry.count += 1;
        if entry.count == entry.threshold {
            Some(RateAlert { kind, count: entry.count, window: entry.window })
        } else {
            None
        }
    }
}

fn default_threshold(kind: ErrorKind) -> u64 {
    match kind {
        ErrorKind::Parse => 10,
        ErrorKind::Validation => 50,
        ErrorKind::Processing => 5,
        ErrorKind::Transport => 20,
        ErrorKind::Authentication | ErrorKind::SessionTimer => 50,
    }
}

impl ErrorKind {
    /// Stable string key used to look up per-kind rate-monitor
    /// configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Validation => "validation",
            Self::Processing => "processing",
            Self::Transport => "transport",
            Self::Authentication => "authentication",
            Self::SessionTimer => "session_timer",
        }
    }
}
