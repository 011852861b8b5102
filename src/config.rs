//! Configuration surface (spec.md §6, SPEC_FULL.md "Ambient stack /
//! Configuration").
//!
//! The core performs no I/O of its own: a host process loads these types
//! from TOML/YAML/env however it likes (the teacher layers `figment` over
//! `ortho_config`/`cli-defs` for its own `AppConfig`; this crate only
//! needs the typed shape, so it stops at `serde::Deserialize`).

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// RFC 4028 session-timer validator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTimerConfig {
    /// Whether the session-timer validator runs at all.
    pub enabled: bool,
    /// Lower bound (seconds) for `Session-Expires`.
    pub min_se: u32,
    /// Upper bound (seconds) for `Session-Expires`; `0` means unbounded.
    pub max_se: u32,
    /// Whether this server mandates the extension (reported by the
    /// injected `SessionTimerManager`, not consulted directly here).
    pub require_support: bool,
}

impl Default for SessionTimerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_se: 90,
            max_se: 7200,
            require_support: false,
        }
    }
}

/// Digest authentication validator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Whether the authentication validator runs at all.
    pub enabled: bool,
    /// Whether unauthenticated requests are rejected (vs. passed through).
    pub require_auth: bool,
    /// Realm advertised in `WWW-Authenticate`.
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_auth: true,
            realm: "sip-server".to_owned(),
        }
    }
}

/// Per-kind rate-monitor threshold (spec.md §4.I).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateThreshold {
    /// Faults allowed within `window` before an alert fires.
    pub count: u64,
    /// Rolling window duration, in seconds (serde-friendly form of
    /// [`Duration`]).
    pub window_secs: u64,
}

impl RateThreshold {
    /// This threshold's window as a [`Duration`].
    #[must_use]
    pub const fn window(self) -> Duration { Duration::from_secs(self.window_secs) }
}

/// Rate-monitor configuration: one threshold per [`crate::error::ErrorKind`]
/// name, defaulting to spec.md §4.I's table when a kind is absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RateMonitorConfig {
    /// Overrides keyed by kind name (`"parse"`, `"validation"`, etc.).
    pub thresholds: HashMap<String, RateThreshold>,
}

/// Top-level configuration for the request-processing core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Session-timer validator configuration.
    pub session_timer: SessionTimerConfig,
    /// Authentication validator configuration.
    pub auth: AuthConfig,
    /// Enables verbose debug fields in error log records (sanitized header
    /// snapshot and message preview).
    pub debug_mode: bool,
    /// Rate-monitor thresholds.
    pub rate_monitor: RateMonitorConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            session_timer: SessionTimerConfig::default(),
            auth: AuthConfig::default(),
            debug_mode: false,
            rate_monitor: RateMonitorConfig::default(),
        }
    }
}
