//! Error-Logging & Statistics substrate (spec.md §4.I, §5).
//!
//! Ties together pattern extraction, sanitization, rate monitoring, and
//! bounded statistics into [`ErrorLoggingManager`], the single collaborator
//! every other component reports faults to. Mirrors the teacher's
//! `session::manager::SessionManager`: one type owning several `RwLock`-
//! guarded collections, read via deep-copy snapshots rather than handing
//! out guards.

pub mod pattern;
pub mod rate;
pub mod sampler;
pub mod sanitize;
pub mod stats;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::config::ProxyConfig;
use crate::error::ErrorKind;
use crate::message::{Method, SipMessage};
use pattern::ErrorPattern;
use rate::{RateAlert, RateMonitor};
use sampler::StatisticsSampler;
use stats::{DetailedErrorStatistics, ErrorStatistics, RecentErrorEntry, TopMessageEntry};

/// A pattern count past which a single recurring fault is treated as a
/// systematic issue worth a warning (spec.md §4.I).
const SYSTEMATIC_PATTERN_THRESHOLD: u64 = 10;
/// An hourly total past which the same applies.
const SYSTEMATIC_HOUR_THRESHOLD: u64 = 100;

/// An owned, point-in-time copy of the detailed statistics for one kind,
/// returned by [`ErrorLoggingManager::snapshot`] (SPEC_FULL.md supplement).
#[derive(Debug, Clone)]
pub struct DetailedErrorStatisticsSnapshot {
    /// Total count per kind, indexed the same way as [`ErrorKind::index`].
    pub counts: [u64; 6],
    /// Sub-category histograms, by kind, as (name, count) pairs.
    pub sub_categories: HashMap<ErrorKind, Vec<(String, u64)>>,
    /// Top-messages lists, by kind.
    pub top_messages: HashMap<ErrorKind, Vec<TopMessageEntry>>,
    /// The bounded recent-errors ring.
    pub recent_errors: Vec<RecentErrorEntry>,
    /// Distinct pattern count, by kind.
    pub pattern_counts: HashMap<ErrorKind, usize>,
}

/// Owns every counter, histogram, pattern table, and rate window the
/// logging surface reports through (spec.md §4.I, §5).
///
/// Mutation of the statistics and pattern tables is independent per
/// `RwLock`: no cross-counter ordering is guaranteed (spec.md §5), and
/// every logging method is best-effort — a poisoned lock degrades to a
/// recovered guard rather than propagating a panic into the request path.
pub struct ErrorLoggingManager {
    config: ProxyConfig,
    stats: RwLock<ErrorStatistics>,
    detailed: RwLock<DetailedErrorStatistics>,
    patterns: RwLock<HashMap<ErrorKind, HashMap<String, ErrorPattern>>>,
    rate_monitor: RateMonitor,
    sampler: RwLock<StatisticsSampler>,
}

impl ErrorLoggingManager {
    /// Build the manager from the active configuration.
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        let rate_monitor = RateMonitor::new(&config.rate_monitor);
        Self {
            config,
            stats: RwLock::new(ErrorStatistics::new(Utc::now())),
            detailed: RwLock::new(DetailedErrorStatistics::new()),
            patterns: RwLock::new(HashMap::new()),
            rate_monitor,
            sampler: RwLock::new(StatisticsSampler::new()),
        }
    }

    /// Record a parse-layer fault (spec.md §4.B/§4.I).
    pub fn log_parse_error(
        &self,
        sub_category: &str,
        message: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        self.log_error(ErrorKind::Parse, sub_category, message, status_code, validator_name, request);
    }

    /// Record a validation-chain rejection (spec.md §4.C/§4.I).
    pub fn log_validation_error(
        &self,
        sub_category: &str,
        message: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        self.log_error(ErrorKind::Validation, sub_category, message, status_code, validator_name, request);
    }

    /// Record a handler/processing-layer failure (spec.md §4.E-G/§4.I).
    pub fn log_processing_error(
        &self,
        sub_category: &str,
        message: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        self.log_error(ErrorKind::Processing, sub_category, message, status_code, validator_name, request);
    }

    /// Record a transport-layer failure (spec.md §4.H/§4.I).
    pub fn log_transport_error(
        &self,
        sub_category: &str,
        message: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        self.log_error(ErrorKind::Transport, sub_category, message, status_code, validator_name, request);
    }

    /// Record a Digest-authentication failure (spec.md §4.D/§4.I).
    pub fn log_authentication_error(
        &self,
        sub_category: &str,
        message: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        self.log_error(ErrorKind::Authentication, sub_category, message, status_code, validator_name, request);
    }

    /// Record an RFC 4028 session-timer failure (spec.md §4.D/§4.I).
    pub fn log_session_timer_error(
        &self,
        sub_category: &str,
        message: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        self.log_error(ErrorKind::SessionTimer, sub_category, message, status_code, validator_name, request);
    }

    #[expect(clippy::too_many_arguments, reason = "one param per field spec.md §4.I mandates in the emitted event")]
    fn log_error(
        &self,
        kind: ErrorKind,
        sub_category: &str,
        message: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        let now = Utc::now();
        let sanitized_message = sanitize::sanitize_preview(message);

        let total = {
            let mut stats = self.stats.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            stats.increment(kind);
            stats.count(kind)
        };

        {
            let mut detailed = self.detailed.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            detailed.record(kind, sub_category, &sanitized_message, now);
        }

        let template = pattern::extract_pattern(&sanitized_message);
        let pattern_count = {
            let mut patterns = self.patterns.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            let by_kind = patterns.entry(kind).or_default();
            match by_kind.get_mut(&template) {
                Some(existing) => existing.record(sanitized_message.clone(), now),
                None => {
                    by_kind.insert(template.clone(), ErrorPattern::new(template.clone(), sanitized_message.clone(), kind.log_level(), now));
                }
            }
            by_kind.get(&template).map_or(1, |entry| entry.count)
        };

        {
            let mut sampler = self.sampler.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            sampler.sample(kind, total, now);
        }

        self.emit_event(kind, sub_category, &sanitized_message, &template, status_code, validator_name, request);

        if let Some(RateAlert { count, window, .. }) = self.rate_monitor.record_error(kind) {
            tracing::warn!(kind = kind.as_str(), count, window_secs = window.as_secs(), "error rate threshold crossed");
        }

        if pattern_count > SYSTEMATIC_PATTERN_THRESHOLD {
            tracing::warn!(kind = kind.as_str(), pattern = %template, count = pattern_count, "recurring error pattern looks systematic");
        }

        let hour_total: u64 = {
            let detailed = self.detailed.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            detailed.hourly(kind).iter().sum()
        };
        if hour_total > SYSTEMATIC_HOUR_THRESHOLD {
            tracing::warn!(kind = kind.as_str(), hour_total, "error volume this hour looks systematic");
        }
    }

    #[expect(clippy::too_many_arguments, reason = "one param per field spec.md §4.I mandates in the emitted event")]
    fn emit_event(
        &self,
        kind: ErrorKind,
        sub_category: &str,
        message: &str,
        pattern: &str,
        status_code: u16,
        validator_name: Option<&str>,
        request: Option<&SipMessage>,
    ) {
        let level = kind.log_level();
        let headers = if self.config.debug_mode {
            request.map(sanitize::header_snapshot)
        } else {
            None
        };
        let header_snapshot = headers.map(|pairs| format!("{pairs:?}"));

        let method = request.and_then(SipMessage::method).map(Method::as_str);
        let call_id = request.and_then(|request| request.headers.first("Call-ID"));
        let from = request.and_then(|request| request.headers.first("From"));
        let to = request.and_then(|request| request.headers.first("To"));
        let request_uri = request.and_then(SipMessage::request_uri);

        match level {
            tracing::Level::ERROR => {
                tracing::error!(
                    kind = kind.as_str(),
                    sub_category,
                    pattern,
                    message,
                    status_code,
                    validator_name,
                    method,
                    call_id,
                    from,
                    to,
                    request_uri,
                    header_snapshot,
                    "request processing error",
                );
            }
            _ => {
                tracing::warn!(
                    kind = kind.as_str(),
                    sub_category,
                    pattern,
                    message,
                    status_code,
                    validator_name,
                    method,
                    call_id,
                    from,
                    to,
                    request_uri,
                    header_snapshot,
                    "request processing error",
                );
            }
        }
    }

    /// Emit an Info-level summary: total per kind, the busiest hour across
    /// all kinds, distinct-pattern counts, and sub-category histograms
    /// (spec.md §4.I).
    pub fn log_error_summary(&self) {
        let stats = self.stats.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let detailed = self.detailed.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let patterns = self.patterns.read().unwrap_or_else(std::sync::PoisonError::into_inner);

        let peak_hour = detailed.peak_hour();
        let distinct_patterns: usize = patterns.values().map(HashMap::len).sum();

        tracing::info!(
            total = stats.total(),
            parse = stats.count(ErrorKind::Parse),
            validation = stats.count(ErrorKind::Validation),
            processing = stats.count(ErrorKind::Processing),
            transport = stats.count(ErrorKind::Transport),
            authentication = stats.count(ErrorKind::Authentication),
            session_timer = stats.count(ErrorKind::SessionTimer),
            peak_hour = peak_hour.map(|(hour, _)| hour),
            peak_hour_count = peak_hour.map(|(_, count)| count),
            distinct_patterns,
            "error statistics summary",
        );
    }

    /// Zero every counter, histogram, pattern table, and sample series.
    pub fn reset_statistics(&self) {
        self.stats.write().unwrap_or_else(std::sync::PoisonError::into_inner).reset(Utc::now());
        self.detailed.write().unwrap_or_else(std::sync::PoisonError::into_inner).reset();
        self.patterns.write().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
        *self.sampler.write().unwrap_or_else(std::sync::PoisonError::into_inner) = StatisticsSampler::new();
    }

    /// An owned, deep-copy snapshot of the detailed statistics
    /// (SPEC_FULL.md supplement — never hands out a lock guard).
    #[must_use]
    pub fn snapshot(&self) -> DetailedErrorStatisticsSnapshot {
        let stats = self.stats.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let detailed = self.detailed.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let patterns = self.patterns.read().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut counts = [0u64; 6];
        for kind in ErrorKind::ALL {
            counts[kind.index()] = stats.count(kind);
        }

        let sub_categories = ErrorKind::ALL.into_iter().map(|kind| (kind, detailed.sub_categories(kind))).collect();
        let top_messages = ErrorKind::ALL.into_iter().map(|kind| (kind, detailed.top_messages(kind))).collect();
        let pattern_counts = ErrorKind::ALL.into_iter().map(|kind| (kind, patterns.get(&kind).map_or(0, HashMap::len))).collect();

        DetailedErrorStatisticsSnapshot {
            counts,
            sub_categories,
            top_messages,
            recent_errors: detailed.recent_errors().to_vec(),
            pattern_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_increments_counters_and_patterns() {
        let manager = ErrorLoggingManager::new(ProxyConfig::default());
        manager.log_parse_error("start_line", "unknown method FOO for sip:alice@example.com", 400, None, None);
        manager.log_parse_error("start_line", "unknown method BAR for sip:bob@example.com", 400, None, None);

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.counts[ErrorKind::Parse.index()], 2);
        assert_eq!(*snapshot.pattern_counts.get(&ErrorKind::Parse).unwrap(), 1);
    }

    #[test]
    fn reset_statistics_clears_counts_and_patterns() {
        let manager = ErrorLoggingManager::new(ProxyConfig::default());
        manager.log_transport_error("send", "peer 10.0.0.5 unreachable", 503, None, None);
        manager.reset_statistics();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.counts[ErrorKind::Transport.index()], 0);
        assert_eq!(*snapshot.pattern_counts.get(&ErrorKind::Transport).unwrap(), 0);
    }

    #[test]
    fn debug_mode_attaches_a_header_snapshot_without_panicking() {
        let mut config = ProxyConfig::default();
        config.debug_mode = true;
        let manager = ErrorLoggingManager::new(config);
        let request = SipMessage::request(Method::Invite, "sip:bob@example.com");
        manager.log_validation_error("syntax", "missing required header", 400, Some("syntax"), Some(&request));
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.counts[ErrorKind::Validation.index()], 1);
    }

    /// spec.md §4.I: every logged fault is also emitted as a `tracing`
    /// event, not just folded into the counters — the event is the
    /// operator-visible record when the statistics surface isn't polled.
    #[test]
    #[tracing_test::traced_test]
    fn logging_an_error_emits_a_tracing_event() {
        let manager = ErrorLoggingManager::new(ProxyConfig::default());
        manager.log_transport_error("send", "peer 192.0.2.4 unreachable", 503, None, None);
        assert!(logs_contain("request processing error"));
    }

    /// spec.md §4.I: crossing a configured rate threshold emits its own
    /// warning event in addition to the per-call error event.
    #[test]
    #[tracing_test::traced_test]
    fn crossing_rate_threshold_emits_a_warning_event() {
        let mut config = ProxyConfig::default();
        let mut thresholds = HashMap::new();
        thresholds.insert(
            "parse".to_owned(),
            crate::config::RateThreshold { count: 2, window_secs: 300 },
        );
        config.rate_monitor.thresholds = thresholds;
        let manager = ErrorLoggingManager::new(config);

        for index in 0..3 {
            manager.log_parse_error("start_line", &format!("malformed message {index}"), 400, None, None);
        }

        assert!(logs_contain("error rate threshold crossed"));
    }
}
