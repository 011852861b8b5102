//! Background statistics sampler (spec.md §4.I supplement): periodic
//! snapshots of per-kind counters turned into rates and trend slopes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::ErrorKind;

/// Bound on retained sample points per kind (spec.md §4.I).
const MAX_POINTS_PER_METRIC: usize = 100;

/// One observed (timestamp, cumulative-count) sample.
#[derive(Debug, Clone, Copy)]
struct Sample {
    at: DateTime<Utc>,
    cumulative_count: u64,
}

/// Rolling per-kind sample history used to compute instantaneous rates
/// and growth trends without holding the full statistics lock for long.
#[derive(Debug, Clone, Default)]
pub struct StatisticsSampler {
    points: HashMap<ErrorKind, Vec<Sample>>,
}

/// A derived rate/trend reading for one kind between its two most recent
/// samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateReading {
    /// Errors per second since the previous sample.
    pub errors_per_second: f64,
    /// Growth ratio versus the previous sample's cumulative count
    /// (`None` when the previous count was zero).
    pub growth_ratio: Option<f64>,
}

impl StatisticsSampler {
    /// An empty sampler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cumulative-count sample for `kind` at `at`, evicting the
    /// oldest point once [`MAX_POINTS_PER_METRIC`] is exceeded.
    pub fn sample(&mut self, kind: ErrorKind, cumulative_count: u64, at: DateTime<Utc>) {
        let series = self.points.entry(kind).or_default();
        series.push(Sample { at, cumulative_count });
        if series.len() > MAX_POINTS_PER_METRIC {
            series.remove(0);
        }
    }

    /// The rate/trend reading between the two most recent samples for
    /// `kind`, or `None` with fewer than two samples recorded.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "rates are approximate by nature")]
    pub fn latest_rate(&self, kind: ErrorKind) -> Option<RateReading> {
        let series = self.points.get(&kind)?;
        let (previous, current) = (series.get(series.len().checked_sub(2)?)?, series.last()?);
        let elapsed_millis = u64::try_from((current.at - previous.at).num_milliseconds().max(0)).unwrap_or(0);
        let elapsed_secs = elapsed_millis as f64 / 1000.0;
        let delta = current.cumulative_count.saturating_sub(previous.cumulative_count);
        let errors_per_second = if elapsed_secs > 0.0 { delta as f64 / elapsed_secs } else { 0.0 };
        let growth_ratio =
            if previous.cumulative_count > 0 { Some(current.cumulative_count as f64 / previous.cumulative_count as f64) } else { None };
        Some(RateReading { errors_per_second, growth_ratio })
    }

    /// Number of retained sample points for `kind`.
    #[must_use]
    pub fn sample_count(&self, kind: ErrorKind) -> usize {
        self.points.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn latest_rate_is_none_with_fewer_than_two_samples() {
        let mut sampler = StatisticsSampler::new();
        assert!(sampler.latest_rate(ErrorKind::Parse).is_none());
        sampler.sample(ErrorKind::Parse, 10, ts(0));
        assert!(sampler.latest_rate(ErrorKind::Parse).is_none());
    }

    #[test]
    fn computes_rate_between_two_most_recent_samples() {
        let mut sampler = StatisticsSampler::new();
        sampler.sample(ErrorKind::Parse, 0, ts(0));
        sampler.sample(ErrorKind::Parse, 20, ts(10));
        let reading = sampler.latest_rate(ErrorKind::Parse).unwrap();
        assert!((reading.errors_per_second - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_history_is_bounded() {
        let mut sampler = StatisticsSampler::new();
        for index in 0..(MAX_POINTS_PER_METRIC + 10) {
            sampler.sample(ErrorKind::Transport, u64::try_from(index).unwrap(), ts(i64::try_from(index).unwrap()));
        }
        assert_eq!(sampler.sample_count(ErrorKind::Transport), MAX_POINTS_PER_METRIC);
    }

    #[test]
    fn growth_ratio_is_none_when_previous_count_is_zero() {
        let mut sampler = StatisticsSampler::new();
        sampler.sample(ErrorKind::Parse, 0, ts(0));
        sampler.sample(ErrorKind::Parse, 5, ts(1));
        assert!(sampler.latest_rate(ErrorKind::Parse).unwrap().growth_ratio.is_none());
    }
}
