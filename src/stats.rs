//! Per-run metrics and sample statistics.

use serde::Serialize;

use crate::config::ScenarioConfig;
use crate::simulator::RunOutcome;

/// Occupancy recorded immediately after one simulation event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesPoint {
    pub time: f64,
    pub queue_length: usize,
    pub busy_desks: u32,
}

/// Piecewise-constant record of queue length and busy desk count over a run.
///
/// The state before the first point is empty (nothing queued, nothing busy).
#[derive(Clone, Debug, Default)]
pub struct OccupancySeries {
    points: Vec<SeriesPoint>,
}

impl OccupancySeries {
    pub fn record(&mut self, time: f64, queue_length: usize, busy_desks: u32) {
        self.points.push(SeriesPoint {
            time,
            queue_length,
            busy_desks,
        });
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn max_queue_length(&self) -> usize {
        self.points.iter().map(|p| p.queue_length).max().unwrap_or(0)
    }

    /// Queue length averaged over `[0, end]`, weighted by the duration each
    /// value held.
    pub fn time_weighted_queue_length(&self, end: f64) -> f64 {
        if end <= 0. {
            return 0.;
        }
        let mut integral = 0.;
        let mut prev_time = 0.;
        let mut prev_value = 0usize;
        for p in &self.points {
            integral += prev_value as f64 * (p.time.min(end) - prev_time).max(0.);
            prev_time = p.time;
            prev_value = p.queue_length;
        }
        if prev_time < end {
            integral += prev_value as f64 * (end - prev_time);
        }
        integral / end
    }
}

/// Accumulated work of one desk slot over a run.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeskUsage {
    /// Minutes spent serving customers.
    pub busy_time: f64,
    /// Minutes the slot was rostered over the operating day.
    pub available_time: f64,
    pub customers_served: u64,
}

impl DeskUsage {
    pub fn utilization(&self) -> f64 {
        if self.available_time <= 0. {
            return 0.;
        }
        // Overtime service can push busy time slightly past the roster.
        (self.busy_time / self.available_time).min(1.)
    }
}

/// Summary metrics of a single replication.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Mean customer wait, in minutes.
    pub avg_wait_time: f64,
    /// Largest customer wait, in minutes.
    pub max_wait_time: f64,
    /// 95th percentile wait (nearest rank), in minutes.
    pub p95_wait_time: f64,
    /// Time-weighted mean queue length over the run.
    pub avg_queue_length: f64,
    pub max_queue_length: usize,
    /// Mean over rostered desk slots of busy time / available time.
    pub desk_utilization: f64,
    /// Fraction of customers served within the service level threshold.
    /// 1.0 when no customers arrived.
    pub service_level: f64,
    pub total_customers: usize,
    /// Run length in minutes, including overtime past closing.
    pub total_time: f64,
}

impl RunMetrics {
    /// Derives the per-run metrics from a completed simulation.
    pub fn collect(scenario: &ScenarioConfig, outcome: &RunOutcome) -> Self {
        let mut wait_times: Vec<f64> = outcome.customers.iter().map(|c| c.wait_time()).collect();
        wait_times.sort_by(|a, b| a.total_cmp(b));

        let (avg_wait, max_wait, p95_wait, service_level) = if wait_times.is_empty() {
            (0., 0., 0., 1.)
        } else {
            let n = wait_times.len();
            let sum: f64 = wait_times.iter().sum();
            let within = wait_times
                .iter()
                .filter(|w| **w <= scenario.service_level_threshold)
                .count();
            let p95_idx = ((0.95 * n as f64).ceil() as usize).max(1) - 1;
            (
                sum / n as f64,
                wait_times[n - 1],
                wait_times[p95_idx],
                within as f64 / n as f64,
            )
        };

        let utilization = if outcome.desks.is_empty() {
            0.
        } else {
            outcome.desks.iter().map(DeskUsage::utilization).sum::<f64>()
                / outcome.desks.len() as f64
        };

        Self {
            avg_wait_time: avg_wait,
            max_wait_time: max_wait,
            p95_wait_time: p95_wait,
            avg_queue_length: outcome.series.time_weighted_queue_length(outcome.end_time),
            max_queue_length: outcome.series.max_queue_length(),
            desk_utilization: utilization,
            service_level,
            total_customers: outcome.customers.len(),
            total_time: outcome.end_time,
        }
    }
}

/// Point estimate with a 95% confidence interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    /// `(lower, upper)` bounds; zero-width only for a single sample or zero
    /// variance, flagged as degenerate by the aggregation.
    pub ci: (f64, f64),
}

impl MetricSummary {
    pub fn width(&self) -> f64 {
        self.ci.1 - self.ci.0
    }
}

/// Sample mean and 95% CI under the normal approximation.
///
/// Order-independent: only sums and sums of squares of the sample enter the
/// result. Must not be called with an empty sample.
pub fn summarize(values: &[f64]) -> MetricSummary {
    let n = values.len();
    debug_assert!(n > 0);
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return MetricSummary { mean, ci: (mean, mean) };
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64;
    let margin = 1.96 * (var / n as f64).sqrt();
    MetricSummary {
        mean,
        ci: (mean - margin, mean + margin),
    }
}

/// Sample standard deviation (ddof = 1); 0 for samples shorter than two.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn time_weighted_average_integrates_segments() {
        let mut series = OccupancySeries::default();
        // Queue is 0 until t=10, then 2 until t=30, then 1 until t=40.
        series.record(10., 2, 1);
        series.record(30., 1, 1);
        series.record(40., 0, 0);
        let avg = series.time_weighted_queue_length(40.);
        assert!((avg - (2. * 20. + 1. * 10.) / 40.).abs() < EPS);
        assert_eq!(series.max_queue_length(), 2);
    }

    #[test]
    fn time_weighted_average_extends_last_value() {
        let mut series = OccupancySeries::default();
        series.record(10., 3, 1);
        // Last value holds from t=10 to the end of the window.
        let avg = series.time_weighted_queue_length(20.);
        assert!((avg - 1.5).abs() < EPS);
    }

    #[test]
    fn empty_series_averages_to_zero() {
        let series = OccupancySeries::default();
        assert_eq!(series.time_weighted_queue_length(100.), 0.);
        assert_eq!(series.max_queue_length(), 0);
    }

    #[test]
    fn utilization_clamped_and_guarded() {
        let usage = DeskUsage {
            busy_time: 30.,
            available_time: 60.,
            customers_served: 4,
        };
        assert!((usage.utilization() - 0.5).abs() < EPS);
        let overtime = DeskUsage {
            busy_time: 70.,
            available_time: 60.,
            customers_served: 9,
        };
        assert_eq!(overtime.utilization(), 1.);
        let unrostered = DeskUsage::default();
        assert_eq!(unrostered.utilization(), 0.);
    }

    #[test]
    fn summarize_known_sample() {
        let s = summarize(&[2., 4., 4., 4., 5., 5., 7., 9.]);
        assert!((s.mean - 5.).abs() < EPS);
        // std = sqrt(32/7), margin = 1.96 * std / sqrt(8)
        let margin = 1.96 * (32f64 / 7.).sqrt() / 8f64.sqrt();
        assert!((s.ci.0 - (5. - margin)).abs() < EPS);
        assert!((s.ci.1 - (5. + margin)).abs() < EPS);
    }

    #[test]
    fn summarize_single_sample_is_zero_width() {
        let s = summarize(&[3.5]);
        assert_eq!(s.mean, 3.5);
        assert_eq!(s.ci, (3.5, 3.5));
        assert_eq!(s.width(), 0.);
    }

    #[test]
    fn summarize_zero_variance_is_zero_width() {
        let s = summarize(&[2., 2., 2., 2.]);
        assert_eq!(s.ci, (2., 2.));
    }

    #[test]
    fn summarize_is_order_independent() {
        let a = summarize(&[1., 5., 2., 8., 3.]);
        let b = summarize(&[8., 1., 3., 5., 2.]);
        assert!((a.mean - b.mean).abs() < EPS);
        assert!((a.ci.0 - b.ci.0).abs() < EPS);
        assert!((a.ci.1 - b.ci.1).abs() < EPS);
    }

    #[test]
    fn sample_std_basics() {
        assert_eq!(sample_std(&[5.]), 0.);
        assert!((sample_std(&[1., 3.]) - 2f64.sqrt()).abs() < EPS);
    }
}
