//! Customer arrival generation using a time-inhomogeneous Poisson process.

use rand::Rng;
use rand_distr::{Distribution, Poisson};
use rand_pcg::Pcg64;

use crate::config::ScenarioConfig;

/// Generates one day of arrival instants for the scenario.
///
/// The rate is piecewise constant over the operating hours: each hour draws a
/// Poisson-distributed arrival count with mean `arrival_rates[hour]` and
/// places that many instants uniformly within the hour's 60-minute window.
/// This is exact for a piecewise-constant-rate Poisson process.
///
/// Returns instants in minutes from opening, sorted ascending, all inside
/// `[0, horizon)`. Fractional rates are valid Poisson means; an hour with
/// rate 0 deterministically contributes no arrivals.
pub fn generate_arrivals(scenario: &ScenarioConfig, rng: &mut Pcg64) -> Vec<f64> {
    let (open, close) = scenario.operating_hours;
    let mut arrivals = Vec::new();
    for hour in open..close {
        let rate = scenario.arrival_rates.get(&hour).copied().unwrap_or(0.);
        if rate <= 0. {
            continue;
        }
        let count = Poisson::new(rate).unwrap().sample(rng) as usize;
        let hour_start = ((hour - open) * 60) as f64;
        for _ in 0..count {
            arrivals.push(hour_start + rng.gen_range(0.0..60.0));
        }
    }
    arrivals.sort_by(|a, b| a.total_cmp(b));
    arrivals
}

/// Summary statistics of an arrival rate profile.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrivalPattern {
    /// Expected number of arrivals over the whole operating day.
    pub expected_arrivals: f64,
    /// Largest hourly rate in the profile.
    pub peak_rate: f64,
    /// Hour of day with the largest rate, `None` when all rates are zero.
    pub peak_hour: Option<u32>,
    /// Mean rate over the operating hours.
    pub average_rate: f64,
}

/// Analyzes the scenario's arrival profile without drawing any randomness.
pub fn analyze_pattern(scenario: &ScenarioConfig) -> ArrivalPattern {
    let (open, close) = scenario.operating_hours;
    let mut expected = 0.;
    let mut peak_rate = 0.;
    let mut peak_hour = None;
    for hour in open..close {
        let rate = scenario.arrival_rates.get(&hour).copied().unwrap_or(0.);
        expected += rate;
        if rate > peak_rate {
            peak_rate = rate;
            peak_hour = Some(hour);
        }
    }
    ArrivalPattern {
        expected_arrivals: expected,
        peak_rate,
        peak_hour,
        average_rate: expected / ((close - open) as f64),
    }
}
