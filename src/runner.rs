//! Monte Carlo orchestration: replication, parallel execution, aggregation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;

use itertools::izip;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use threadpool::ThreadPool;

use crate::arrival::generate_arrivals;
use crate::config::ScenarioConfig;
use crate::error::SimulationError;
use crate::simulator::simulate_queue;
use crate::stats::{summarize, MetricSummary, RunMetrics};

/// Aggregated results over all replications of one scenario.
///
/// Each metric carries the sample mean across replications and a 95%
/// confidence interval. Check `degenerate` before trusting an interval: a
/// zero-width interval from a single replication or zero variance is not
/// high confidence. `partial` is set when early termination left fewer than
/// the requested number of replications.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedResults {
    pub scenario_name: String,
    pub requested_replications: usize,
    pub completed_replications: usize,
    pub partial: bool,
    pub degenerate: bool,
    pub avg_wait_time: MetricSummary,
    pub max_wait_time: MetricSummary,
    pub p95_wait_time: MetricSummary,
    pub avg_queue_length: MetricSummary,
    pub max_queue_length: MetricSummary,
    pub desk_utilization: MetricSummary,
    pub service_level: MetricSummary,
    pub total_customers: MetricSummary,
    pub total_customers_std: f64,
    pub total_time: MetricSummary,
}

/// Shared flag for abandoning the remaining replications of a run.
#[derive(Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests early termination; already running replications complete.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Executes one replication with its own random stream.
///
/// This is the per-replication hook of the core: alternative execution
/// strategies (process pools, distributed workers) can call it directly and
/// feed the collected metrics to [`aggregate`].
pub fn simulate_one(scenario: &ScenarioConfig, seed: u64) -> Result<RunMetrics, SimulationError> {
    scenario.validate()?;
    let mut rng = Pcg64::seed_from_u64(seed);
    let arrivals = generate_arrivals(scenario, &mut rng);
    let outcome = simulate_queue(scenario, &arrivals, &mut rng)?;
    Ok(RunMetrics::collect(scenario, &outcome))
}

/// Combines per-replication metrics into point estimates with 95% CIs.
///
/// Order-independent and always single-threaded; public so that alternative
/// parallel execution strategies can reuse it, including over a partial set
/// of replications after early termination.
pub fn aggregate(
    scenario: &ScenarioConfig,
    metrics: &[RunMetrics],
) -> Result<AggregatedResults, SimulationError> {
    if metrics.is_empty() {
        return Err(SimulationError::config(
            "no replication results to aggregate",
        ));
    }
    let column = |f: fn(&RunMetrics) -> f64| -> Vec<f64> { metrics.iter().map(f).collect() };
    let customers = column(|m| m.total_customers as f64);
    let summaries = [
        summarize(&column(|m| m.avg_wait_time)),
        summarize(&column(|m| m.max_wait_time)),
        summarize(&column(|m| m.p95_wait_time)),
        summarize(&column(|m| m.avg_queue_length)),
        summarize(&column(|m| m.max_queue_length as f64)),
        summarize(&column(|m| m.desk_utilization)),
        summarize(&column(|m| m.service_level)),
        summarize(&customers),
        summarize(&column(|m| m.total_time)),
    ];
    let degenerate = metrics.len() < 2 || summaries.iter().any(|s| s.width() == 0.);
    let partial = metrics.len() < scenario.num_simulations;
    if partial {
        warn!(
            "scenario '{}': aggregating {} of {} replications, results are partial",
            scenario.name,
            metrics.len(),
            scenario.num_simulations
        );
    }
    let [avg_wait_time, max_wait_time, p95_wait_time, avg_queue_length, max_queue_length, desk_utilization, service_level, total_customers, total_time] =
        summaries;
    Ok(AggregatedResults {
        scenario_name: scenario.name.clone(),
        requested_replications: scenario.num_simulations,
        completed_replications: metrics.len(),
        partial,
        degenerate,
        avg_wait_time,
        max_wait_time,
        p95_wait_time,
        avg_queue_length,
        max_queue_length,
        desk_utilization,
        service_level,
        total_customers,
        total_customers_std: crate::stats::sample_std(&customers),
        total_time,
    })
}

/// Runs the Monte Carlo batch for a scenario.
///
/// Replications are independent: each gets a random stream seeded from the
/// scenario seed plus its run index, so a fixed seed reproduces the whole
/// batch bit for bit, sequentially or in parallel. The first failing
/// replication (by run index) aborts the batch; remaining queued work is
/// abandoned rather than silently dropped from the statistics.
pub struct MonteCarloRunner {
    n_workers: usize,
    stop: StopToken,
}

impl Default for MonteCarloRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MonteCarloRunner {
    /// Creates a runner with one worker per available CPU.
    pub fn new() -> Self {
        let n_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_workers(n_workers)
    }

    /// Creates a runner with a fixed worker count; one worker runs
    /// replications sequentially on the calling thread.
    pub fn with_workers(n_workers: usize) -> Self {
        Self {
            n_workers: n_workers.max(1),
            stop: StopToken::new(),
        }
    }

    /// Token for requesting early termination of a running batch.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Executes the batch and aggregates the collected metrics.
    pub fn run(&self, scenario: &ScenarioConfig) -> Result<AggregatedResults, SimulationError> {
        scenario.validate()?;
        let base_seed = scenario.random_seed.unwrap_or_else(rand::random);
        info!(
            "scenario '{}': running {} replications with base seed {} on {} workers",
            scenario.name, scenario.num_simulations, base_seed, self.n_workers
        );
        let metrics = if self.n_workers > 1 && scenario.num_simulations > 1 {
            self.run_parallel(scenario, base_seed)?
        } else {
            self.run_sequential(scenario, base_seed)?
        };
        aggregate(scenario, &metrics)
    }

    fn run_sequential(
        &self,
        scenario: &ScenarioConfig,
        base_seed: u64,
    ) -> Result<Vec<RunMetrics>, SimulationError> {
        let mut metrics = Vec::with_capacity(scenario.num_simulations);
        for run in 0..scenario.num_simulations {
            if self.stop.is_stopped() {
                debug!("scenario '{}': stopped after {} replications", scenario.name, run);
                break;
            }
            let seed = base_seed.wrapping_add(run as u64);
            metrics.push(simulate_one(scenario, seed).map_err(|e| {
                SimulationError::Replication {
                    run,
                    reason: e.to_string(),
                }
            })?);
        }
        Ok(metrics)
    }

    fn run_parallel(
        &self,
        scenario: &ScenarioConfig,
        base_seed: u64,
    ) -> Result<Vec<RunMetrics>, SimulationError> {
        let n = scenario.num_simulations;
        let seeds: Vec<u64> = (0..n).map(|run| base_seed.wrapping_add(run as u64)).collect();
        let pool = ThreadPool::new(self.n_workers);
        let (tx, rx) = channel();
        for (run, seed) in izip!(0..n, seeds) {
            let tx = tx.clone();
            let stop = self.stop.clone();
            let scenario = scenario.clone();
            pool.execute(move || {
                if stop.is_stopped() {
                    let _ = tx.send((run, None));
                    return;
                }
                let _ = tx.send((run, Some(simulate_one(&scenario, seed))));
            });
        }
        drop(tx);

        let mut completed: Vec<(usize, RunMetrics)> = Vec::with_capacity(n);
        let mut failure: Option<(usize, SimulationError)> = None;
        for (run, result) in rx.iter().take(n) {
            match result {
                Some(Ok(m)) => completed.push((run, m)),
                Some(Err(e)) => {
                    // Abandon the queued replications; the batch is lost anyway.
                    self.stop.stop();
                    if failure.as_ref().map_or(true, |(r, _)| run < *r) {
                        failure = Some((run, e));
                    }
                }
                None => {}
            }
        }
        if let Some((run, e)) = failure {
            return Err(SimulationError::Replication {
                run,
                reason: e.to_string(),
            });
        }
        completed.sort_by_key(|x| x.0);
        Ok(completed.into_iter().map(|x| x.1).collect())
    }

    /// Runs a batch of scenarios and returns their results in order.
    pub fn compare_scenarios(
        &self,
        scenarios: &[ScenarioConfig],
    ) -> Result<Vec<AggregatedResults>, SimulationError> {
        scenarios.iter().map(|s| self.run(s)).collect()
    }
}

/// Single synchronous entry point: runs the whole Monte Carlo batch for a
/// scenario with default parallelism. Deterministic given a fixed
/// `random_seed`.
pub fn run_simulation(scenario: &ScenarioConfig) -> Result<AggregatedResults, SimulationError> {
    MonteCarloRunner::new().run(scenario)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::DeskRoster;

    fn scenario(num_simulations: usize, seed: Option<u64>) -> ScenarioConfig {
        ScenarioConfig {
            name: "runner".to_string(),
            arrival_rates: HashMap::from([(9, 15.), (10, 25.), (11, 10.)]),
            desks: DeskRoster::Constant(2),
            mean_service_time: 4.,
            operating_hours: (9, 12),
            num_simulations,
            service_level_threshold: 5.,
            random_seed: seed,
        }
    }

    #[test]
    fn simulate_one_is_deterministic() {
        let s = scenario(1, None);
        let a = simulate_one(&s, 99).unwrap();
        let b = simulate_one(&s, 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn simulate_one_rejects_invalid_config() {
        let mut s = scenario(1, None);
        s.arrival_rates.remove(&10);
        assert!(matches!(
            simulate_one(&s, 0),
            Err(SimulationError::Configuration { .. })
        ));
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let s = scenario(40, Some(7));
        let sequential = MonteCarloRunner::with_workers(1).run(&s).unwrap();
        let parallel = MonteCarloRunner::with_workers(4).run(&s).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let s = scenario(20, Some(3));
        let mut metrics: Vec<RunMetrics> = (0..20)
            .map(|run| simulate_one(&s, 3 + run as u64).unwrap())
            .collect();
        let forward = aggregate(&s, &metrics).unwrap();
        metrics.reverse();
        let reversed = aggregate(&s, &metrics).unwrap();
        assert!((forward.avg_wait_time.mean - reversed.avg_wait_time.mean).abs() < 1e-9);
        assert!((forward.avg_wait_time.ci.0 - reversed.avg_wait_time.ci.0).abs() < 1e-9);
        assert!((forward.avg_wait_time.ci.1 - reversed.avg_wait_time.ci.1).abs() < 1e-9);
    }

    #[test]
    fn aggregate_rejects_empty_input() {
        let s = scenario(5, None);
        assert!(aggregate(&s, &[]).is_err());
    }

    #[test]
    fn single_replication_is_degenerate() {
        let s = scenario(1, Some(5));
        let results = run_simulation(&s).unwrap();
        assert!(results.degenerate);
        assert!(!results.partial);
        assert_eq!(results.avg_wait_time.ci.0, results.avg_wait_time.ci.1);
        assert_eq!(results.completed_replications, 1);
    }

    #[test]
    fn stopped_run_is_labeled_partial() {
        let s = scenario(50, Some(11));
        let runner = MonteCarloRunner::with_workers(1);
        // Stop before starting; the sequential loop checks the token per run.
        runner.stop_token().stop();
        // Everything was abandoned, nothing to aggregate.
        assert!(runner.run(&s).is_err());

        let runner = MonteCarloRunner::with_workers(1);
        let token = runner.stop_token();
        // Simulate a caller that lets some replications finish: run a few
        // manually and aggregate the partial set.
        let metrics: Vec<RunMetrics> = (0..5)
            .map(|run| simulate_one(&s, 11 + run as u64).unwrap())
            .collect();
        token.stop();
        let results = aggregate(&s, &metrics).unwrap();
        assert!(results.partial);
        assert_eq!(results.completed_replications, 5);
        assert_eq!(results.requested_replications, 50);
    }

    #[test]
    fn compare_scenarios_keeps_order() {
        let mut fast = scenario(10, Some(1));
        fast.name = "fast".to_string();
        let mut slow = scenario(10, Some(1));
        slow.name = "slow".to_string();
        slow.mean_service_time = 12.;
        let results = MonteCarloRunner::with_workers(2)
            .compare_scenarios(&[fast, slow])
            .unwrap();
        assert_eq!(results[0].scenario_name, "fast");
        assert_eq!(results[1].scenario_name, "slow");
        assert!(results[1].avg_wait_time.mean > results[0].avg_wait_time.mean);
    }
}
