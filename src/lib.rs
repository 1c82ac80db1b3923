//! A library for predicting customer waiting times at a multi-desk service
//! counter under a time-varying arrival load.
//!
//! The core is a three-stage pipeline: a time-inhomogeneous Poisson arrival
//! generator ([`arrival`]), a discrete-event multi-server queue simulator with
//! an hourly desk roster ([`simulator`]), and a Monte Carlo runner that
//! repeats the pipeline over independent replications and reports point
//! estimates with 95% confidence intervals ([`runner`]), optionally across a
//! thread pool.
//!
//! Consumers interact through two contracts: [`run_simulation`] for a whole
//! scenario and [`simulate_one`] for a single seeded replication, so
//! alternative parallel execution strategies can be substituted without
//! touching the simulation logic.

pub mod arrival;
pub mod config;
pub mod customer;
pub mod error;
pub mod event;
pub mod runner;
pub mod simulator;
pub mod stats;

pub use config::{DeskRoster, RawScenarioConfig, ScenarioConfig};
pub use customer::Customer;
pub use error::SimulationError;
pub use runner::{run_simulation, simulate_one, AggregatedResults, MonteCarloRunner, StopToken};
pub use simulator::{simulate_queue, RunOutcome};
pub use stats::{MetricSummary, RunMetrics};
