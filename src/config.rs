//! Scenario configuration and validation.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Default service level threshold in minutes.
pub const DEFAULT_SERVICE_LEVEL_THRESHOLD: f64 = 5.;

/// Desk count available at each hour of the day.
///
/// Resolved once per hour lookup instead of branching on an optional schedule
/// throughout the simulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DeskRoster {
    /// The same desk count for every operating hour.
    Constant(u32),
    /// Per-hour desk counts; hours absent from the schedule fall back to `default`.
    Scheduled {
        schedule: HashMap<u32, u32>,
        default: u32,
    },
}

impl DeskRoster {
    /// Returns the desk count rostered for the given hour of day.
    pub fn desks_at(&self, hour: u32) -> u32 {
        match self {
            DeskRoster::Constant(count) => *count,
            DeskRoster::Scheduled { schedule, default } => {
                schedule.get(&hour).copied().unwrap_or(*default)
            }
        }
    }

    /// Returns the largest desk count rostered over the given hour range.
    pub fn max_desks(&self, open: u32, close: u32) -> u32 {
        (open..close).map(|h| self.desks_at(h)).max().unwrap_or(0)
    }
}

/// Immutable simulation scenario, validated before any event is processed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario identifier, carried through to the aggregated results.
    pub name: String,
    /// Mean arrivals per hour for each hour of day. Must cover every operating hour.
    pub arrival_rates: HashMap<u32, f64>,
    /// Desk availability over the day.
    pub desks: DeskRoster,
    /// Mean of the exponential service time distribution, in minutes.
    pub mean_service_time: f64,
    /// Half-open operating interval `[open, close)` in hours of day.
    pub operating_hours: (u32, u32),
    /// Number of Monte Carlo replications.
    pub num_simulations: usize,
    /// Wait time boundary (minutes) for the service level metric.
    pub service_level_threshold: f64,
    /// Base seed for the replication random streams. `None` seeds from entropy,
    /// so reruns will vary; fix it for reproducible results.
    pub random_seed: Option<u64>,
}

impl ScenarioConfig {
    /// Length of the operating day in minutes.
    pub fn horizon(&self) -> f64 {
        let (open, close) = self.operating_hours;
        ((close - open) * 60) as f64
    }

    /// Maps a simulation clock value (minutes from opening) to an hour of day.
    ///
    /// Instants at or past closing clamp to the final operating hour, so
    /// in-flight overtime keeps the closing-hour roster.
    pub fn hour_at(&self, time: f64) -> u32 {
        let (open, close) = self.operating_hours;
        let offset = (time / 60.).floor() as u32;
        (open + offset).min(close - 1)
    }

    /// Desk count rostered at a given simulation clock value.
    pub fn desks_at_time(&self, time: f64) -> u32 {
        self.desks.desks_at(self.hour_at(time))
    }

    /// Checks the invariants the simulator relies on.
    ///
    /// Validation is assumed to have happened at the boundary; the core still
    /// re-checks and fails rather than silently clamping out-of-range values.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let (open, close) = self.operating_hours;
        if open >= close || close > 24 {
            return Err(SimulationError::config(format!(
                "operating hours ({}, {}) must satisfy 0 <= open < close <= 24",
                open, close
            )));
        }
        if !(self.mean_service_time.is_finite() && self.mean_service_time > 0.) {
            return Err(SimulationError::config(format!(
                "mean service time {} must be positive and finite",
                self.mean_service_time
            )));
        }
        if self.num_simulations == 0 {
            return Err(SimulationError::config("num_simulations must be positive"));
        }
        if !(self.service_level_threshold.is_finite() && self.service_level_threshold >= 0.) {
            return Err(SimulationError::config(format!(
                "service level threshold {} must be non-negative and finite",
                self.service_level_threshold
            )));
        }
        for hour in open..close {
            let rate = match self.arrival_rates.get(&hour) {
                Some(rate) => *rate,
                None => {
                    return Err(SimulationError::config(format!(
                        "no arrival rate defined for operating hour {}",
                        hour
                    )));
                }
            };
            if !(rate.is_finite() && rate >= 0.) {
                return Err(SimulationError::config(format!(
                    "arrival rate {} at hour {} must be non-negative and finite",
                    rate, hour
                )));
            }
            // Arrivals into a closed counter cannot be absorbed silently.
            if rate > 0. && self.desks.desks_at(hour) == 0 {
                return Err(SimulationError::config(format!(
                    "hour {} has arrival rate {} but zero desks",
                    hour, rate
                )));
            }
        }
        if self.desks.max_desks(open, close) == 0 {
            return Err(SimulationError::config(
                "no desks rostered for any operating hour",
            ));
        }
        Ok(())
    }
}

/// YAML-serializable scenario, resolved into [`ScenarioConfig`] with validation.
///
/// Exactly one of `num_desks` and `desk_schedule` must be given.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawScenarioConfig {
    pub name: String,
    pub arrival_rates: HashMap<u32, f64>,
    #[serde(default)]
    pub num_desks: Option<u32>,
    #[serde(default)]
    pub desk_schedule: Option<HashMap<u32, u32>>,
    pub mean_service_time: f64,
    pub operating_hours: (u32, u32),
    pub num_simulations: usize,
    #[serde(default)]
    pub service_level_threshold: Option<f64>,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl ScenarioConfig {
    pub fn from_raw(raw: RawScenarioConfig) -> Result<Self, SimulationError> {
        let desks = match (raw.num_desks, raw.desk_schedule) {
            (Some(_), Some(_)) => {
                return Err(SimulationError::config(
                    "cannot specify both num_desks and desk_schedule",
                ));
            }
            (None, None) => {
                return Err(SimulationError::config(
                    "either num_desks or desk_schedule must be specified",
                ));
            }
            (Some(count), None) => DeskRoster::Constant(count),
            (None, Some(schedule)) => DeskRoster::Scheduled {
                schedule,
                // Hours missing from the schedule keep the counter open with one desk.
                default: 1,
            },
        };
        let config = Self {
            name: raw.name,
            arrival_rates: raw.arrival_rates,
            desks,
            mean_service_time: raw.mean_service_time,
            operating_hours: raw.operating_hours,
            num_simulations: raw.num_simulations,
            service_level_threshold: raw
                .service_level_threshold
                .unwrap_or(DEFAULT_SERVICE_LEVEL_THRESHOLD),
            random_seed: raw.random_seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(path: &Path) -> Result<Self, SimulationError> {
        let f = File::open(path)
            .map_err(|e| SimulationError::config(format!("cannot open {:?}: {}", path, e)))?;
        let raw: RawScenarioConfig = serde_yaml::from_reader(f)
            .map_err(|e| SimulationError::config(format!("cannot parse {:?}: {}", path, e)))?;
        Self::from_raw(raw)
    }
}
