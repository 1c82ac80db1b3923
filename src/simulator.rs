//! Discrete-event simulation of a multi-desk FCFS queue.

use std::collections::{BinaryHeap, VecDeque};

use log::debug;
use rand_distr::{Distribution, Exp};
use rand_pcg::Pcg64;

use crate::config::ScenarioConfig;
use crate::customer::Customer;
use crate::error::SimulationError;
use crate::event::{Event, EventKind};
use crate::stats::{DeskUsage, OccupancySeries};

/// Everything produced by one simulation run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// All customers of the run, with service start and departure resolved.
    pub customers: Vec<Customer>,
    /// Queue length and busy desk count after every event.
    pub series: OccupancySeries,
    /// Per-desk-slot usage, indexed by slot.
    pub desks: Vec<DeskUsage>,
    /// Run length in minutes: the operating horizon, extended by any service
    /// still in flight at closing.
    pub end_time: f64,
}

struct DeskPool {
    busy: Vec<bool>,
    busy_count: u32,
}

impl DeskPool {
    fn new(slots: usize) -> Self {
        Self {
            busy: vec![false; slots],
            busy_count: 0,
        }
    }

    /// Lowest idle slot within the first `rostered` slots, if any.
    fn free_slot(&self, rostered: u32) -> Option<usize> {
        self.busy
            .iter()
            .take(rostered as usize)
            .position(|busy| !busy)
    }

    fn occupy(&mut self, slot: usize) {
        self.busy[slot] = true;
        self.busy_count += 1;
    }

    fn release(&mut self, slot: usize) {
        self.busy[slot] = false;
        self.busy_count -= 1;
    }
}

struct QueueSim<'a> {
    scenario: &'a ScenarioConfig,
    service_dist: Exp<f64>,
    heap: BinaryHeap<Event>,
    event_seq: u64,
    customers: Vec<Customer>,
    desks: DeskPool,
    usage: Vec<DeskUsage>,
    queue: VecDeque<usize>,
    series: OccupancySeries,
    end_time: f64,
}

impl<'a> QueueSim<'a> {
    fn new(scenario: &'a ScenarioConfig, arrivals: &[f64]) -> Result<Self, SimulationError> {
        let (open, close) = scenario.operating_hours;
        let slots = scenario.desks.max_desks(open, close) as usize;
        let service_dist = Exp::new(1. / scenario.mean_service_time).map_err(|e| {
            SimulationError::config(format!("bad service time distribution: {}", e))
        })?;

        let mut usage = vec![DeskUsage::default(); slots];
        for hour in open..close {
            let rostered = scenario.desks.desks_at(hour) as usize;
            for u in usage.iter_mut().take(rostered) {
                u.available_time += 60.;
            }
        }

        let mut sim = Self {
            scenario,
            service_dist,
            heap: BinaryHeap::new(),
            event_seq: 0,
            customers: arrivals
                .iter()
                .enumerate()
                .map(|(id, t)| Customer::new(id, *t))
                .collect(),
            desks: DeskPool::new(slots),
            usage,
            queue: VecDeque::new(),
            series: OccupancySeries::default(),
            end_time: scenario.horizon(),
        };
        for id in 0..sim.customers.len() {
            let time = sim.customers[id].arrival_time;
            sim.push_event(time, EventKind::Arrival { customer: id });
        }
        // Roster changes matter even with no event nearby: queued customers
        // must be dispatched the instant extra desks open.
        for hour in open + 1..close {
            if scenario.desks.desks_at(hour) != scenario.desks.desks_at(hour - 1) {
                sim.push_event(((hour - open) * 60) as f64, EventKind::RosterChange);
            }
        }
        Ok(sim)
    }

    fn push_event(&mut self, time: f64, kind: EventKind) {
        self.heap.push(Event {
            id: self.event_seq,
            time,
            kind,
        });
        self.event_seq += 1;
    }

    /// Puts a customer into service at `now`, drawing its service duration.
    fn assign(&mut self, customer: usize, slot: usize, now: f64, rng: &mut Pcg64) {
        let duration = self.service_dist.sample(rng);
        self.customers[customer].service_start_time = Some(now);
        self.customers[customer].departure_time = Some(now + duration);
        self.desks.occupy(slot);
        self.usage[slot].busy_time += duration;
        self.usage[slot].customers_served += 1;
        self.push_event(now + duration, EventKind::Departure { desk: slot, customer });
    }

    /// Moves waiting customers into service while idle rostered desks remain.
    fn dispatch(&mut self, now: f64, rostered: u32, rng: &mut Pcg64) {
        while !self.queue.is_empty() {
            match self.desks.free_slot(rostered) {
                Some(slot) => {
                    let next = self.queue.pop_front().unwrap();
                    self.assign(next, slot, now, rng);
                }
                None => break,
            }
        }
    }

    fn run(mut self, rng: &mut Pcg64) -> RunOutcome {
        while let Some(event) = self.heap.pop() {
            let now = event.time;
            self.end_time = self.end_time.max(now);
            let rostered = self.scenario.desks_at_time(now);
            match event.kind {
                EventKind::Arrival { customer } => match self.desks.free_slot(rostered) {
                    Some(slot) => self.assign(customer, slot, now, rng),
                    None => self.queue.push_back(customer),
                },
                EventKind::Departure { desk, .. } => {
                    self.desks.release(desk);
                    self.dispatch(now, rostered, rng);
                }
                EventKind::RosterChange => self.dispatch(now, rostered, rng),
            }
            self.series.record(now, self.queue.len(), self.desks.busy_count);
        }
        debug!(
            "scenario '{}': simulated {} customers over {:.1} minutes",
            self.scenario.name,
            self.customers.len(),
            self.end_time
        );
        RunOutcome {
            customers: self.customers,
            series: self.series,
            desks: self.usage,
            end_time: self.end_time,
        }
    }
}

/// Replays the queue against one arrival sequence.
///
/// Events are processed in non-decreasing time order; at equal timestamps
/// departures go first (a freed desk serves a customer arriving at the same
/// instant) and roster changes precede arrivals (the arriving customer sees
/// the new desk count). A customer at the head of the line is assigned a desk
/// the moment one is both idle and rostered for the current hour; service
/// durations are drawn at assignment time from the exponential distribution.
/// Roster shrinks never preempt: a busy slot beyond the reduced count
/// finishes its customer and then goes cold.
///
/// The arrival sequence must be sorted ascending (as produced by
/// [`crate::arrival::generate_arrivals`]). Arrivals near closing are served
/// to completion; the clock never truncates in-flight service. The scenario
/// is re-validated before any event is processed and the simulation never
/// returns partial results.
pub fn simulate_queue(
    scenario: &ScenarioConfig,
    arrivals: &[f64],
    rng: &mut Pcg64,
) -> Result<RunOutcome, SimulationError> {
    scenario.validate()?;
    Ok(QueueSim::new(scenario, arrivals)?.run(rng))
}
