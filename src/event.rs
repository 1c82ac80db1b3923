//! Simulation events and their processing order.

use std::cmp::Ordering;

/// What happens at an event instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    /// A desk finishes serving a customer and goes idle.
    Departure { desk: usize, customer: usize },
    /// The rostered desk count changes at an hour boundary.
    RosterChange,
    /// A customer joins the system.
    Arrival { customer: usize },
}

impl EventKind {
    /// Processing rank at equal timestamps: departures first, so a freed desk
    /// is available to a customer arriving at the same instant; roster changes
    /// next, so the arriving customer sees the new desk count.
    fn rank(&self) -> u8 {
        match self {
            EventKind::Departure { .. } => 0,
            EventKind::RosterChange => 1,
            EventKind::Arrival { .. } => 2,
        }
    }
}

/// An event on the simulation heap.
///
/// The ordering is reversed so that `BinaryHeap` pops the earliest event;
/// ties break by [`EventKind::rank`], then by insertion order for determinism.
#[derive(Clone, Debug)]
pub struct Event {
    pub id: u64,
    pub time: f64,
    pub kind: EventKind,
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.kind.rank().cmp(&self.kind.rank()))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
