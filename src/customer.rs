//! Per-arrival customer records.

/// A customer passing through the counter during one simulation run.
///
/// Timestamps are minutes from opening. `service_start_time` and
/// `departure_time` are resolved by the simulator before the run completes;
/// the derived accessors assume a resolved record.
#[derive(Clone, Copy, Debug)]
pub struct Customer {
    pub id: usize,
    pub arrival_time: f64,
    pub service_start_time: Option<f64>,
    pub departure_time: Option<f64>,
}

impl Customer {
    pub fn new(id: usize, arrival_time: f64) -> Self {
        Self {
            id,
            arrival_time,
            service_start_time: None,
            departure_time: None,
        }
    }

    /// Time spent waiting in line, in minutes.
    pub fn wait_time(&self) -> f64 {
        self.service_start_time.unwrap() - self.arrival_time
    }

    /// Time spent being served, in minutes.
    pub fn service_time(&self) -> f64 {
        self.departure_time.unwrap() - self.service_start_time.unwrap()
    }

    /// Total time in the system, in minutes.
    pub fn total_time(&self) -> f64 {
        self.departure_time.unwrap() - self.arrival_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_durations() {
        let mut c = Customer::new(0, 10.);
        c.service_start_time = Some(14.);
        c.departure_time = Some(20.5);
        assert_eq!(c.wait_time(), 4.);
        assert_eq!(c.service_time(), 6.5);
        assert_eq!(c.total_time(), 10.5);
    }
}
