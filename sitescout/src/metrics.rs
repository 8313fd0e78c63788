use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle of one fetch+match task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Fetching,
    Matching,
    Completed,
}

/// Tracks dispatcher progress and concurrency
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    // Throughput
    dispatched: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    matched: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,

    // Gauges
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    fetching: Arc<AtomicUsize>,
    matching: Arc<AtomicUsize>,
}

impl DispatchMetrics {
    /// Creates a new DispatchMetrics instance
    pub fn new() -> Self {
        Self {
            dispatched: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            matched: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            fetching: Arc::new(AtomicUsize::new(0)),
            matching: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Records a task that obtained a concurrency token and was spawned
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let mut peak = self.peak_in_flight.load(Ordering::SeqCst);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
        debug!("Task dispatched, {} in flight", current);
    }

    /// Records a task moving from one state to the next
    pub fn record_transition(&self, from: TaskState, to: TaskState) {
        match from {
            TaskState::Fetching => {
                self.fetching.fetch_sub(1, Ordering::SeqCst);
            }
            TaskState::Matching => {
                self.matching.fetch_sub(1, Ordering::SeqCst);
            }
            TaskState::Queued | TaskState::Completed => {}
        }
        match to {
            TaskState::Fetching => {
                self.fetching.fetch_add(1, Ordering::SeqCst);
            }
            TaskState::Matching => {
                self.matching.fetch_add(1, Ordering::SeqCst);
            }
            TaskState::Queued | TaskState::Completed => {}
        }
    }

    /// Records a task whose outcome has been delivered and whose token is released
    pub fn record_completion(&self, matched: bool, failed: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        } else if matched {
            self.matched.fetch_add(1, Ordering::Relaxed);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Gets a snapshot of all counters
    pub fn get_stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            fetching: self.fetching.load(Ordering::SeqCst),
            matching: self.matching.load(Ordering::SeqCst),
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Dispatch stats:\n\
             Dispatched/completed: {}/{}\n\
             Matched/failed: {}/{}\n\
             In flight (peak): {} ({})",
            stats.dispatched,
            stats.completed,
            stats.matched,
            stats.failed,
            stats.in_flight,
            stats.peak_in_flight
        );
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the dispatcher counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: usize,
    pub completed: usize,
    pub matched: usize,
    pub failed: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub fetching: usize,
    pub matching: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_and_peak_tracking() {
        let metrics = DispatchMetrics::new();

        metrics.record_dispatch();
        metrics.record_dispatch();
        metrics.record_dispatch();
        let stats = metrics.get_stats();
        assert_eq!(stats.in_flight, 3);
        assert_eq!(stats.peak_in_flight, 3);

        metrics.record_completion(true, false);
        metrics.record_completion(false, true);
        let stats = metrics.get_stats();
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.peak_in_flight, 3); // Peak should remain unchanged
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_state_gauges() {
        let metrics = DispatchMetrics::new();

        metrics.record_transition(TaskState::Queued, TaskState::Fetching);
        metrics.record_transition(TaskState::Queued, TaskState::Fetching);
        assert_eq!(metrics.get_stats().fetching, 2);

        metrics.record_transition(TaskState::Fetching, TaskState::Matching);
        let stats = metrics.get_stats();
        assert_eq!(stats.fetching, 1);
        assert_eq!(stats.matching, 1);

        // A failed fetch skips matching entirely
        metrics.record_transition(TaskState::Fetching, TaskState::Completed);
        metrics.record_transition(TaskState::Matching, TaskState::Completed);
        let stats = metrics.get_stats();
        assert_eq!(stats.fetching, 0);
        assert_eq!(stats.matching, 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = DispatchMetrics::new();
        let clone = metrics.clone();

        clone.record_dispatch();
        assert_eq!(metrics.get_stats().dispatched, 1);
    }
}
