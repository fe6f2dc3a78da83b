use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by a pipeline and the tasks of its connections.
#[derive(Default)]
pub(crate) struct PipelineMetrics {
    pub queries_sent: AtomicU64,
    pub responses_received: AtomicU64,
    pub errors: AtomicU64,
    pub timeouts: AtomicU64,
    pub stale_responses: AtomicU64,
    pub connects: AtomicU64,
    pub connect_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, generation: u64, in_flight: usize) -> PipelineStats {
        PipelineStats {
            queries_sent: self.queries_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            stale_responses: self.stale_responses.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            generation,
            in_flight,
        }
    }
}

/// Point-in-time view of a pipeline's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Frames written to a connection.
    pub queries_sent: u64,
    /// Responses handed to their waiting query.
    pub responses_received: u64,
    /// Queries failed by anything other than their deadline.
    pub errors: u64,
    pub timeouts: u64,
    /// Responses that matched no waiting query, or arrived after its deadline.
    pub stale_responses: u64,
    pub connects: u64,
    pub connect_failures: u64,
    /// Generation of the most recent connection; 0 before the first connect.
    pub generation: u64,
    pub in_flight: usize,
}
