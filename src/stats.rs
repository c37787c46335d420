//! Dispatch statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-core dispatch counters
pub struct DispatchStats {
    pub events_received: AtomicU64,
    pub malformed_payloads: AtomicU64,
    pub illegal_events: AtomicU64,
    pub transitions_applied: AtomicU64,
    pub reactor_failures: AtomicU64,
    pub replies_sent: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            malformed_payloads: AtomicU64::new(0),
            illegal_events: AtomicU64::new(0),
            transitions_applied: AtomicU64::new(0),
            reactor_failures: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            illegal_events: self.illegal_events.load(Ordering::Relaxed),
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            reactor_failures: self.reactor_failures.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct DispatchStatsSnapshot {
    pub events_received: u64,
    pub malformed_payloads: u64,
    pub illegal_events: u64,
    pub transitions_applied: u64,
    pub reactor_failures: u64,
    pub replies_sent: u64,
}
