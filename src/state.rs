use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::assignment::Assignment;
use crate::models::request::CollectionRequest;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub requests: DashMap<i64, CollectionRequest>,
    pub assignments: DashMap<Uuid, Assignment>,
    pub assignment_events_tx: broadcast::Sender<Assignment>,
    pub metrics: Metrics,
    pub default_claim_timeout_minutes: i64,
    next_request_id: AtomicI64,
}

impl AppState {
    pub fn new(event_buffer_size: usize, default_claim_timeout_minutes: i64) -> Self {
        let (assignment_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            requests: DashMap::new(),
            assignments: DashMap::new(),
            assignment_events_tx,
            metrics: Metrics::new(),
            default_claim_timeout_minutes,
            next_request_id: AtomicI64::new(1),
        }
    }

    pub fn allocate_request_id(&self) -> i64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Immutable snapshot of all requests; view derivation works on this
    /// instead of holding shard locks.
    pub fn snapshot(&self) -> Vec<CollectionRequest> {
        self.requests
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn record_assignment(&self, assignment: Assignment) {
        self.assignments.insert(assignment.id, assignment.clone());
        let _ = self.assignment_events_tx.send(assignment);
    }
}
