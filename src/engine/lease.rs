//! Server-side enforcement of assignment leases.
//!
//! A claim carries an expiry; collectors who never start the job lose it.
//! The sweep is two-stage so the EXPIRADA state stays visible to clients:
//! first the stale claim is marked expired (collector fields retained for
//! display), then after a grace period the request is auto-released back to
//! the open pool.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, info};

use crate::engine::transitions::{clear_lease, lease_snapshot};
use crate::models::request::{AssignmentStatus, RequestStatus};
use crate::state::AppState;

pub async fn run_lease_sweeper(state: Arc<AppState>, sweep_every: TokioDuration, grace: Duration) {
    info!(sweep_secs = sweep_every.as_secs(), "lease sweeper started");

    let mut ticker = interval(sweep_every);
    loop {
        ticker.tick().await;
        let (expired, released) = sweep_once(&state, Utc::now(), grace);
        if expired > 0 || released > 0 {
            info!(expired, released, "lease sweep applied changes");
        } else {
            debug!("lease sweep: nothing to do");
        }
    }
}

/// One pass over the store. Returns (claims newly expired, expired leases
/// auto-released). In-progress work never expires; the collector is on site.
pub fn sweep_once(state: &AppState, now: DateTime<Utc>, grace: Duration) -> (usize, usize) {
    let started = Instant::now();
    let mut expired = 0;
    let mut released = 0;
    let mut events = Vec::new();
    let mut open = 0i64;

    for mut entry in state.requests.iter_mut() {
        let request = entry.value_mut();

        match request.assignment_status() {
            AssignmentStatus::Pending => {
                if matches!(request.assignment_expires_at, Some(deadline) if deadline <= now) {
                    request.assignment_status = Some(AssignmentStatus::Expired);
                    request.updated_at = Some(now);
                    expired += 1;
                    events.push(lease_snapshot(request, "Asignación expirada".to_string()));
                }
            }
            AssignmentStatus::Expired => {
                let release_after = request
                    .assignment_expires_at
                    .map(|deadline| deadline + grace);
                if matches!(release_after, Some(deadline) if deadline <= now) {
                    clear_lease(request);
                    request.updated_at = Some(now);
                    released += 1;
                    events.push(lease_snapshot(
                        request,
                        "Asignación liberada por expiración".to_string(),
                    ));
                }
            }
            _ => {}
        }

        if request.status == RequestStatus::Pending
            && request.assignment_status() == AssignmentStatus::Available
        {
            open += 1;
        }
    }

    for event in events {
        state.record_assignment(event);
    }

    state
        .metrics
        .leases_expired_total
        .inc_by(expired as u64);
    state.metrics.open_pool_size.set(open);
    state
        .metrics
        .lease_sweep_seconds
        .observe(started.elapsed().as_secs_f64());

    (expired, released)
}
