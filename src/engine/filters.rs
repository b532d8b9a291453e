//! List, dashboard and map derivations over a request snapshot.
//!
//! Like the evaluator these are pure functions: the REST layer fetches an
//! immutable snapshot from the store and derives views from it, so no locking
//! is needed beyond the store's own last-write-wins replacement.

use serde::{Deserialize, Serialize};

use crate::engine::evaluator;
use crate::models::request::{AssignmentStatus, CollectionRequest, RequestStatus};

/// The three collector-facing list tabs. Disjoint by construction: a request
/// in the open pool is never simultaneously one of the actor's active
/// assignments, and collected work is excluded from both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestView {
    OpenPool,
    MyAssignments,
    Collected,
}

pub fn apply_view(
    requests: &[CollectionRequest],
    view: RequestView,
    collector_id: i64,
) -> Vec<CollectionRequest> {
    match view {
        RequestView::OpenPool => open_pool(requests, collector_id),
        RequestView::MyAssignments => my_assignments(requests, collector_id),
        RequestView::Collected => collected(requests),
    }
}

/// Unclaimed open work, newest first.
pub fn open_pool(requests: &[CollectionRequest], collector_id: i64) -> Vec<CollectionRequest> {
    let mut pool: Vec<CollectionRequest> = requests
        .iter()
        .filter(|req| {
            req.status == RequestStatus::Pending
                && req.assignment_status() == AssignmentStatus::Available
                && !req.is_assigned_to(collector_id)
        })
        .cloned()
        .collect();
    pool.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    pool
}

/// The actor's live leases, most recently claimed first.
pub fn my_assignments(requests: &[CollectionRequest], collector_id: i64) -> Vec<CollectionRequest> {
    let mut mine: Vec<CollectionRequest> = requests
        .iter()
        .filter(|req| {
            req.is_assigned_to(collector_id)
                && matches!(
                    req.assignment_status(),
                    AssignmentStatus::Pending | AssignmentStatus::InProgress
                )
                && req.status == RequestStatus::Pending
        })
        .cloned()
        .collect();
    mine.sort_by(|a, b| {
        let a_key = a.assigned_at.unwrap_or(a.created_at);
        let b_key = b.assigned_at.unwrap_or(b.created_at);
        b_key.cmp(&a_key)
    });
    mine
}

/// Finished work, most recently touched first. Cancelled jobs are excluded
/// even when their assignment axis reads completed.
pub fn collected(requests: &[CollectionRequest]) -> Vec<CollectionRequest> {
    let mut done: Vec<CollectionRequest> = requests
        .iter()
        .filter(|req| {
            (req.status == RequestStatus::Collected
                || req.assignment_status() == AssignmentStatus::Completed)
                && req.status != RequestStatus::Cancelled
        })
        .cloned()
        .collect();
    done.sort_by(|a, b| {
        let a_key = a.updated_at.unwrap_or(a.created_at);
        let b_key = b.updated_at.unwrap_or(b.created_at);
        b_key.cmp(&a_key)
    });
    done
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_requests: usize,
    pub pending_requests: usize,
    pub collected_requests: usize,
    pub next_pending: Option<CollectionRequest>,
}

pub fn dashboard_stats(requests: &[CollectionRequest]) -> DashboardStats {
    DashboardStats {
        total_requests: requests.len(),
        pending_requests: requests
            .iter()
            .filter(|req| req.status == RequestStatus::Pending)
            .count(),
        collected_requests: requests
            .iter()
            .filter(|req| req.status == RequestStatus::Collected)
            .count(),
        next_pending: next_pending(requests).cloned(),
    }
}

/// Oldest still-pending request, shown on the dashboard as the suggested
/// next stop. Oldest-first keeps the pick stable across snapshots.
pub fn next_pending(requests: &[CollectionRequest]) -> Option<&CollectionRequest> {
    requests
        .iter()
        .filter(|req| req.status == RequestStatus::Pending)
        .min_by_key(|req| req.created_at)
}

/// Map pin classification. Green for finished work, blue for the viewing
/// collector's own claims, orange for everything still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerClass {
    Collected,
    Mine,
    Open,
}

pub fn marker_class(request: &CollectionRequest, collector_id: i64) -> MarkerClass {
    match evaluator::phase(request) {
        evaluator::RequestPhase::Collected => MarkerClass::Collected,
        _ if request.is_assigned_to(collector_id) => MarkerClass::Mine,
        _ => MarkerClass::Open,
    }
}

/// Case-insensitive term match over the fields collectors search by.
pub fn matches_term(request: &CollectionRequest, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.is_empty() {
        return true;
    }

    let haystacks = [
        Some(request.code.as_str()),
        Some(request.material.as_str()),
        request.description.as_deref(),
        request.address.as_deref(),
        request.address_user.as_deref(),
        request.district.as_deref(),
    ];
    haystacks
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
}
