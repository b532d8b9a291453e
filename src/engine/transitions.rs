//! Applies claim/release/complete/cancel/update against the store.
//!
//! Every transition re-checks the evaluator's guard against the request's
//! current fields while holding the store entry, so a stale client sees a
//! conflict instead of clobbering a concurrent claim. Nothing is mutated on a
//! failed guard.

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::evaluator;
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::request::{AssignmentStatus, CollectionRequest, RequestStatus};
use crate::state::AppState;

pub fn claim_request(
    state: &AppState,
    request_id: i64,
    collector_id: i64,
    collector_name: &str,
    timeout_minutes: i64,
) -> Result<Assignment, AppError> {
    check_collector(collector_id)?;
    if collector_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "collector name cannot be empty".to_string(),
        ));
    }
    if timeout_minutes <= 0 {
        return Err(AppError::BadRequest("timeout must be positive".to_string()));
    }

    let assignment = {
        let mut entry = lookup(state, request_id)?;
        let request = entry.value_mut();

        if !evaluator::can_claim(request, collector_id) {
            return Err(rejected(state, "claim", request));
        }

        let now = Utc::now();
        request.assignment_status = Some(AssignmentStatus::Pending);
        request.assigned_collector_id = Some(collector_id);
        request.assigned_collector_name = Some(collector_name.to_string());
        request.assigned_at = Some(now);
        request.assignment_expires_at = Some(now + Duration::minutes(timeout_minutes));
        request.updated_at = Some(now);

        lease_snapshot(request, "Solicitud reclamada".to_string())
    };

    Ok(emit(state, "claim", assignment))
}

/// Collector begins working a claimed request: lease PENDING -> IN_PROGRESS.
pub fn start_request(
    state: &AppState,
    request_id: i64,
    collector_id: i64,
) -> Result<Assignment, AppError> {
    check_collector(collector_id)?;

    let assignment = {
        let mut entry = lookup(state, request_id)?;
        let request = entry.value_mut();

        let startable = request.is_assigned_to(collector_id)
            && request.assignment_status() == AssignmentStatus::Pending
            && request.status == RequestStatus::Pending;
        if !startable {
            return Err(rejected(state, "start", request));
        }

        request.assignment_status = Some(AssignmentStatus::InProgress);
        request.updated_at = Some(Utc::now());

        lease_snapshot(request, "Recolección iniciada".to_string())
    };

    Ok(emit(state, "start", assignment))
}

pub fn release_request(
    state: &AppState,
    request_id: i64,
    collector_id: i64,
) -> Result<Assignment, AppError> {
    check_collector(collector_id)?;

    let assignment = {
        let mut entry = lookup(state, request_id)?;
        let request = entry.value_mut();

        if !evaluator::can_release(request, collector_id) {
            return Err(rejected(state, "release", request));
        }

        clear_lease(request);
        request.updated_at = Some(Utc::now());

        lease_snapshot(request, "Solicitud liberada".to_string())
    };

    Ok(emit(state, "release", assignment))
}

pub fn complete_request(
    state: &AppState,
    request_id: i64,
    collector_id: i64,
) -> Result<Assignment, AppError> {
    check_collector(collector_id)?;

    let assignment = {
        let mut entry = lookup(state, request_id)?;
        let request = entry.value_mut();

        if !evaluator::can_complete(request, collector_id) {
            return Err(rejected(state, "complete", request));
        }

        request.assignment_status = Some(AssignmentStatus::Completed);
        request.status = RequestStatus::Collected;
        request.updated_at = Some(Utc::now());

        lease_snapshot(request, "Recolección completada".to_string())
    };

    Ok(emit(state, "complete", assignment))
}

pub fn cancel_request(
    state: &AppState,
    request_id: i64,
    collector_id: i64,
) -> Result<Assignment, AppError> {
    check_collector(collector_id)?;

    let assignment = {
        let mut entry = lookup(state, request_id)?;
        let request = entry.value_mut();

        if !evaluator::can_cancel(request, collector_id) {
            return Err(rejected(state, "cancel", request));
        }

        request.status = RequestStatus::Cancelled;
        request.assignment_status = Some(AssignmentStatus::Cancelled);
        request.updated_at = Some(Utc::now());

        lease_snapshot(request, "Solicitud cancelada".to_string())
    };

    Ok(emit(state, "cancel", assignment))
}

pub struct UpdateFields {
    pub weight: Option<f64>,
    pub status: Option<RequestStatus>,
    pub notes: Option<String>,
}

pub fn update_request(
    state: &AppState,
    request_id: i64,
    collector_id: i64,
    fields: UpdateFields,
) -> Result<CollectionRequest, AppError> {
    check_collector(collector_id)?;

    let updated = {
        let mut entry = lookup(state, request_id)?;
        let request = entry.value_mut();

        if !evaluator::can_update(request, collector_id) {
            record_outcome(state, "update", "rejected");
            return Err(AppError::Conflict(format!(
                "request {} is not editable by collector {collector_id}",
                request.code
            )));
        }

        // Weight only exists once the job is actually collected.
        let next_status = fields.status.unwrap_or(request.status);
        if fields.weight.is_some() && next_status != RequestStatus::Collected {
            record_outcome(state, "update", "rejected");
            return Err(AppError::BadRequest(
                "weight can only be set on a collected request".to_string(),
            ));
        }
        if let Some(weight) = fields.weight {
            if !weight.is_finite() || weight < 0.0 {
                record_outcome(state, "update", "rejected");
                return Err(AppError::BadRequest(
                    "weight must be non-negative".to_string(),
                ));
            }
            request.weight = Some(weight);
        }
        if let Some(status) = fields.status {
            request.status = status;
        }
        if let Some(notes) = fields.notes {
            request.description = Some(notes);
        }
        request.updated_at = Some(Utc::now());

        request.clone()
    };

    record_outcome(state, "update", "success");
    info!(request_id = updated.id, collector_id, "request updated");
    Ok(updated)
}

fn check_collector(collector_id: i64) -> Result<(), AppError> {
    if collector_id <= 0 {
        return Err(AppError::UnknownCollector(
            "no logged-in collector id supplied".to_string(),
        ));
    }
    Ok(())
}

fn lookup<'a>(
    state: &'a AppState,
    request_id: i64,
) -> Result<dashmap::mapref::one::RefMut<'a, i64, CollectionRequest>, AppError> {
    state
        .requests
        .get_mut(&request_id)
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))
}

fn rejected(state: &AppState, op: &str, request: &CollectionRequest) -> AppError {
    record_outcome(state, op, "rejected");
    AppError::Conflict(format!(
        "request {} is not eligible for {op} (estado: {})",
        request.code,
        evaluator::combined_status(request)
    ))
}

pub(crate) fn clear_lease(request: &mut CollectionRequest) {
    request.assignment_status = Some(AssignmentStatus::Available);
    request.assigned_collector_id = None;
    request.assigned_collector_name = None;
    request.assigned_at = None;
    request.assignment_expires_at = None;
}

pub(crate) fn lease_snapshot(request: &CollectionRequest, message: String) -> Assignment {
    Assignment {
        id: Uuid::new_v4(),
        request_id: request.id,
        request_code: request.code.clone(),
        collector_id: request.assigned_collector_id,
        collector_name: request.assigned_collector_name.clone(),
        assignment_status: request.assignment_status(),
        assigned_at: request.assigned_at,
        expires_at: request.assignment_expires_at,
        message,
    }
}

fn emit(state: &AppState, op: &str, assignment: Assignment) -> Assignment {
    state.record_assignment(assignment.clone());
    record_outcome(state, op, "success");

    info!(
        request_id = assignment.request_id,
        collector_id = assignment.collector_id,
        status = ?assignment.assignment_status,
        "{op} applied"
    );

    assignment
}

fn record_outcome(state: &AppState, op: &str, outcome: &str) {
    state
        .metrics
        .transitions_total
        .with_label_values(&[op, outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::CollectionRequest;
    use chrono::Utc;

    fn seeded_state() -> AppState {
        let state = AppState::new(16, 15);
        let id = state.allocate_request_id();
        let request = CollectionRequest {
            id,
            code: format!("REQ-{id:05}"),
            material: "paper".to_string(),
            description: None,
            status: RequestStatus::Pending,
            assignment_status: Some(AssignmentStatus::Available),
            created_at: Utc::now(),
            updated_at: None,
            weight: None,
            latitude: None,
            longitude: None,
            address: None,
            address_user: None,
            reference: None,
            district: None,
            province: None,
            region: None,
            user_id: 5,
            user_name: None,
            user_lastname: None,
            user_email: None,
            user_phone: None,
            assigned_collector_id: None,
            assigned_collector_name: None,
            assigned_at: None,
            assignment_expires_at: None,
        };
        state.requests.insert(id, request);
        state
    }

    #[test]
    fn claim_grants_a_lease_with_expiry() {
        let state = seeded_state();
        let assignment = claim_request(&state, 1, 7, "Rosa", 15).unwrap();

        assert_eq!(assignment.collector_id, Some(7));
        assert_eq!(assignment.assignment_status, AssignmentStatus::Pending);
        assert!(assignment.expires_at.unwrap() > Utc::now());

        let stored = state.requests.get(&1).unwrap().clone();
        assert_eq!(stored.assigned_collector_id, Some(7));
        assert_eq!(stored.assignment_status(), AssignmentStatus::Pending);
    }

    #[test]
    fn double_claim_conflicts_and_leaves_state_untouched() {
        let state = seeded_state();
        claim_request(&state, 1, 7, "Rosa", 15).unwrap();

        let err = claim_request(&state, 1, 8, "Iván", 15).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = state.requests.get(&1).unwrap().clone();
        assert_eq!(stored.assigned_collector_id, Some(7));
    }

    #[test]
    fn full_claim_start_complete_flow() {
        let state = seeded_state();
        claim_request(&state, 1, 7, "Rosa", 15).unwrap();
        start_request(&state, 1, 7).unwrap();
        let done = complete_request(&state, 1, 7).unwrap();

        assert_eq!(done.assignment_status, AssignmentStatus::Completed);
        let stored = state.requests.get(&1).unwrap().clone();
        assert_eq!(stored.status, RequestStatus::Collected);
    }

    #[test]
    fn complete_requires_in_progress() {
        let state = seeded_state();
        claim_request(&state, 1, 7, "Rosa", 15).unwrap();

        let err = complete_request(&state, 1, 7).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn release_returns_request_to_pool() {
        let state = seeded_state();
        claim_request(&state, 1, 7, "Rosa", 15).unwrap();
        release_request(&state, 1, 7).unwrap();

        let stored = state.requests.get(&1).unwrap().clone();
        assert_eq!(stored.assignment_status(), AssignmentStatus::Available);
        assert!(stored.assigned_collector_id.is_none());
        assert!(stored.assignment_expires_at.is_none());
    }

    #[test]
    fn weight_rejected_unless_collected() {
        let state = seeded_state();
        claim_request(&state, 1, 7, "Rosa", 15).unwrap();

        let err = update_request(
            &state,
            1,
            7,
            UpdateFields {
                weight: Some(3.2),
                status: None,
                notes: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let updated = update_request(
            &state,
            1,
            7,
            UpdateFields {
                weight: Some(3.2),
                status: Some(RequestStatus::Collected),
                notes: Some("bolsas en la puerta".to_string()),
            },
        )
        .unwrap();
        assert_eq!(updated.weight, Some(3.2));
        assert_eq!(updated.status, RequestStatus::Collected);
    }

    #[test]
    fn non_positive_collector_id_is_unidentified() {
        let state = seeded_state();
        let err = claim_request(&state, 1, 0, "Rosa", 15).unwrap_err();
        assert!(matches!(err, AppError::UnknownCollector(_)));
    }

    #[test]
    fn transitions_on_missing_request_return_not_found() {
        let state = seeded_state();
        let err = release_request(&state, 404, 7).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
