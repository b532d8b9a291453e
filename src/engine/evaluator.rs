//! Pure transition rules over a request's two status axes.
//!
//! Everything in here is a total function of the entity's current field
//! values: no I/O, no clock, no store access. The REST layer asks these
//! questions before applying any transition, and list/map code goes through
//! [`phase`] instead of re-deriving combined status at every call site.

use crate::models::request::{AssignmentStatus, CollectionRequest, RequestStatus};

/// Single normalization of the dual-axis status, evaluated in precedence
/// order with first match winning. Collection and cancellation are terminal
/// and outrank every in-progress signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Collected,
    Cancelled,
    InProgress,
    Assigned,
    Expired,
    Available,
    Scheduled,
    /// No rule matched; surface the raw job status unchanged.
    Raw(RequestStatus),
}

impl RequestPhase {
    /// Human-facing label, in the wording the field app shows collectors.
    pub fn label(&self) -> &'static str {
        match self {
            RequestPhase::Collected => "RECOLECTADA",
            RequestPhase::Cancelled => "CANCELADA",
            RequestPhase::InProgress => "EN PROGRESO",
            RequestPhase::Assigned => "ASIGNADA",
            RequestPhase::Expired => "EXPIRADA",
            RequestPhase::Available => "DISPONIBLE",
            RequestPhase::Scheduled => "PROGRAMADO",
            RequestPhase::Raw(status) => status.as_str(),
        }
    }
}

pub fn phase(request: &CollectionRequest) -> RequestPhase {
    let status = request.status;
    let assignment = request.assignment_status();

    if status == RequestStatus::Collected || assignment == AssignmentStatus::Completed {
        RequestPhase::Collected
    } else if status == RequestStatus::Cancelled || assignment == AssignmentStatus::Cancelled {
        RequestPhase::Cancelled
    } else if assignment == AssignmentStatus::InProgress {
        RequestPhase::InProgress
    } else if assignment == AssignmentStatus::Pending {
        RequestPhase::Assigned
    } else if assignment == AssignmentStatus::Expired {
        RequestPhase::Expired
    } else if assignment == AssignmentStatus::Available && status == RequestStatus::Pending {
        RequestPhase::Available
    } else if status == RequestStatus::Scheduled {
        RequestPhase::Scheduled
    } else {
        RequestPhase::Raw(status)
    }
}

pub fn combined_status(request: &CollectionRequest) -> &'static str {
    phase(request).label()
}

/// Claiming is only meaningful on unclaimed, still-open work.
pub fn can_claim(request: &CollectionRequest, collector_id: i64) -> bool {
    request.status == RequestStatus::Pending
        && request.assignment_status() == AssignmentStatus::Available
        && !assigned_to_other(request, collector_id)
}

/// A released assignment must still be an open job.
pub fn can_release(request: &CollectionRequest, collector_id: i64) -> bool {
    request.is_assigned_to(collector_id)
        && matches!(
            request.assignment_status(),
            AssignmentStatus::Pending | AssignmentStatus::InProgress
        )
        && request.status == RequestStatus::Pending
}

pub fn can_complete(request: &CollectionRequest, collector_id: i64) -> bool {
    request.is_assigned_to(collector_id)
        && request.assignment_status() == AssignmentStatus::InProgress
        && request.status == RequestStatus::Pending
}

/// Collectors may still edit or annotate finished and cancelled jobs.
pub fn can_update(request: &CollectionRequest, collector_id: i64) -> bool {
    request.is_assigned_to(collector_id)
        || request.assignment_status() == AssignmentStatus::Completed
        || request.status == RequestStatus::Cancelled
}

pub fn can_cancel(request: &CollectionRequest, collector_id: i64) -> bool {
    (request.is_assigned_to(collector_id)
        || request.assignment_status() == AssignmentStatus::Available)
        && request.status == RequestStatus::Pending
        && request.assignment_status() != AssignmentStatus::Completed
        && request.assignment_status() != AssignmentStatus::Cancelled
}

fn assigned_to_other(request: &CollectionRequest, collector_id: i64) -> bool {
    matches!(request.assigned_collector_id, Some(id) if id != collector_id)
}
