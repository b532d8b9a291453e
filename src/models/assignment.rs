use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::AssignmentStatus;

/// Snapshot of a lease granted (or changed) on a request. This is what the
/// transition endpoints return and what the event stream broadcasts; the
/// request record itself stays the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub request_id: i64,
    pub request_code: String,
    pub collector_id: Option<i64>,
    pub collector_name: Option<String>,
    pub assignment_status: AssignmentStatus,
    pub assigned_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub message: String,
}
