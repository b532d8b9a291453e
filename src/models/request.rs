use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Job lifecycle axis, owned by the requester side of the system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Collected,
    Scheduled,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Collected => "COLLECTED",
            RequestStatus::Scheduled => "SCHEDULED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Assignment lifecycle axis, owned by the collector/lease side.
///
/// Absent on the wire for requests that predate assignments; readers must go
/// through [`CollectionRequest::assignment_status`] which defaults to
/// `Available`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Available,
    Pending,
    InProgress,
    Completed,
    Expired,
    Cancelled,
}

/// One waste pick-up job. The two status axes are independent; any code that
/// needs a single answer must derive it through the evaluator instead of
/// reading either axis alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub id: i64,
    pub code: String,
    pub material: String,
    pub description: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub assignment_status: Option<AssignmentStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub weight: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub address_user: Option<String>,
    pub reference: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
    pub region: Option<String>,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub user_lastname: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub assigned_collector_id: Option<i64>,
    pub assigned_collector_name: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignment_expires_at: Option<DateTime<Utc>>,
}

impl CollectionRequest {
    /// The assignment axis with the documented default applied.
    pub fn assignment_status(&self) -> AssignmentStatus {
        self.assignment_status.unwrap_or(AssignmentStatus::Available)
    }

    pub fn is_assigned_to(&self, collector_id: i64) -> bool {
        self.assigned_collector_id == Some(collector_id)
    }

    pub fn has_valid_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }

    /// Requester display name, falling back to an anonymous handle.
    pub fn requester_name(&self) -> String {
        match (self.user_name.as_deref(), self.user_lastname.as_deref()) {
            (Some(name), Some(lastname)) if !name.is_empty() && !lastname.is_empty() => {
                format!("{name} {lastname}")
            }
            (Some(name), _) if !name.is_empty() => name.to_string(),
            _ => format!("Usuario #{}", self.user_id),
        }
    }

    /// Most specific address line available, trimmed for list rows.
    pub fn short_address(&self) -> String {
        let line = self
            .address_user
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.address.as_deref().filter(|s| !s.is_empty()))
            .or_else(|| self.district.as_deref().filter(|s| !s.is_empty()));

        match line {
            Some(line) if line.chars().count() > 50 => {
                let head: String = line.chars().take(47).collect();
                format!("{head}...")
            }
            Some(line) => line.to_string(),
            None => "Ubicación no disponible".to_string(),
        }
    }
}
