use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::evaluator;
use crate::models::assignment::Assignment;
use crate::state::AppState;

/// Wire envelope for the event stream: the lease change plus the request's
/// combined status as it now stands, so list screens can repaint the row
/// without a follow-up fetch. The label is absent if the request has
/// meanwhile disappeared from the store.
#[derive(Serialize)]
struct LeaseEvent {
    status_label: Option<&'static str>,
    #[serde(flatten)]
    assignment: Assignment,
}

fn lease_event(state: &AppState, assignment: Assignment) -> LeaseEvent {
    let status_label = state
        .requests
        .get(&assignment.request_id)
        .map(|entry| evaluator::combined_status(entry.value()));

    LeaseEvent {
        status_label,
        assignment,
    }
}

/// Streams every assignment lease change to connected field clients so list
/// screens can refresh without polling.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.assignment_events_tx.subscribe();

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Ok(assignment) = rx.recv().await {
            let event = lease_event(&state, assignment);
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize lease event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::transitions;
    use crate::models::request::{AssignmentStatus, CollectionRequest, RequestStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn seeded_state() -> AppState {
        let state = AppState::new(16, 15);
        let id = state.allocate_request_id();
        let request = CollectionRequest {
            id,
            code: format!("REQ-{id:05}"),
            material: "plastic".to_string(),
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
    fn lease_event_carries_current_status_label() {
        let state = seeded_state();
        let assignment = transitions::claim_request(&state, 1, 7, "Rosa", 15).unwrap();

        let event = lease_event(&state, assignment);
        assert_eq!(event.status_label, Some("ASIGNADA"));

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["status_label"], "ASIGNADA");
        assert_eq!(json["request_code"], "REQ-00001");
        assert_eq!(json["collector_id"], 7);
    }

    #[test]
    fn lease_event_for_vanished_request_has_no_label() {
        let state = seeded_state();
        let assignment = Assignment {
            id: Uuid::new_v4(),
            request_id: 99,
            request_code: "REQ-00099".to_string(),
            collector_id: Some(7),
            collector_name: Some("Rosa".to_string()),
            assignment_status: AssignmentStatus::Pending,
            assigned_at: Some(Utc::now()),
            expires_at: None,
            message: "Solicitud reclamada".to_string(),
        };

        let event = lease_event(&state, assignment);
        assert!(event.status_label.is_none());
    }
}
