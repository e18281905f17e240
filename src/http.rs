//! REST surface for the telephony layer and the owner's app.
//!
//! The telephony webhook drives `/api/conversation/turn`; when a turn
//! returns `request_sms_otp` the device posts the batch back to
//! `/api/conversation/sms-result`. The order routes expose the ledger to
//! the owner's app.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::conversation::{Action, CallerRole, ConversationEngine, SmsResultRequest, TurnRequest};
use crate::error::TurnError;
use crate::ledger::{OrderLedger, OrderStatus};
use crate::services::{Notification, NotificationDispatcher};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub ledger: Arc<OrderLedger>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    /// Shared secret for `/api` routes; `None` disables the check.
    pub api_key: Option<SecretString>,
}

/// Build the router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/conversation/turn", post(conversation_turn))
        .route("/api/conversation/sms-result", post(sms_result))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/status", post(set_order_status))
        .route("/api/orders/{id}/release", post(release_order_otp))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "call-assist"
    }))
}

// ── Auth ────────────────────────────────────────────────────────────────

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(key) = &state.api_key else {
        return true;
    };
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == key.expose_secret())
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "invalid or missing bearer token"})),
    )
}

// ── Conversation ────────────────────────────────────────────────────────

async fn conversation_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TurnRequest>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let session_id = request.session_id.clone();
    match state.engine.process_turn(request).await {
        Ok(result) => {
            let result = state.engine.try_resolve_sms(&session_id, result).await;
            dispatch_side_effects(&state, &result).await;
            (StatusCode::OK, Json(serde_json::json!(result)))
        }
        Err(TurnError::InvalidRequest(message)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": message})),
        ),
    }
}

async fn sms_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SmsResultRequest>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let result = state.engine.reprocess_sms(request);
    (StatusCode::OK, Json(serde_json::json!(result)))
}

/// Run this turn's side effects: urgent pushes, and the owner summary when
/// an unknown-caller conversation wraps up.
async fn dispatch_side_effects(state: &AppState, result: &crate::conversation::TurnResult) {
    match &result.action {
        Action::UrgentNotification { message } => {
            let notification = Notification::urgent("Urgent call", message.clone());
            if let Err(err) = state.notifier.notify(&notification).await {
                warn!(error = %err, "urgent notification failed");
            }
        }
        _ if result.end_call && result.caller_role == CallerRole::Unknown => {
            let summary = state.engine.summarize(&result.history, &result.facts).await;
            let notification = Notification::new("Missed call handled", summary);
            if let Err(err) = state.notifier.notify(&notification).await {
                warn!(error = %err, "caller summary notification failed");
            }
        }
        _ => {}
    }
}

// ── Orders ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateOrderBody {
    company: String,
    #[serde(default)]
    otp: Option<String>,
    #[serde(default)]
    tracking_id: Option<String>,
}

async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let id = state
        .ledger
        .add(&body.company, body.otp.as_deref(), body.tracking_id.as_deref());
    info!(order_id = %id, company = %body.company, "order created via api");
    (StatusCode::CREATED, Json(serde_json::json!({"id": id})))
}

async fn list_orders(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(serde_json::json!(state.ledger.list())))
}

async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    match state.ledger.get(id) {
        Some(order) => (StatusCode::OK, Json(serde_json::json!(order))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("order {id} not found")})),
        ),
    }
}

#[derive(Deserialize)]
struct SetStatusBody {
    status: OrderStatus,
}

async fn set_order_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<SetStatusBody>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    match state.ledger.set_status(id, body.status) {
        Ok(order) => (StatusCode::OK, Json(serde_json::json!(order))),
        Err(err) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": err.to_string()})),
        ),
    }
}

async fn release_order_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    match state.ledger.release_otp(id) {
        Ok(otp) => (StatusCode::OK, Json(serde_json::json!({"id": id, "otp": otp}))),
        Err(err) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": err.to_string()})),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_check_requires_exact_token() {
        let state = AppState {
            engine: Arc::new(ConversationEngine::new(
                crate::services::Services::offline(),
                Arc::new(OrderLedger::new()),
                "Owner".into(),
            )),
            ledger: Arc::new(OrderLedger::new()),
            notifier: Arc::new(crate::services::notify::LogNotifier),
            api_key: Some(SecretString::from("s3cret")),
        };

        let mut headers = HeaderMap::new();
        assert!(!authorized(&state, &headers));

        headers.insert("authorization", "Bearer wrong".parse().unwrap());
        assert!(!authorized(&state, &headers));

        headers.insert("authorization", "Bearer s3cret".parse().unwrap());
        assert!(authorized(&state, &headers));
    }

    #[test]
    fn missing_key_disables_the_check() {
        let state = AppState {
            engine: Arc::new(ConversationEngine::new(
                crate::services::Services::offline(),
                Arc::new(OrderLedger::new()),
                "Owner".into(),
            )),
            ledger: Arc::new(OrderLedger::new()),
            notifier: Arc::new(crate::services::notify::LogNotifier),
            api_key: None,
        };
        assert!(authorized(&state, &HeaderMap::new()));
    }
}
