use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::contact_call::extract_contact_call;
use crate::error::ApiError;
use crate::metrics::{THROTTLE_ADMITTED, THROTTLE_DENIED, THROTTLE_KEYS};
use crate::models::{ChatContactRequest, ContactEmail, ContactRequest, ContactSource, DispatchJob};
use crate::rate_limit::{client_fingerprint, client_key};
use crate::state::AppState;

// Contact form submission
pub async fn contact_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    admit(&state, &headers)?;

    let req: ContactRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidPayload(format!("malformed contact request: {e}")))?;

    dispatch(&state, req, ContactSource::Form).await
}

// Contact block produced by the chat assistant
pub async fn chat_contact_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    admit(&state, &headers)?;

    let ChatContactRequest { reply } = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidPayload(format!("malformed chat contact request: {e}")))?;
    let req = extract_contact_call(&reply).ok_or_else(|| {
        ApiError::InvalidPayload("reply contains no contact block".to_string())
    })?;

    dispatch(&state, req, ContactSource::Chat).await
}

// Throttle check, runs before anything else touches the request
fn admit(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let key = client_key(headers);
    let decision = state.throttle.check_admission(&key);
    THROTTLE_KEYS.set(state.throttle.tracked_keys() as f64);

    if !decision.allowed {
        THROTTLE_DENIED.inc();
        info!(client = %client_fingerprint(&key), "notification attempt rate limited");
        return Err(ApiError::RateLimited {
            retry_after: decision.retry_after,
        });
    }

    THROTTLE_ADMITTED.inc();
    Ok(())
}

async fn dispatch(
    state: &AppState,
    req: ContactRequest,
    source: ContactSource,
) -> Result<Json<Value>, ApiError> {
    let req = req.validated().map_err(ApiError::InvalidPayload)?;
    let email = ContactEmail::from_request(&req, source);

    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .dispatch_tx
        .send(DispatchJob { email, reply_tx })
        .await
        .map_err(|_| {
            warn!("dispatch queue closed");
            ApiError::Unavailable
        })?;

    // wait for the worker to report the send
    reply_rx.await.map_err(|_| ApiError::Unavailable)??;

    info!(source = source.as_str(), "contact message delivered");
    Ok(Json(json!({ "status": "sent" })))
}
