use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::warn;

use crate::error::ApiError;
use crate::metrics::{CHAT_REQUESTS, RELAY_FIRST_TOKEN_LATENCY};
use crate::models::ChatRequest;
use crate::relay::RelayError;
use crate::state::AppState;

// Relays one chat turn and streams the reply back as plain text
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    CHAT_REQUESTS.inc();

    let payload: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidPayload(format!("malformed chat request: {e}")))?;
    payload.validate().map_err(ApiError::InvalidPayload)?;

    let start_time = Instant::now();
    let mut tokens = state.chat.stream_reply(payload.messages);

    // failures before the first token still get a proper error status
    let first = match timeout(state.first_token_timeout, tokens.next()).await {
        Ok(Some(Ok(token))) => token,
        Ok(Some(Err(e))) => {
            warn!(error = %e, "chat relay failed before first token");
            return Err(e.into());
        }
        Ok(None) => String::new(),
        Err(_) => {
            let e = RelayError::FirstTokenTimeout(state.first_token_timeout);
            warn!(error = %e, "chat relay timed out");
            return Err(e.into());
        }
    };
    RELAY_FIRST_TOKEN_LATENCY.observe(start_time.elapsed().as_secs_f64());

    let rest = tokens.inspect_err(|e| warn!(error = %e, "chat relay failed mid-stream"));
    let body = Body::from_stream(stream::once(async move { Ok(first) }).chain(rest));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
