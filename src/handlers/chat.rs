use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::{RATE_LIMITED, REQUEST_LATENCY, REQUEST_TOTAL, UPSTREAM_ERRORS};
use crate::models::{ChatMessage, ChatRequest, CompletionRequest};
use crate::rate_limit::Decision;
use crate::state::AppState;

// Best-effort bucket key for throttling: first forwarded address, else
// the peer address, else a shared "unknown" bucket. Spoofable by header,
// not a security boundary.
fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

// Pull the assistant reply out of an upstream completion body
fn reply_text(body: &Value) -> Option<&str> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

// Conversation sent upstream: fixed system prompt first, unless the
// widget already supplied one
fn outbound_messages(system_prompt: &str, incoming: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(incoming.len() + 1);
    if incoming.first().map(|m| m.role != "system").unwrap_or(true) {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
    }
    messages.extend_from_slice(incoming);
    messages
}

// POST /api/chat handler
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Response {
    REQUEST_TOTAL.inc();

    if payload.messages.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid messages format" })),
        )
            .into_response();
    }

    // Admission check sits right in front of the upstream call. A reject
    // short-circuits: no upstream call, no log write.
    let identity = client_identity(&headers, Some(peer));
    if let Decision::Reject { minutes_remaining } =
        state.limiter.check_and_record(&identity, Instant::now())
    {
        RATE_LIMITED.inc();
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": format!(
                    "Request rate too high, please retry in {} minutes.",
                    minutes_remaining
                )
            })),
        )
            .into_response();
    }

    let messages = outbound_messages(&state.system_prompt, &payload.messages);

    let start_time = Instant::now();
    let result = state
        .client
        .post(format!("{}/chat/completions", state.upstream_url))
        .bearer_auth(&state.api_key)
        .json(&CompletionRequest {
            model: &state.model,
            messages: &messages,
            temperature: state.temperature,
            max_tokens: state.max_tokens,
        })
        .send()
        .await;

    let upstream = match result {
        Ok(res) => res,
        Err(e) => {
            UPSTREAM_ERRORS.inc();
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Upstream request failed",
                    "message": e.to_string()
                })),
            )
                .into_response();
        }
    };

    let status = upstream.status();
    let body: Value = match upstream.json().await {
        Ok(body) => body,
        Err(e) => {
            UPSTREAM_ERRORS.inc();
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Upstream returned an unreadable body",
                    "message": e.to_string()
                })),
            )
                .into_response();
        }
    };
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    // Forward upstream error bodies to the widget for debuggability
    if !status.is_success() {
        UPSTREAM_ERRORS.inc();
        let status =
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return (status, Json(body)).into_response();
    }

    if let Some(sink) = &state.log_sink {
        let prompt = payload
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let reply = reply_text(&body).unwrap_or_default();
        sink.record(payload.session_id.as_deref(), prompt, reply);
    }

    (StatusCode::OK, Json(body)).into_response()
}
