//! Webhook endpoint.
//!
//! `POST /webhook` answers pings, rejects other event types, verifies the
//! signature, parses the push payload and dispatches a build job. The job is
//! never awaited here.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use buildhook_config::WebhookAuth;
use buildhook_core::event::EVENT_HEADER;
use buildhook_core::signature::{self, SIGNATURE_HEADER};
use buildhook_core::{EventKind, PushEvent};
use serde_json::json;
use tracing::{error, info, warn};

use crate::AppState;
use crate::error::ApiError;

/// Largest delivery GitHub sends.
pub const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/webhook",
        post(receive).layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES)),
    )
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    match EventKind::classify(header(&headers, EVENT_HEADER), &state.settings.trigger_event) {
        EventKind::Ping => {
            info!("Ping event received - webhook is configured correctly");
            return Ok((StatusCode::OK, "Pong!").into_response());
        }
        EventKind::Unsupported(event) => {
            warn!(event = %event, "Unsupported event type");
            return Err(ApiError::BadRequest("unsupported event type".to_string()));
        }
        EventKind::Trigger => {}
    }

    let body = body.map_err(|e| {
        error!(error = %e, "Failed to read request body");
        ApiError::Internal("failed to read request body".to_string())
    })?;

    if let WebhookAuth::Secret(secret) = &state.settings.auth {
        signature::check(&body, header(&headers, SIGNATURE_HEADER), secret).map_err(|e| {
            warn!(error = %e, "Rejected webhook delivery");
            ApiError::from(e)
        })?;
    }

    let event = PushEvent::from_payload(&body).map_err(|e| {
        warn!(error = %e, "Invalid push payload");
        ApiError::from(e)
    })?;

    info!(commit = %event.short_ref(), "Received push event");

    let (job_id, _handle) = state.dispatcher.dispatch(event);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "job_id": job_id.to_string(),
        })),
    )
        .into_response())
}
