use crate::call_flow::{self, WebhookKind};
use crate::db_types::CallRecord;
use crate::error::{handle_error, ApiError};
use crate::store::DEFAULT_LIST_LIMIT;
use crate::twilio_types::{render_twiml, WebhookParams};
use crate::types::{AppState, ListQuery};
use crate::utils::twiml_response;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Shared path for all four Twilio voice webhooks: validate, decide, record, answer.
///
/// A failed record merge is logged and otherwise ignored so that Twilio always gets
/// instructions for the caller.
async fn handle_webhook(
    kind: WebhookKind,
    app_state: &AppState,
    body: &str,
) -> Result<Response, ApiError> {
    trace!(body=%body, kind=?kind, "webhook request body");
    let params = WebhookParams::from_form(body).map_err(|e| {
        error!(error=%e, "failed to deserialize Twilio webhook payload");
        ApiError::BadRequest {
            details: vec![format!("body could not be decoded: {e}")],
        }
    })?;

    let missing = params.missing(kind.required_params());
    if !missing.is_empty() {
        warn!(kind=?kind, missing=?missing, "Twilio webhook missing required parameters");
        return Err(ApiError::BadRequest {
            details: missing
                .into_iter()
                .map(|key| format!("body must have required property {key}"))
                .collect(),
        });
    }

    let outcome = call_flow::dispatch(kind, &params, &app_state.flow);
    if let Some(merge) = outcome.merge {
        match app_state.store.upsert(&merge.call_id, merge.update).await {
            Ok(record) => debug!(
                call_sid=%record.call_id,
                workflow=%record.workflow_type,
                status=%record.status,
                "merged call record"
            ),
            Err(e) => {
                error!(call_sid=%merge.call_id, "failed to record call activity; answering anyway");
                handle_error(e).await;
            }
        }
    }

    if let Some(dial) = outcome.response.dial() {
        info!(number=%dial.number, "bridging caller to forwarding number");
    }
    let twiml = render_twiml(&outcome.response);
    trace!("twiml: '{}'", twiml);
    Ok(twiml_response(twiml).into_response())
}

pub async fn voice(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> Result<Response, ApiError> {
    handle_webhook(WebhookKind::Ring, &app_state, &body).await
}

pub async fn voice_handle(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> Result<Response, ApiError> {
    handle_webhook(WebhookKind::MenuSelection, &app_state, &body).await
}

pub async fn dial_action(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> Result<Response, ApiError> {
    handle_webhook(WebhookKind::DialOutcome, &app_state, &body).await
}

pub async fn voicemail(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> Result<Response, ApiError> {
    handle_webhook(WebhookKind::VoicemailCaptured, &app_state, &body).await
}

pub async fn list_calls(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CallRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let calls = app_state.store.list(limit).await?;
    Ok(Json(calls))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
