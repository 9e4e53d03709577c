//! HTTP handler receiving results from the workflow engine.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::callbacks::{CallbackAck, CallbackRequest, NormalizedCallback},
    errors::Result,
    notifications,
};

/// Receive a computation result.
#[utoipa::path(
    post,
    path = "/callback",
    tag = "callbacks",
    summary = "Deliver result",
    description = "Store the result for a correlation id. The estimate may be sent under any of several \
    field names (`totalEstimate`, `total_estimate`, `Total Estimate $`, `Total Estimate`, `totalCost`, `estimate`); \
    the first one present wins. A second delivery for the same id replaces the first.",
    request_body = CallbackRequest,
    responses(
        (status = 200, description = "Result stored", body = CallbackAck),
        (status = 400, description = "Missing callbackId, malformed body, or success without a numeric estimate"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Internal server error"),
    )
)]
#[instrument(skip_all)]
pub async fn receive_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let Json(body) = body?;
    let callback = NormalizedCallback::from_json(body)?;

    info!(
        callback_id = %callback.callback_id,
        status = %callback.entry.status,
        "Received callback"
    );

    state.store.put(callback.callback_id.clone(), callback.entry.clone()).await?;
    metrics::counter!("cbrelay_callbacks_received_total", "status" => callback.entry.status.as_str()).increment(1);

    if state.config.notifications.html_enabled && notifications::prefers_html(&headers) {
        let page = notifications::render_callback_received(&callback.callback_id, &callback.entry)?;
        return Ok(Html(page).into_response());
    }

    Ok(Json(callback.ack()).into_response())
}
