//! HTTP handlers for polling stored results.
//!
//! Absence is an expected transient state: an unknown or expired id answers
//! `200 {"status": "pending"}`, never 404.

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::Json,
};
use tracing::{debug, instrument};

use crate::{
    AppState,
    api::models::results::{PollResponse, PollStatus, ResultQuery},
    errors::{Error, Result},
    types::CorrelationId,
};

/// Poll for a result by query parameter.
#[utoipa::path(
    get,
    path = "/result",
    tag = "results",
    summary = "Poll result",
    description = "Look up the result for a correlation id. Unknown and expired ids both report `pending`.",
    params(ResultQuery),
    responses(
        (status = 200, description = "Pending or completed", body = PollResponse),
        (status = 400, description = "Missing callbackId"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Internal server error"),
    )
)]
#[instrument(skip_all)]
pub async fn poll_result(
    State(state): State<AppState>,
    query: std::result::Result<Query<ResultQuery>, QueryRejection>,
) -> Result<Json<PollResponse>> {
    let Query(query) = query.map_err(|rejection| Error::BadRequest {
        message: rejection.body_text(),
    })?;

    let raw = query.into_callback_id().ok_or_else(|| Error::BadRequest {
        message: "callbackId query parameter is required".to_string(),
    })?;

    poll(&state, &raw).await
}

/// Poll for a result by path segment.
#[utoipa::path(
    get,
    path = "/status/{callbackId}",
    tag = "results",
    summary = "Poll result by path",
    description = "Same as `GET /result`, with the correlation id in the path.",
    params(
        ("callbackId" = String, Path, description = "Correlation id"),
    ),
    responses(
        (status = 200, description = "Pending or completed", body = PollResponse),
        (status = 400, description = "Blank callbackId"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Internal server error"),
    )
)]
#[instrument(skip_all)]
pub async fn poll_status(State(state): State<AppState>, Path(callback_id): Path<String>) -> Result<Json<PollResponse>> {
    poll(&state, &callback_id).await
}

async fn poll(state: &AppState, raw: &str) -> Result<Json<PollResponse>> {
    let callback_id = CorrelationId::parse(raw)?;
    let response = PollResponse::from(state.store.get(&callback_id).await?);

    debug!(callback_id = %callback_id, status = ?response.status, "Polled result");
    let outcome = match response.status {
        PollStatus::Pending => "pending",
        PollStatus::Completed => "completed",
    };
    metrics::counter!("cbrelay_polls_total", "outcome" => outcome).increment(1);

    Ok(Json(response))
}
