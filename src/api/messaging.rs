// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};

use crate::{
    error::ApiError,
    models::{ErrorResponse, HistoryRequest, HistoryResponse, SendRequest, SendResponse},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/api/messaging/send",
    request_body = SendRequest,
    tag = "Messaging",
    responses(
        (status = 200, body = SendResponse),
        (status = 400, description = "Malformed request or contact", body = ErrorResponse),
        (status = 403, description = "Attachment inside key storage", body = ErrorResponse),
        (status = 404, description = "Attachment not found", body = ErrorResponse),
        (status = 502, description = "Transport failure", body = ErrorResponse)
    )
)]
pub async fn send(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state.relay.send(&request).await?;
    Ok(Json(SendResponse::ok()))
}

#[utoipa::path(
    get,
    path = "/api/messaging/history",
    params(HistoryRequest),
    tag = "Messaging",
    responses(
        (status = 200, body = HistoryResponse),
        (status = 400, description = "Malformed contact", body = ErrorResponse),
        (status = 404, description = "No history for contact", body = ErrorResponse)
    )
)]
pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryRequest>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    read_history(&state, &request)
}

#[utoipa::path(
    post,
    path = "/api/messaging/history",
    request_body = HistoryRequest,
    tag = "Messaging",
    responses(
        (status = 200, body = HistoryResponse),
        (status = 400, description = "Malformed contact", body = ErrorResponse),
        (status = 404, description = "No history for contact", body = ErrorResponse)
    )
)]
pub async fn history_post(
    State(state): State<AppState>,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    read_history(&state, &request)
}

fn read_history(
    state: &AppState,
    request: &HistoryRequest,
) -> Result<Json<HistoryResponse>, ApiError> {
    let text = state.relay.history(&request.contact)?;
    Ok(Json(HistoryResponse::ok(text)))
}
