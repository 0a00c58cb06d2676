// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{models::STATUS_OK, notify::Notification, state::AppState};

/// Notifications currently shown to the operator.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationsResponse {
    /// `OK`.
    pub status: String,
    /// Active notifications, oldest first.
    pub response: Vec<Notification>,
}

#[utoipa::path(
    get,
    path = "/api/status/notifications",
    tag = "Status",
    responses((status = 200, body = NotificationsResponse))
)]
pub async fn notifications(State(state): State<AppState>) -> Json<NotificationsResponse> {
    Json(NotificationsResponse {
        status: STATUS_OK.to_string(),
        response: state.notifier().active(),
    })
}
