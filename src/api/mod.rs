// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    listener::ListenerState,
    models::{ErrorResponse, HistoryRequest, HistoryResponse, SendRequest, SendResponse},
    notify::{Notification, NotificationLevel},
    state::AppState,
};

pub mod health;
pub mod messaging;
pub mod status;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/messaging/send", post(messaging::send))
        .route(
            "/messaging/history",
            get(messaging::history).post(messaging::history_post),
        )
        .route("/status/notifications", get(status::notifications));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        messaging::send,
        messaging::history,
        messaging::history_post,
        status::notifications,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            SendRequest,
            SendResponse,
            HistoryRequest,
            HistoryResponse,
            ErrorResponse,
            Notification,
            NotificationLevel,
            ListenerState,
            status::NotificationsResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Messaging", description = "Send messages and read contact history"),
        (name = "Status", description = "Operator notifications"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
