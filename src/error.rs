// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::{
    config::ConfigError,
    models::ErrorResponse,
    storage::{ContactError, StorageError},
    transport::TransportError,
    volume::VolumeError,
};

/// Errors raised by the gateway's operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid contact: {0}")]
    InvalidContact(String),

    #[error("invalid contact number format: {0}")]
    InvalidNumber(String),

    #[error("downloading private key(s) is not allowed")]
    KeyAccessDenied,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to enable messaging transport: {0}")]
    TransportSetup(#[source] TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("operator input failed: {0}")]
    Prompt(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("registration already present for number {number}, delete {storage} contents to reset")]
    AlreadyRegistered { number: String, storage: String },

    #[error("messaging transport enabled but not registered, please restart with --register for registration")]
    NotRegistered,
}

impl From<ContactError> for GatewayError {
    fn from(e: ContactError) -> Self {
        match e {
            ContactError::InvalidContact(c) => GatewayError::InvalidContact(c),
            ContactError::InvalidNumber(n) => GatewayError::InvalidNumber(n),
            ContactError::Storage(s) => GatewayError::Storage(s),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        let message = e.to_string();
        match e {
            GatewayError::InvalidRequest(_)
            | GatewayError::InvalidContact(_)
            | GatewayError::InvalidNumber(_)
            | GatewayError::Storage(StorageError::PathTraversal(_)) => Self::bad_request(message),
            GatewayError::KeyAccessDenied => Self::forbidden(message),
            GatewayError::Storage(StorageError::NotFound(_)) => Self::not_found(message),
            GatewayError::Transport(_) | GatewayError::TransportSetup(_) => {
                Self::bad_gateway(message)
            }
            GatewayError::Storage(_)
            | GatewayError::Volume(_)
            | GatewayError::Prompt(_)
            | GatewayError::Config(_)
            | GatewayError::Server(_)
            | GatewayError::AlreadyRegistered { .. }
            | GatewayError::NotRegistered => Self::internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::ko(self.message))).into_response()
    }
}
