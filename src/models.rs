// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `ToSchema` for OpenAPI documentation.
//!
//! Paths in requests (`contact`, `attachment`) are relative to the
//! encrypted volume's mount point, e.g.
//! `/textsecure/contacts/Alice +15550001.textsecure`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Status value of a successful response.
pub const STATUS_OK: &str = "OK";

/// Status value of a failed response.
pub const STATUS_KO: &str = "KO";

/// Response to a send request. `response` is always `null`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SendResponse {
    /// `OK`.
    pub status: String,
    pub response: Option<String>,
}

impl SendResponse {
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
            response: None,
        }
    }
}

/// Most recent part of a contact's history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct HistoryResponse {
    /// `OK`.
    pub status: String,
    /// History lines, oldest first.
    pub response: String,
}

impl HistoryResponse {
    pub fn ok(history: String) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            response: history,
        }
    }
}

/// Error body returned with every 4xx/5xx status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    /// `KO`.
    pub status: String,
    /// Error message.
    pub response: String,
}

impl ErrorResponse {
    pub fn ko(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_KO.to_string(),
            response: message.into(),
        }
    }
}

/// Message to send to a contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SendRequest {
    /// Contact history file path.
    #[serde(default)]
    pub contact: String,
    /// Message text.
    #[serde(default)]
    pub msg: Option<String>,
    /// Path of a file to send along with the message.
    #[serde(default)]
    pub attachment: Option<String>,
}

/// Contact whose history is requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams, PartialEq, Eq)]
#[into_params(parameter_in = Query)]
pub struct HistoryRequest {
    /// Contact history file path.
    #[serde(default)]
    pub contact: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_fields_are_optional_on_the_wire() {
        let req: SendRequest = serde_json::from_str(r#"{"contact":"/c"}"#).unwrap();
        assert_eq!(req.contact, "/c");
        assert_eq!(req.msg, None);
        assert_eq!(req.attachment, None);
    }

    #[test]
    fn envelopes_serialize() {
        let body = serde_json::to_string(&HistoryResponse::ok("text".into())).unwrap();
        assert_eq!(body, r#"{"status":"OK","response":"text"}"#);

        let empty = serde_json::to_string(&SendResponse::ok()).unwrap();
        assert_eq!(empty, r#"{"status":"OK","response":null}"#);

        let error = serde_json::to_string(&ErrorResponse::ko("bad")).unwrap();
        assert_eq!(error, r#"{"status":"KO","response":"bad"}"#);
    }
}
