// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transport backed by a signal-cli REST API daemon.
//!
//! The daemon owns the protocol state; this client only drives its HTTP
//! endpoints:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | list accounts | `GET /v1/accounts` |
//! | register | `POST /v1/register/{number}` |
//! | verify | `POST /v1/register/{number}/verify/{code}` |
//! | send | `POST /v2/send` |
//! | receive | `GET /v1/receive/{number}` |
//! | attachment | `GET /v1/attachments/{id}` |

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    InboundAttachment, InboundMessage, OutboundAttachment, SetupOutcome, Transport,
    TransportConfig, TransportError, TransportHooks, VerificationType,
};

/// Default interval between receive polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ReceivedItem {
    envelope: Envelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    source: Option<String>,
    source_number: Option<String>,
    timestamp: Option<i64>,
    data_message: Option<DataMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataMessage {
    timestamp: Option<i64>,
    message: Option<String>,
    #[serde(default)]
    attachments: Vec<AttachmentPointer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentPointer {
    id: String,
    content_type: Option<String>,
    filename: Option<String>,
}

/// HTTP client for a signal-cli REST API daemon.
#[derive(Debug)]
pub struct SignalRestClient {
    base_url: String,
    poll_interval: Duration,
    http: Client,
    account: OnceLock<String>,
    verbose: AtomicBool,
}

impl SignalRestClient {
    pub fn new(base_url: &Url, poll_interval: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            poll_interval,
            http,
            account: OnceLock::new(),
            verbose: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn account(&self) -> Result<&str, TransportError> {
        self.account
            .get()
            .map(String::as_str)
            .ok_or_else(|| TransportError::Config("transport used before setup".to_string()))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<T, TransportError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Request(format!(
                "GET {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<(), TransportError> {
        let response = self
            .http
            .post(self.url(path))
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Request(format!(
                "POST {path} returned {status}: {body}"
            )));
        }

        Ok(())
    }

    async fn download_attachment(&self, id: &str) -> Result<Vec<u8>, TransportError> {
        let path = format!("/v1/attachments/{}", encode_segment(id));
        let response = self
            .http
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TransportError::Request(format!(
                "GET {path} returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(format!("GET {path} body failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn send(
        &self,
        recipient: &str,
        body: &str,
        attachments: Vec<String>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({
            "number": self.account()?,
            "recipients": [recipient],
            "message": body,
        });

        if !attachments.is_empty() {
            payload["base64_attachments"] = json!(attachments);
        }

        self.post_json("/v2/send", &payload).await
    }

    /// Turn one received envelope into a message, downloading its attachments.
    ///
    /// Envelopes without a data message (receipts, typing notices) yield
    /// `None`. An attachment that fails to download is skipped.
    async fn to_message(&self, item: ReceivedItem) -> Option<InboundMessage> {
        let envelope = item.envelope;
        let data = envelope.data_message?;
        let source = envelope.source_number.or(envelope.source)?;

        let millis = data.timestamp.or(envelope.timestamp);
        let timestamp = millis
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        let mut attachments = Vec::with_capacity(data.attachments.len());
        for pointer in data.attachments {
            match self.download_attachment(&pointer.id).await {
                Ok(bytes) => attachments.push(InboundAttachment {
                    content_type: pointer.content_type,
                    file_name: pointer.filename,
                    data: bytes,
                }),
                Err(e) => warn!(
                    source = %source,
                    attachment_id = %pointer.id,
                    error = %e,
                    "Failed to download attachment"
                ),
            }
        }

        Some(InboundMessage {
            source,
            body: data.message.unwrap_or_default(),
            timestamp,
            attachments,
        })
    }
}

#[async_trait]
impl Transport for SignalRestClient {
    async fn setup(
        &self,
        config: &TransportConfig,
        hooks: &dyn TransportHooks,
    ) -> Result<SetupOutcome, TransportError> {
        let number = config.number.as_str();

        if let Some(existing) = self.account.get() {
            if existing != number {
                return Err(TransportError::Config(format!(
                    "client already set up for {existing}"
                )));
            }
        }

        self.verbose.store(config.verbose, Ordering::Relaxed);
        info!(
            number = %number,
            storage = %config.storage_dir.display(),
            endpoint = %self.base_url,
            "Setting up messaging transport"
        );

        let accounts: Vec<String> = self.get_json("/v1/accounts").await?;
        if accounts.iter().any(|a| a == number) {
            let _ = self.account.set(number.to_string());
            return Ok(SetupOutcome::Existing);
        }

        let segment = encode_segment(number);
        self.post_json(
            &format!("/v1/register/{segment}"),
            &json!({ "use_voice": config.verification == VerificationType::Voice }),
        )
        .await
        .map_err(|e| TransportError::Registration(e.to_string()))?;

        let code = hooks.verification_code()?;
        let code: String = code.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        if code.is_empty() {
            return Err(TransportError::Registration(
                "empty verification code".to_string(),
            ));
        }

        self.post_json(
            &format!("/v1/register/{segment}/verify/{}", encode_segment(&code)),
            &json!({}),
        )
        .await
        .map_err(|e| TransportError::Registration(e.to_string()))?;

        let _ = self.account.set(number.to_string());
        hooks.registration_done(number);
        Ok(SetupOutcome::Registered)
    }

    async fn send_message(&self, number: &str, body: &str) -> Result<(), TransportError> {
        self.send(number, body, Vec::new()).await
    }

    async fn send_attachment(
        &self,
        number: &str,
        body: &str,
        mut attachment: OutboundAttachment,
    ) -> Result<(), TransportError> {
        let mut data = Vec::new();
        attachment
            .file
            .read_to_end(&mut data)
            .map_err(|e| TransportError::Attachment(e.to_string()))?;

        let encoded = attachment_data_uri(&attachment.file_name, &data);
        self.send(number, body, vec![encoded]).await
    }

    async fn listen(&self, sink: mpsc::Sender<InboundMessage>) -> Result<(), TransportError> {
        let path = format!("/v1/receive/{}", encode_segment(self.account()?));

        loop {
            let items: Vec<ReceivedItem> = self.get_json(&path).await?;

            for item in items {
                if self.verbose.load(Ordering::Relaxed) {
                    debug!(envelope = ?item.envelope, "Received envelope");
                }

                let Some(message) = self.to_message(item).await else {
                    continue;
                };

                if sink.send(message).await.is_err() {
                    return Ok(());
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Percent-encode a value for use as one URL path segment.
fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Data URI understood by the daemon's `base64_attachments` field.
fn attachment_data_uri(file_name: &str, data: &[u8]) -> String {
    let name: String = file_name
        .chars()
        .filter(|c| *c != ';' && *c != ',')
        .collect();
    format!(
        "data:application/octet-stream;filename={name};base64,{}",
        Base64::encode_string(data)
    )
}
