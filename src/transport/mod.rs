// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Messaging Transport
//!
//! The secure messaging protocol (key agreement, ratchets, envelope
//! encryption) is handled entirely by an external client. This module
//! defines the boundary the gateway talks to:
//!
//! - [`Transport::setup`] registers the number if needed and provisions keys
//! - [`Transport::send_message`] / [`Transport::send_attachment`] deliver
//!   outbound messages
//! - [`Transport::listen`] streams inbound messages into a channel
//!
//! Interactive input needed during setup (the verification code) is requested
//! through [`TransportHooks`], so the transport never touches the terminal.

use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub mod signal_rest;

#[cfg(test)]
pub(crate) mod recording;

pub use signal_rest::SignalRestClient;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport configuration invalid: {0}")]
    Config(String),

    #[error("transport request failed: {0}")]
    Request(String),

    #[error("transport response was invalid: {0}")]
    InvalidResponse(String),

    #[error("registration failed: {0}")]
    Registration(String),

    #[error("attachment could not be read: {0}")]
    Attachment(String),
}

/// How the registration verification code is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationType {
    #[default]
    Sms,
    Voice,
}

impl FromStr for VerificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sms" => Ok(Self::Sms),
            "voice" => Ok(Self::Voice),
            other => Err(format!("unknown verification type '{other}' (expected sms or voice)")),
        }
    }
}

/// Settings handed to the transport at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Number the transport registers and sends from.
    pub number: String,
    pub verification: VerificationType,
    /// Private storage directory on the encrypted volume.
    pub storage_dir: PathBuf,
    /// Log message payloads at debug level.
    pub verbose: bool,
}

/// Callbacks the transport may invoke during setup.
pub trait TransportHooks: Send + Sync {
    /// Ask the operator for the verification code received for the number.
    fn verification_code(&self) -> Result<String, TransportError>;

    /// Password protecting the transport's own key store.
    ///
    /// Empty by default: the store already sits on the encrypted volume.
    fn storage_password(&self) -> String {
        String::new()
    }

    /// Called once a fresh registration completed.
    fn registration_done(&self, _number: &str) {}
}

/// Result of a successful [`Transport::setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The number was registered and keys provisioned during this setup.
    Registered,
    /// The number was already registered with the transport.
    Existing,
}

/// A local file to send along with a message.
#[derive(Debug)]
pub struct OutboundAttachment {
    /// Base name presented to the recipient.
    pub file_name: String,
    pub file: File,
}

/// An attachment delivered with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAttachment {
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// A message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender number.
    pub source: String,
    /// Message text, empty for attachment-only messages.
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<InboundAttachment>,
}

/// Client of the external secure messaging transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Register `config.number` if needed and make the client ready to use.
    async fn setup(
        &self,
        config: &TransportConfig,
        hooks: &dyn TransportHooks,
    ) -> Result<SetupOutcome, TransportError>;

    /// Send a text message.
    async fn send_message(&self, number: &str, body: &str) -> Result<(), TransportError>;

    /// Send a text message with one attachment.
    async fn send_attachment(
        &self,
        number: &str,
        body: &str,
        attachment: OutboundAttachment,
    ) -> Result<(), TransportError>;

    /// Push inbound messages into `sink` until the transport fails.
    ///
    /// Returns `Ok(())` when the receiving side of `sink` is dropped.
    async fn listen(&self, sink: mpsc::Sender<InboundMessage>) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_type_parses() {
        assert_eq!("sms".parse::<VerificationType>(), Ok(VerificationType::Sms));
        assert_eq!(" Voice ".parse::<VerificationType>(), Ok(VerificationType::Voice));
        assert!("fax".parse::<VerificationType>().is_err());
    }

    #[test]
    fn default_hooks_use_empty_storage_password() {
        struct CodeOnly;

        impl TransportHooks for CodeOnly {
            fn verification_code(&self) -> Result<String, TransportError> {
                Ok("123-456".into())
            }
        }

        assert_eq!(CodeOnly.storage_password(), "");
        assert_eq!(CodeOnly.verification_code().unwrap(), "123-456");
    }
}
