// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Message Relay
//!
//! Both message paths converge here:
//!
//! - outbound: API requests resolve a contact file, hand the message to the
//!   transport and record it in the contact's history once delivered
//! - inbound: messages from the listener are matched to a contact by sender
//!   number, recorded, and their attachments stored
//!
//! History is only written after the transport accepted a message, so a
//! failed send leaves no trace in the log.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::models::SendRequest;
use crate::notify::{NotificationLevel, Notifier};
use crate::storage::{
    AttachmentRepository, ContactRecord, ContactRepository, EncryptedStorage, HistoryEntry,
    HistoryRepository, StorageError,
};
use crate::transport::{InboundMessage, OutboundAttachment, Transport};

/// Relays messages between the API, the transport and encrypted storage.
pub struct MessageRelay {
    storage: Arc<EncryptedStorage>,
    transport: Arc<dyn Transport>,
    notifier: Notifier,
    history_limit: u64,
}

impl MessageRelay {
    pub fn new(
        storage: Arc<EncryptedStorage>,
        transport: Arc<dyn Transport>,
        notifier: Notifier,
        history_limit: u64,
    ) -> Self {
        Self {
            storage,
            transport,
            notifier,
            history_limit,
        }
    }

    pub fn storage(&self) -> &EncryptedStorage {
        &self.storage
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Send a message, with an optional attachment, to the contact named by
    /// `request.contact` and record it in the contact's history.
    pub async fn send(&self, request: &SendRequest) -> Result<(), GatewayError> {
        let msg = request
            .msg
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidRequest("missing msg".to_string()))?;
        let contact = self.resolve_contact(&request.contact)?;

        let entry = match request.attachment.as_deref().filter(|a| !a.is_empty()) {
            Some(attachment) => {
                let (file_name, file) = self.open_attachment(attachment)?;
                self.transport
                    .send_attachment(
                        &contact.number,
                        msg,
                        OutboundAttachment {
                            file_name: file_name.clone(),
                            file,
                        },
                    )
                    .await?;
                HistoryEntry::outbound(format!("[{file_name}] {msg}"))
            }
            None => {
                self.transport.send_message(&contact.number, msg).await?;
                HistoryEntry::outbound(msg)
            }
        };

        HistoryRepository::new(&self.storage).append(&contact, &entry)?;

        info!(
            contact = %contact.display_name,
            number = %contact.number,
            "Message sent"
        );
        Ok(())
    }

    /// Most recent part of a contact's history, aligned to a line boundary.
    pub fn history(&self, contact: &str) -> Result<String, GatewayError> {
        let contact = self.resolve_contact(contact)?;
        let text =
            HistoryRepository::new(&self.storage).read_tail(&contact, self.history_limit)?;
        Ok(text)
    }

    /// Record an inbound message and store its attachments.
    ///
    /// Never fails: problems are logged, raised as error notifications and
    /// the affected part is dropped. A failed attachment does not stop the
    /// remaining ones.
    pub fn handle_inbound(&self, message: InboundMessage) {
        info!(
            number = %message.source,
            attachments = message.attachments.len(),
            "Received message"
        );
        debug!(number = %message.source, body = %message.body, "Inbound message body");

        self.notifier.notify(
            NotificationLevel::Notice,
            format!("received message from {}", message.source),
        );

        let contacts = ContactRepository::new(&self.storage);
        let contact = match contacts.resolve_by_number(&message.source) {
            Ok(contact) => contact,
            Err(e) => {
                warn!(number = %message.source, error = %e, "Dropping inbound message");
                self.report(format!("message from {} dropped: {e}", message.source));
                return;
            }
        };

        let history = HistoryRepository::new(&self.storage);
        if !message.body.is_empty() {
            let entry = HistoryEntry::inbound(&message.body, message.timestamp);
            if let Err(e) = history.append(&contact, &entry) {
                warn!(number = %contact.number, error = %e, "Failed to record inbound message");
                self.report(format!("failed to record message from {}: {e}", contact.number));
            }
        }

        let attachments = AttachmentRepository::new(&self.storage);
        for attachment in &message.attachments {
            let stored = attachments
                .save(&contact, attachment.data.as_slice())
                .and_then(|name| {
                    let entry = HistoryEntry::inbound(format!("[{name}]"), message.timestamp);
                    history.append(&contact, &entry)
                });

            if let Err(e) = stored {
                warn!(
                    number = %contact.number,
                    file_name = ?attachment.file_name,
                    error = %e,
                    "Failed to store inbound attachment"
                );
                self.report(format!("failed to store attachment from {}: {e}", contact.number));
            }
        }
    }

    fn report(&self, message: String) {
        self.notifier.notify(NotificationLevel::Error, message);
    }

    /// Resolve a mount-relative contact file path to its contact.
    fn resolve_contact(&self, contact: &str) -> Result<ContactRecord, GatewayError> {
        if contact.is_empty() {
            return Err(GatewayError::InvalidRequest("missing contact".to_string()));
        }

        let paths = self.storage.paths();
        let path = paths
            .absolute(contact)
            .map_err(|_| GatewayError::InvalidContact(contact.to_string()))?;
        if paths.is_private_key_path(&path) {
            return Err(GatewayError::KeyAccessDenied);
        }

        Ok(ContactRepository::new(&self.storage).resolve_by_path(&path)?)
    }

    /// Open a mount-relative attachment path for sending.
    fn open_attachment(&self, attachment: &str) -> Result<(String, std::fs::File), GatewayError> {
        let paths = self.storage.paths();
        let path = paths.absolute(attachment).map_err(|e| match e {
            StorageError::PathTraversal(p) => {
                GatewayError::InvalidRequest(format!("invalid attachment path: {p}"))
            }
            other => GatewayError::Storage(other),
        })?;

        if paths.is_private_key_path(&path) {
            warn!(path = %path.display(), "Refused attachment from key storage");
            return Err(GatewayError::KeyAccessDenied);
        }

        let file_name = Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("invalid attachment: {attachment}"))
            })?;
        let file = self.storage.open_read(&path)?;

        Ok((file_name, file))
    }
}
