// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory transport used by unit tests.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    InboundMessage, OutboundAttachment, SetupOutcome, Transport, TransportConfig, TransportError,
    TransportHooks,
};

/// One message handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMessage {
    pub number: String,
    pub body: String,
    /// `(file name, content)` of the attachment, if any.
    pub attachment: Option<(String, Vec<u8>)>,
}

/// What one `listen` call does.
pub(crate) enum ListenStep {
    /// Deliver the messages, then return `Ok(())`.
    Deliver(Vec<InboundMessage>),
    /// Fail immediately.
    Fail(String),
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub sent: Mutex<Vec<SentMessage>>,
    pub fail_sends: AtomicBool,
    pub register_on_setup: AtomicBool,
    pub fail_setup: AtomicBool,
    pub setups: Mutex<Vec<TransportConfig>>,
    pub verification_codes: Mutex<Vec<String>>,
    pub storage_passwords: Mutex<Vec<String>>,
    pub listen_script: Mutex<VecDeque<ListenStep>>,
    pub listen_calls: AtomicUsize,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn script_listen(&self, steps: impl IntoIterator<Item = ListenStep>) {
        self.listen_script.lock().unwrap().extend(steps);
    }

    fn check_send(&self) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            Err(TransportError::Request("scripted send failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn setup(
        &self,
        config: &TransportConfig,
        hooks: &dyn TransportHooks,
    ) -> Result<SetupOutcome, TransportError> {
        self.setups.lock().unwrap().push(config.clone());
        self.storage_passwords
            .lock()
            .unwrap()
            .push(hooks.storage_password());

        if self.fail_setup.load(Ordering::SeqCst) {
            return Err(TransportError::Registration("scripted setup failure".into()));
        }

        if self.register_on_setup.load(Ordering::SeqCst) {
            let code = hooks.verification_code()?;
            self.verification_codes.lock().unwrap().push(code);
            hooks.registration_done(&config.number);
            Ok(SetupOutcome::Registered)
        } else {
            Ok(SetupOutcome::Existing)
        }
    }

    async fn send_message(&self, number: &str, body: &str) -> Result<(), TransportError> {
        self.check_send()?;
        self.sent.lock().unwrap().push(SentMessage {
            number: number.into(),
            body: body.into(),
            attachment: None,
        });
        Ok(())
    }

    async fn send_attachment(
        &self,
        number: &str,
        body: &str,
        mut attachment: OutboundAttachment,
    ) -> Result<(), TransportError> {
        self.check_send()?;
        let mut data = Vec::new();
        attachment
            .file
            .read_to_end(&mut data)
            .map_err(|e| TransportError::Attachment(e.to_string()))?;

        self.sent.lock().unwrap().push(SentMessage {
            number: number.into(),
            body: body.into(),
            attachment: Some((attachment.file_name, data)),
        });
        Ok(())
    }

    async fn listen(&self, sink: mpsc::Sender<InboundMessage>) -> Result<(), TransportError> {
        self.listen_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.listen_script.lock().unwrap().pop_front();

        match step {
            Some(ListenStep::Deliver(messages)) => {
                for message in messages {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
            Some(ListenStep::Fail(reason)) => Err(TransportError::Request(reason)),
            None => std::future::pending().await,
        }
    }
}
