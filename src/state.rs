// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::listener::ListenerStatus;
use crate::notify::Notifier;
use crate::relay::MessageRelay;
use crate::storage::EncryptedStorage;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<MessageRelay>,
    pub listener: ListenerStatus,
}

impl AppState {
    pub fn new(relay: Arc<MessageRelay>, listener: ListenerStatus) -> Self {
        Self { relay, listener }
    }

    pub fn storage(&self) -> &EncryptedStorage {
        self.relay.storage()
    }

    pub fn notifier(&self) -> &Notifier {
        self.relay.notifier()
    }
}
