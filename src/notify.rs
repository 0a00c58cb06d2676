// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transient operator notifications.
//!
//! Every notification removes itself after the configured lifetime on its
//! own timer task, so raising one never waits on anything.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Default lifetime of a notification.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(30);

/// Severity of a notification.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Notice,
    Error,
}

/// A notification currently shown to the operator.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Board {
    next_id: u64,
    active: Vec<Notification>,
}

/// Shared set of active notifications.
#[derive(Clone)]
pub struct Notifier {
    board: Arc<Mutex<Board>>,
    ttl: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            board: Arc::new(Mutex::new(Board::default())),
            ttl,
        }
    }

    fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Raise a notification and schedule its removal.
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        let id = {
            let mut board = self.board();
            board.next_id += 1;
            let id = board.next_id;
            board.active.push(Notification {
                id,
                level,
                message: message.into(),
                created_at: Utc::now(),
            });
            id
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let notifier = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(notifier.ttl).await;
                    notifier.remove(id);
                });
            }
            Err(_) => tracing::warn!(id, "No runtime available, notification will not expire"),
        }

        id
    }

    /// Remove a notification. Returns whether it was still active.
    pub fn remove(&self, id: u64) -> bool {
        let mut board = self.board();
        let before = board.active.len();
        board.active.retain(|n| n.id != id);
        board.active.len() != before
    }

    /// Active notifications, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        self.board().active.clone()
    }
}
