// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to encrypted storage.
//!
//! Each repository borrows the [`EncryptedStorage`](super::EncryptedStorage)
//! and performs all of its file operations through it.

pub mod attachments;
pub mod contacts;
pub mod history;
pub mod registration;

pub use attachments::AttachmentRepository;
pub use contacts::{ContactError, ContactRecord, ContactRepository};
pub use history::{Direction, HistoryEntry, HistoryRepository, HISTORY_LIMIT_BYTES};
pub use registration::{RegistrationRepository, RegistrationState};
