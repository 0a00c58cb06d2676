// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Storage Module
//!
//! This module provides persistent storage on a **LUKS encrypted volume**.
//! Everything lives below the volume's mount point, which only exists while
//! the volume is unlocked.
//!
//! ## Storage Layout
//!
//! ```text
//! <mount>/
//!   keys/textsecure/private/
//!     number                 # Registered number (verbatim)
//!     prekeys/016777215      # Last-resort key marker (registration done)
//!     ...                    # Transport key material (NEVER exposed via API)
//!   textsecure/contacts/
//!     <name> <number>.textsecure        # One history log per contact
//!   textsecure/attachments/
//!     <name> <number>/attachment_<id>   # Per-contact attachments
//! ```
//!
//! ## Important Notes
//!
//! - This module uses **normal filesystem I/O**
//! - The volume manager handles all encryption
//! - Every path coming from a client is normalized and checked against the
//!   mount point and the private key area before use

pub mod encrypted_fs;
pub mod paths;
pub mod repository;

pub use encrypted_fs::{EncryptedStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{
    AttachmentRepository, ContactError, ContactRecord, ContactRepository, Direction,
    HistoryEntry, HistoryRepository, RegistrationRepository, RegistrationState,
    HISTORY_LIMIT_BYTES,
};
