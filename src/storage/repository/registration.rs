// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration state kept in the transport's private storage.
//!
//! Two files make up the state:
//!
//! - `number`: the number captured during registration, stored verbatim.
//! - `prekeys/016777215`: the last-resort key marker. Once present,
//!   registration is complete and will not be repeated until the private
//!   storage directory is cleared by hand.
//!
//! Both are written with write-temp-then-rename so a crash never leaves a
//! half-written state behind.

use chrono::Utc;

use super::super::{EncryptedStorage, StorageError, StorageResult};

/// Snapshot of the registration state, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationState {
    pub registered_number: Option<String>,
    pub provisioned: bool,
}

impl RegistrationState {
    /// Whether a registration run is still required.
    pub fn needs_registration(&self) -> bool {
        !self.provisioned
    }
}

/// Repository for registration state on encrypted storage.
pub struct RegistrationRepository<'a> {
    storage: &'a EncryptedStorage,
}

impl<'a> RegistrationRepository<'a> {
    /// Create a new RegistrationRepository.
    pub fn new(storage: &'a EncryptedStorage) -> Self {
        Self { storage }
    }

    /// Load the current registration state.
    pub fn load(&self) -> StorageResult<RegistrationState> {
        let paths = self.storage.paths();

        let registered_number = match self.storage.read_raw(paths.number_file()) {
            Ok(raw) => Some(String::from_utf8_lossy(&raw).into_owned()),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(RegistrationState {
            registered_number,
            provisioned: self.storage.exists(paths.sentinel_marker()),
        })
    }

    /// Persist the number captured for registration, replacing any previous one.
    pub fn save_number(&self, number: &str) -> StorageResult<()> {
        self.storage
            .write_atomic(self.storage.paths().number_file(), number.as_bytes())
    }

    /// Record that key provisioning completed.
    pub fn mark_provisioned(&self) -> StorageResult<()> {
        let stamp = Utc::now().to_rfc3339();
        self.storage
            .write_atomic(self.storage.paths().sentinel_marker(), stamp.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encrypted_fs::tests::test_storage;

    #[test]
    fn fresh_storage_needs_registration() {
        let (_dir, storage) = test_storage();
        let state = RegistrationRepository::new(&storage).load().unwrap();

        assert_eq!(state, RegistrationState::default());
        assert!(state.needs_registration());
    }

    #[test]
    fn number_is_stored_verbatim() {
        let (_dir, storage) = test_storage();
        let repo = RegistrationRepository::new(&storage);

        repo.save_number("0044 7700").unwrap();
        repo.save_number("+447700900123").unwrap();

        let state = repo.load().unwrap();
        assert_eq!(state.registered_number.as_deref(), Some("+447700900123"));
        assert!(!state.provisioned);
    }

    #[test]
    fn sentinel_completes_registration() {
        let (_dir, storage) = test_storage();
        let repo = RegistrationRepository::new(&storage);

        repo.save_number("+15550001").unwrap();
        repo.mark_provisioned().unwrap();

        let state = repo.load().unwrap();
        assert!(state.provisioned);
        assert!(!state.needs_registration());
        assert!(storage.paths().sentinel_marker().is_file());
    }
}
