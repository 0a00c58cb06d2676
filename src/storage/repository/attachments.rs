// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attachment storage on the encrypted volume.
//!
//! Attachments live in a per-contact directory under
//! `/textsecure/attachments/<display name> <number>/` and are referenced from
//! history entries by their mount-relative path. Files are written once and
//! never modified.

use std::io::{self, Read};

use super::super::{EncryptedStorage, StorageResult};
use super::contacts::ContactRecord;

/// Prefix of generated attachment file names.
pub const ATTACHMENT_PREFIX: &str = "attachment_";

/// Repository for contact attachments on encrypted storage.
pub struct AttachmentRepository<'a> {
    storage: &'a EncryptedStorage,
}

impl<'a> AttachmentRepository<'a> {
    /// Create a new AttachmentRepository.
    pub fn new(storage: &'a EncryptedStorage) -> Self {
        Self { storage }
    }

    /// Store `source` as a new attachment of `contact`.
    ///
    /// Returns the path of the new file relative to the mount point.
    pub fn save(&self, contact: &ContactRecord, mut source: impl Read) -> StorageResult<String> {
        self.storage.create_dir(&contact.attachment_dir)?;

        let (path, mut output) = self
            .storage
            .create_unique(&contact.attachment_dir, ATTACHMENT_PREFIX)?;
        let written = io::copy(&mut source, &mut output)?;

        tracing::info!(
            contact = %contact.display_name,
            number = %contact.number,
            bytes = written,
            "Saved attachment"
        );

        self.storage.paths().relative(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encrypted_fs::tests::test_storage;
    use crate::storage::repository::ContactRepository;
    use std::collections::HashSet;
    use std::fs;

    #[test]
    fn save_writes_content_under_contact_dir() {
        let (_dir, storage) = test_storage();
        let contact = ContactRepository::new(&storage)
            .resolve_by_number("+15559999")
            .unwrap();

        let name = AttachmentRepository::new(&storage)
            .save(&contact, &b"\x89PNG payload"[..])
            .unwrap();

        assert!(name.starts_with("/textsecure/attachments/Unknown +15559999/attachment_"));
        let absolute = storage.paths().absolute(&name).unwrap();
        assert_eq!(fs::read(absolute).unwrap(), b"\x89PNG payload");
    }

    #[test]
    fn concurrent_saves_get_distinct_names() {
        let (_dir, storage) = test_storage();
        let contact = ContactRepository::new(&storage)
            .resolve_by_number("+15550001")
            .unwrap();

        let names: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let storage = &storage;
                    let contact = &contact;
                    scope.spawn(move || {
                        AttachmentRepository::new(storage)
                            .save(contact, format!("blob {i}").as_bytes())
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
