// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Contact directory on encrypted storage.
//!
//! A contact has no metadata file of its own: its identity is carried by the
//! name of its history file, `<display name> <number>.textsecure`, stored
//! under `/textsecure/contacts/`. [`identity_to_filename`] and
//! [`filename_to_identity`] are the only places that know this grammar.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::super::{EncryptedStorage, StorageError};

/// Extension of contact history files.
pub const CONTACT_EXTENSION: &str = "textsecure";

/// Display name given to numbers without a contact file.
pub const UNKNOWN_CONTACT_NAME: &str = "Unknown";

static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+|00)[0-9]+$").expect("valid number pattern"));

static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^([^/]*) ((?:\+|00)[0-9]+)\.{}$",
        regex::escape(CONTACT_EXTENSION)
    ))
    .expect("valid contact filename pattern")
});

/// Errors raised while resolving a contact identity.
#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("invalid contact: {0}")]
    InvalidContact(String),

    #[error("invalid contact number format: {0}")]
    InvalidNumber(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Identity and storage locations for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub display_name: String,
    /// Canonical international number (`+` or `00` prefix).
    pub number: String,
    pub history_path: PathBuf,
    pub attachment_dir: PathBuf,
}

/// Whether `number` is in canonical international format.
pub fn is_valid_number(number: &str) -> bool {
    NUMBER_PATTERN.is_match(number)
}

/// Encode a contact identity as its history file name.
pub fn identity_to_filename(display_name: &str, number: &str) -> Result<String, ContactError> {
    if !is_valid_number(number) {
        return Err(ContactError::InvalidNumber(number.to_string()));
    }

    if display_name.contains('/') {
        return Err(ContactError::InvalidContact(display_name.to_string()));
    }

    Ok(format!("{display_name} {number}.{CONTACT_EXTENSION}"))
}

/// Decode a history file name into `(display_name, number)`.
pub fn filename_to_identity(file_name: &str) -> Option<(String, String)> {
    let captures = FILENAME_PATTERN.captures(file_name)?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

/// Repository resolving contacts on encrypted storage.
pub struct ContactRepository<'a> {
    storage: &'a EncryptedStorage,
}

impl<'a> ContactRepository<'a> {
    /// Create a new ContactRepository.
    pub fn new(storage: &'a EncryptedStorage) -> Self {
        Self { storage }
    }

    /// Resolve an absolute history file path to its contact.
    ///
    /// The path must sit directly in the contacts directory, follow the
    /// naming grammar and contain no `.`/`..` segments.
    pub fn resolve_by_path(&self, path: &Path) -> Result<ContactRecord, ContactError> {
        let invalid = || ContactError::InvalidContact(path.display().to_string());
        let paths = self.storage.paths();

        let normalized = paths.contain(path).map_err(|_| invalid())?;
        if normalized != path {
            return Err(invalid());
        }

        if normalized.parent() != Some(paths.contacts_dir().as_path()) {
            return Err(invalid());
        }

        let file_name = normalized
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(invalid)?;
        let (display_name, number) = filename_to_identity(file_name).ok_or_else(invalid)?;

        Ok(self.record(display_name, number, normalized))
    }

    /// Resolve a sender number to its contact, synthesizing an "Unknown" one.
    ///
    /// The synthesized record is not written; its history file appears on
    /// the first append.
    pub fn resolve_by_number(&self, number: &str) -> Result<ContactRecord, ContactError> {
        if !is_valid_number(number) {
            return Err(ContactError::InvalidNumber(number.to_string()));
        }

        let contacts_dir = self.storage.paths().contacts_dir();
        self.storage.create_dir(&contacts_dir)?;

        let matches: Vec<PathBuf> = self
            .storage
            .list_files(&contacts_dir, CONTACT_EXTENSION)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(filename_to_identity)
                    .is_some_and(|(_, n)| n == number)
            })
            .collect();

        match matches.as_slice() {
            [] => {
                let file_name = identity_to_filename(UNKNOWN_CONTACT_NAME, number)?;
                Ok(self.record(
                    UNKNOWN_CONTACT_NAME.to_string(),
                    number.to_string(),
                    contacts_dir.join(file_name),
                ))
            }
            [first, rest @ ..] => {
                if !rest.is_empty() {
                    tracing::warn!(
                        number = %number,
                        count = matches.len(),
                        chosen = %first.display(),
                        "Several contacts share a number, using the first"
                    );
                }
                self.resolve_by_path(first)
            }
        }
    }

    fn record(&self, display_name: String, number: String, history_path: PathBuf) -> ContactRecord {
        let attachment_dir = self
            .storage
            .paths()
            .attachments_dir()
            .join(format!("{display_name} {number}"));

        ContactRecord {
            display_name,
            number,
            history_path,
            attachment_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encrypted_fs::tests::test_storage;
    use std::fs;

    #[test]
    fn filename_round_trips() {
        for (name, number) in [
            ("Alice", "+15550001"),
            ("Bob Smith", "0044123456"),
            ("", "+1"),
            ("Dr. J +1", "+2"),
        ] {
            let file_name = identity_to_filename(name, number).unwrap();
            assert_eq!(
                filename_to_identity(&file_name),
                Some((name.to_string(), number.to_string()))
            );
        }
    }

    #[test]
    fn resolve_by_path_round_trips_filename() {
        let (_dir, storage) = test_storage();
        let repo = ContactRepository::new(&storage);
        let path = storage.paths().contacts_dir().join("Alice +15550001.textsecure");

        let contact = repo.resolve_by_path(&path).unwrap();
        assert_eq!(contact.display_name, "Alice");
        assert_eq!(contact.number, "+15550001");
        assert_eq!(contact.history_path, path);
        assert_eq!(
            contact.attachment_dir,
            storage.paths().attachments_dir().join("Alice +15550001")
        );
        assert_eq!(
            identity_to_filename(&contact.display_name, &contact.number).unwrap(),
            "Alice +15550001.textsecure"
        );
    }

    #[test]
    fn invalid_numbers_are_rejected_everywhere() {
        let (_dir, storage) = test_storage();
        let repo = ContactRepository::new(&storage);

        for number in ["15550001", "+1555abc", "", "++1", "0+1", "+"] {
            assert!(matches!(
                repo.resolve_by_number(number),
                Err(ContactError::InvalidNumber(_))
            ));

            let path = storage
                .paths()
                .contacts_dir()
                .join(format!("Alice {number}.textsecure"));
            assert!(matches!(
                repo.resolve_by_path(&path),
                Err(ContactError::InvalidContact(_))
            ));
        }
    }

    #[test]
    fn resolve_by_path_rejects_foreign_locations() {
        let (_dir, storage) = test_storage();
        let repo = ContactRepository::new(&storage);
        let paths = storage.paths();

        let outside = paths.attachments_dir().join("Alice +15550001.textsecure");
        let traversal = paths
            .contacts_dir()
            .join("../../keys/textsecure/private/Alice +15550001.textsecure");
        let dotted = paths
            .contacts_dir()
            .join("../contacts/Alice +15550001.textsecure");
        let wrong_ext = paths.contacts_dir().join("Alice +15550001.txt");

        for path in [outside, traversal, dotted, wrong_ext] {
            assert!(
                matches!(repo.resolve_by_path(&path), Err(ContactError::InvalidContact(_))),
                "{} should be rejected",
                path.display()
            );
        }
    }

    #[test]
    fn unknown_number_is_synthesized_without_writing() {
        let (_dir, storage) = test_storage();
        let repo = ContactRepository::new(&storage);

        let contact = repo.resolve_by_number("+15559999").unwrap();
        assert_eq!(contact.display_name, UNKNOWN_CONTACT_NAME);
        assert_eq!(
            contact.history_path,
            storage.paths().contacts_dir().join("Unknown +15559999.textsecure")
        );
        assert!(!contact.history_path.exists());
        assert!(!contact.attachment_dir.exists());
    }

    #[test]
    fn known_number_resolves_to_existing_file() {
        let (_dir, storage) = test_storage();
        let repo = ContactRepository::new(&storage);
        let contacts = storage.paths().contacts_dir();
        fs::write(contacts.join("Alice +15550001.textsecure"), b"").unwrap();
        fs::write(contacts.join("Bob +115550001.textsecure"), b"").unwrap();

        let contact = repo.resolve_by_number("+15550001").unwrap();
        assert_eq!(contact.display_name, "Alice");
        assert_eq!(contact.number, "+15550001");
    }

    #[test]
    fn duplicate_numbers_pick_first_sorted() {
        let (_dir, storage) = test_storage();
        let repo = ContactRepository::new(&storage);
        let contacts = storage.paths().contacts_dir();
        fs::write(contacts.join("Zed +1555.textsecure"), b"").unwrap();
        fs::write(contacts.join("Amy +1555.textsecure"), b"").unwrap();

        let contact = repo.resolve_by_number("+1555").unwrap();
        assert_eq!(contact.display_name, "Amy");
    }

    #[test]
    fn resolve_by_number_creates_contacts_dir() {
        let (_dir, storage) = test_storage();
        fs::remove_dir_all(storage.paths().contacts_dir()).unwrap();

        ContactRepository::new(&storage)
            .resolve_by_number("+15550001")
            .unwrap();
        assert!(storage.paths().contacts_dir().is_dir());
    }
}
