// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the encrypted volume layout.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use super::{StorageError, StorageResult};

/// Default mount point of the encrypted volume.
pub const DATA_ROOT: &str = "/mnt/secure";

/// Default key directory, relative to the mount point.
pub const DEFAULT_KEY_PATH: &str = "keys";

/// Directory name shared by the messaging key area and the messaging data area.
pub const MESSAGING_DIR: &str = "textsecure";

/// Key identifier of the last-resort prekey; its presence proves provisioning.
pub const LAST_RESORT_KEY_ID: u32 = 0x00ff_ffff;

/// Storage path utilities for the encrypted volume.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
    key_path: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT, DEFAULT_KEY_PATH)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom mount point (useful for testing).
    pub fn new(root: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(root.as_ref()),
            key_path: key_path.as_ref().to_path_buf(),
        }
    }

    /// Mount point of the encrypted volume.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Key Storage ==========

    /// Directory holding every cipher's key material.
    pub fn key_dir(&self) -> PathBuf {
        self.root.join(&self.key_path)
    }

    /// Transport private storage (key material, number, sentinel).
    pub fn private_dir(&self) -> PathBuf {
        self.key_dir().join(MESSAGING_DIR).join("private")
    }

    /// File holding the registered number.
    pub fn number_file(&self) -> PathBuf {
        self.private_dir().join("number")
    }

    /// Sentinel marker written once key provisioning completed.
    pub fn sentinel_marker(&self) -> PathBuf {
        self.private_dir()
            .join("prekeys")
            .join(format!("{LAST_RESORT_KEY_ID:09}"))
    }

    // ========== Conversation Data ==========

    /// Directory containing contacts and attachments.
    pub fn messaging_dir(&self) -> PathBuf {
        self.root.join(MESSAGING_DIR)
    }

    /// Directory containing one history file per contact.
    pub fn contacts_dir(&self) -> PathBuf {
        self.messaging_dir().join("contacts")
    }

    /// Directory containing one attachment directory per contact.
    pub fn attachments_dir(&self) -> PathBuf {
        self.messaging_dir().join("attachments")
    }

    // ========== Resolution ==========

    /// Resolve a mount-relative path (as sent by API clients) to an absolute one.
    ///
    /// Leading separators are ignored, so `/a/b` and `a/b` resolve the same.
    /// Returns [`StorageError::PathTraversal`] when `..` segments climb above
    /// the mount point.
    pub fn absolute(&self, sub: &str) -> StorageResult<PathBuf> {
        let relative: PathBuf = Path::new(sub)
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();

        self.contain(&self.root.join(relative))
    }

    /// Lexically normalize an absolute path and check it stays under the mount point.
    pub fn contain(&self, path: &Path) -> StorageResult<PathBuf> {
        let normalized = normalize(path);

        if normalized.starts_with(&self.root) {
            Ok(normalized)
        } else {
            Err(StorageError::PathTraversal(path.display().to_string()))
        }
    }

    /// Path relative to the mount point, with a leading `/`.
    pub fn relative(&self, path: &Path) -> StorageResult<String> {
        let normalized = self.contain(path)?;
        let rest = normalized
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::PathTraversal(path.display().to_string()))?;

        let parts: Vec<_> = rest
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        Ok(format!("/{}", parts.join("/")))
    }

    /// Whether `path` falls inside a private key storage area.
    ///
    /// The classification is lexical so `..` segments cannot sneak a path
    /// past it.
    pub fn is_private_key_path(&self, path: &Path) -> bool {
        let normalized = normalize(path);

        match normalized.strip_prefix(self.key_dir()) {
            Ok(rest) => rest
                .components()
                .any(|c| c.as_os_str() == OsStr::new("private")),
            Err(_) => false,
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/mnt/secure"));
        assert_eq!(paths.key_dir(), PathBuf::from("/mnt/secure/keys"));
    }

    #[test]
    fn private_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/vol", "keys");
        assert_eq!(
            paths.private_dir(),
            PathBuf::from("/tmp/vol/keys/textsecure/private")
        );
        assert_eq!(
            paths.number_file(),
            PathBuf::from("/tmp/vol/keys/textsecure/private/number")
        );
        assert_eq!(
            paths.sentinel_marker(),
            PathBuf::from("/tmp/vol/keys/textsecure/private/prekeys/016777215")
        );
    }

    #[test]
    fn conversation_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/vol", "keys");
        assert_eq!(
            paths.contacts_dir(),
            PathBuf::from("/tmp/vol/textsecure/contacts")
        );
        assert_eq!(
            paths.attachments_dir(),
            PathBuf::from("/tmp/vol/textsecure/attachments")
        );
    }

    #[test]
    fn absolute_joins_under_root() {
        let paths = StoragePaths::new("/tmp/vol", "keys");
        assert_eq!(
            paths.absolute("/textsecure/contacts/a.textsecure").unwrap(),
            PathBuf::from("/tmp/vol/textsecure/contacts/a.textsecure")
        );
        assert_eq!(
            paths.absolute("textsecure/./contacts/../contacts/b").unwrap(),
            PathBuf::from("/tmp/vol/textsecure/contacts/b")
        );
    }

    #[test]
    fn absolute_rejects_escape() {
        let paths = StoragePaths::new("/tmp/vol", "keys");
        let result = paths.absolute("../../etc/passwd");
        assert!(matches!(result, Err(StorageError::PathTraversal(_))));
    }

    #[test]
    fn relative_has_leading_separator() {
        let paths = StoragePaths::new("/tmp/vol", "keys");
        let rel = paths
            .relative(Path::new("/tmp/vol/textsecure/attachments/A +1/attachment_x"))
            .unwrap();
        assert_eq!(rel, "/textsecure/attachments/A +1/attachment_x");
    }

    #[test]
    fn private_key_detection_sees_through_traversal() {
        let paths = StoragePaths::new("/tmp/vol", "keys");

        assert!(paths.is_private_key_path(&paths.number_file()));
        assert!(paths.is_private_key_path(Path::new(
            "/tmp/vol/textsecure/contacts/../../keys/textsecure/private/identity"
        )));
        assert!(!paths.is_private_key_path(Path::new("/tmp/vol/keys/pgp/public/a.pub")));
        assert!(!paths.is_private_key_path(Path::new("/tmp/vol/textsecure/private/x")));
    }
}
