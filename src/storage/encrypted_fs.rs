// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem operations on the unlocked encrypted volume.
//!
//! ## Security Note
//!
//! This module uses **standard filesystem I/O**. The volume manager (LUKS)
//! encrypts everything below the mount point; once it is unlocked the
//! gateway treats it as a normal directory tree.
//!
//! Directories are created `0700` and files `0600` so nothing on the volume
//! is readable by other local users while it is mounted.

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::StoragePaths;

/// Error type for encrypted storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// File or directory not found
    NotFound(String),
    /// Storage not initialized (volume not mounted or layout not created)
    NotInitialized,
    /// Data read back differs from data written
    IntegrityViolation(String),
    /// Path climbs out of the mount point
    PathTraversal(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::NotFound(entity) => write!(f, "Not found: {entity}"),
            StorageError::NotInitialized => write!(f, "Storage not initialized"),
            StorageError::IntegrityViolation(msg) => write!(f, "Integrity violation: {msg}"),
            StorageError::PathTraversal(path) => write!(f, "Path traversal detected: {path}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage manager for the mounted encrypted volume.
#[derive(Debug, Clone)]
pub struct EncryptedStorage {
    paths: StoragePaths,
    initialized: bool,
}

impl EncryptedStorage {
    /// Create a new EncryptedStorage instance.
    ///
    /// Does NOT initialize the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Initialize the directory structure under the mount point.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn initialize(&mut self) -> StorageResult<()> {
        if !self.paths.root().is_dir() {
            return Err(StorageError::NotFound(format!(
                "mount point {}",
                self.paths.root().display()
            )));
        }

        let dirs = [
            self.paths.private_dir(),
            self.paths.contacts_dir(),
            self.paths.attachments_dir(),
        ];

        for dir in dirs {
            private_dir_builder().create(&dir)?;
        }

        self.initialized = true;
        Ok(())
    }

    /// Check the volume is mounted and writable with a write-read-delete cycle.
    pub fn health_check(&self) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }

        Ok(())
    }

    /// Replace a file's content atomically (write temp file, then rename).
    pub fn write_atomic(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            private_dir_builder().create(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let mut file = private_file_options()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Read raw bytes from a file.
    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Open an existing file for reading.
    pub fn open_read(&self, path: impl AsRef<Path>) -> StorageResult<File> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }
        Ok(File::open(path.as_ref())?)
    }

    /// Check if a file exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// Create a directory (including parents) readable only by the owner.
    pub fn create_dir(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }
        private_dir_builder().create(path.as_ref())?;
        Ok(())
    }

    /// Open a file for appending, creating it if absent.
    pub fn open_append(&self, path: impl AsRef<Path>) -> StorageResult<File> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let file = private_file_options()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(file)
    }

    /// Create a new file with a generated name that cannot clash with an existing one.
    pub fn create_unique(
        &self,
        dir: impl AsRef<Path>,
        prefix: &str,
    ) -> StorageResult<(PathBuf, File)> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let dir = dir.as_ref();

        loop {
            let path = dir.join(format!("{prefix}{}", uuid::Uuid::new_v4().simple()));

            match private_file_options().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// List the files in a directory with the given extension, sorted by path.
    pub fn list_files(
        &self,
        dir: impl AsRef<Path>,
        extension: &str,
    ) -> StorageResult<Vec<PathBuf>> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

fn private_dir_builder() -> DirBuilder {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
}

fn private_file_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}
