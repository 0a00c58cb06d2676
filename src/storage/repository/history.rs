// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Conversation history on encrypted storage.
//!
//! Each contact owns one plain-text history file with one line per entry:
//!
//! ```text
//! Jan 02 15:04 > outbound text
//! Jan 02 15:05 < [/textsecure/attachments/Alice +15550001/attachment_...]
//! ```
//!
//! Entries are only ever appended. Reads return a bounded suffix that starts
//! on a line boundary, so the size of a log never affects request cost.

use std::io::{Read, Seek, SeekFrom, Write};

use chrono::{DateTime, Local, Utc};

use super::super::{EncryptedStorage, StorageResult};
use super::contacts::ContactRecord;

/// Maximum number of bytes returned by a history tail-read.
pub const HISTORY_LIMIT_BYTES: u64 = 10 * 1024;

/// Timestamp format of history lines (minute resolution).
pub const TIME_FORMAT: &str = "%b %d %H:%M";

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    /// Marker written between timestamp and body.
    pub fn marker(self) -> &'static str {
        match self {
            Direction::Outbound => ">",
            Direction::Inbound => "<",
        }
    }
}

/// One line of a conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    pub body: String,
}

impl HistoryEntry {
    /// Entry for a message sent now.
    pub fn outbound(body: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            direction: Direction::Outbound,
            body: body.into(),
        }
    }

    /// Entry for a message received at `timestamp`.
    pub fn inbound(body: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.with_timezone(&Local),
            direction: Direction::Inbound,
            body: body.into(),
        }
    }

    /// Render the entry as a single terminated line.
    ///
    /// Line breaks inside the body are flattened to spaces so one entry
    /// always occupies exactly one line.
    pub fn to_line(&self) -> String {
        let body: String = self
            .body
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();

        format!(
            "{} {} {}\n",
            self.timestamp.format(TIME_FORMAT),
            self.direction.marker(),
            body
        )
    }
}

/// Repository for conversation logs on encrypted storage.
pub struct HistoryRepository<'a> {
    storage: &'a EncryptedStorage,
}

impl<'a> HistoryRepository<'a> {
    /// Create a new HistoryRepository.
    pub fn new(storage: &'a EncryptedStorage) -> Self {
        Self { storage }
    }

    /// Append one entry to the contact's log, creating the log if needed.
    ///
    /// The line goes out in a single write on an `O_APPEND` descriptor, so
    /// concurrent appenders never interleave partial lines.
    pub fn append(&self, contact: &ContactRecord, entry: &HistoryEntry) -> StorageResult<()> {
        let line = entry.to_line();
        let mut file = self.storage.open_append(&contact.history_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read at most `max_bytes` from the end of the contact's log.
    ///
    /// When the log is longer than the bound, the partial first line is
    /// dropped: the result starts right after the first line feed found at
    /// or after the cut, or at the cut itself when there is none.
    pub fn read_tail(&self, contact: &ContactRecord, max_bytes: u64) -> StorageResult<String> {
        let mut file = self.storage.open_read(&contact.history_path)?;
        let size = file.metadata()?.len();
        let truncated = size > max_bytes;

        if truncated {
            file.seek(SeekFrom::Start(size - max_bytes))?;
        }

        let mut buf = Vec::with_capacity(size.min(max_bytes) as usize);
        file.read_to_end(&mut buf)?;

        let start = if truncated {
            buf.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1)
        } else {
            0
        };

        Ok(String::from_utf8_lossy(&buf[start..]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encrypted_fs::tests::test_storage;
    use crate::storage::repository::ContactRepository;
    use crate::storage::StorageError;
    use chrono::TimeZone;
    use std::fs;

    fn alice(storage: &EncryptedStorage) -> ContactRecord {
        ContactRepository::new(storage)
            .resolve_by_path(&storage.paths().contacts_dir().join("Alice +15550001.textsecure"))
            .unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 1, 2, hour, minute, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn entry_formats_as_single_line() {
        let entry = HistoryEntry {
            timestamp: at(15, 4),
            direction: Direction::Outbound,
            body: "hello".into(),
        };
        assert_eq!(entry.to_line(), "Jan 02 15:04 > hello\n");

        let entry = HistoryEntry {
            timestamp: at(9, 30),
            direction: Direction::Inbound,
            body: "two\nlines".into(),
        };
        assert_eq!(entry.to_line(), "Jan 02 09:30 < two lines\n");
    }

    #[test]
    fn append_creates_and_extends_log() {
        let (_dir, storage) = test_storage();
        let repo = HistoryRepository::new(&storage);
        let contact = alice(&storage);

        for body in ["one", "two"] {
            repo.append(
                &contact,
                &HistoryEntry {
                    timestamp: at(10, 0),
                    direction: Direction::Outbound,
                    body: body.into(),
                },
            )
            .unwrap();
        }

        let content = fs::read_to_string(&contact.history_path).unwrap();
        assert_eq!(content, "Jan 02 10:00 > one\nJan 02 10:00 > two\n");
    }

    #[test]
    fn read_tail_of_missing_log_is_not_found() {
        let (_dir, storage) = test_storage();
        let result = HistoryRepository::new(&storage).read_tail(&alice(&storage), 1024);
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn read_tail_at_exact_bound_returns_everything() {
        let (_dir, storage) = test_storage();
        let contact = alice(&storage);
        let content = "aaaa\nbbbb\ncccc\n";
        fs::write(&contact.history_path, content).unwrap();

        let tail = HistoryRepository::new(&storage)
            .read_tail(&contact, content.len() as u64)
            .unwrap();
        assert_eq!(tail, content);
    }

    #[test]
    fn read_tail_one_byte_over_drops_partial_line() {
        let (_dir, storage) = test_storage();
        let contact = alice(&storage);
        let content = "aaaa\nbbbb\ncccc\n";
        fs::write(&contact.history_path, content).unwrap();

        let tail = HistoryRepository::new(&storage)
            .read_tail(&contact, content.len() as u64 - 1)
            .unwrap();
        assert_eq!(tail, "bbbb\ncccc\n");
    }

    #[test]
    fn read_tail_without_line_feed_keeps_cut() {
        let (_dir, storage) = test_storage();
        let contact = alice(&storage);
        fs::write(&contact.history_path, "abcdefghij").unwrap();

        let tail = HistoryRepository::new(&storage).read_tail(&contact, 4).unwrap();
        assert_eq!(tail, "ghij");
    }

    #[test]
    fn read_tail_of_large_log_is_bounded_and_aligned() {
        let (_dir, storage) = test_storage();
        let repo = HistoryRepository::new(&storage);
        let contact = alice(&storage);

        let mut content = String::new();
        let mut i = 0;
        while content.len() < 50 * 1024 {
            content.push_str(&format!("Jan 02 10:00 > message number {i}\n"));
            i += 1;
        }
        fs::write(&contact.history_path, &content).unwrap();

        let tail = repo.read_tail(&contact, HISTORY_LIMIT_BYTES).unwrap();
        assert!(tail.len() as u64 <= HISTORY_LIMIT_BYTES);
        assert!(tail.starts_with("Jan 02 10:00 > message number "));
        assert!(tail.ends_with(&format!("message number {}\n", i - 1)));
        assert!(content.ends_with(&tail));

        // No intervening append: identical result.
        assert_eq!(repo.read_tail(&contact, HISTORY_LIMIT_BYTES).unwrap(), tail);
    }

    #[test]
    fn concurrent_appends_keep_lines_intact() {
        let (_dir, storage) = test_storage();
        let contact = alice(&storage);
        let writers = 16;
        let per_writer = 50;

        std::thread::scope(|scope| {
            for w in 0..writers {
                let storage = &storage;
                let contact = &contact;
                scope.spawn(move || {
                    let repo = HistoryRepository::new(storage);
                    for n in 0..per_writer {
                        let entry = HistoryEntry {
                            timestamp: at(12, 0),
                            direction: Direction::Inbound,
                            body: format!("writer {w} entry {n} {}", "x".repeat(64)),
                        };
                        repo.append(contact, &entry).unwrap();
                    }
                });
            }
        });

        let content = fs::read_to_string(&contact.history_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), writers * per_writer);
        for line in lines {
            assert!(line.starts_with("Jan 02 12:00 < writer "), "{line}");
            assert!(line.ends_with(&"x".repeat(64)), "{line}");
        }
    }
}
