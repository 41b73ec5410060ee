//! Storage adapter interface.
//!
//! A backend persists the complete entry collection on every save; there is
//! no incremental protocol. Loading never fails because of malformed content:
//! backends degrade to what they can decode and report the rest as
//! [`LoadWarning`]s. An `Err` from [`Storage::load`] means the data could not
//! be read at all (for example, permission denied), which callers must not
//! treat as an empty store.

use std::path::PathBuf;

use thiserror::Error;

use crate::entry::{Entry, EntryId};

/// Failures reading or writing persisted entries.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entries could not be encoded.
    #[error("failed to encode entries: {0}")]
    Encode(#[from] serde_json::Error),

    /// The underlying store reported an error.
    #[error("{backend} error: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A recoverable problem found while loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadWarning {
    /// The whole snapshot was unreadable and the store starts empty.
    #[error("stored data is corrupt, starting with an empty store: {reason}")]
    Corrupt { reason: String },

    /// A single record could not be decoded and was left out.
    #[error("skipped record {position}: {reason}")]
    SkippedRecord { position: usize, reason: String },

    /// A second entry with an already-seen id was left out.
    #[error("dropped entry with duplicate id {id}")]
    DuplicateId { id: EntryId },

    /// Several entries were active; all but the newest were closed.
    #[error("found several active entries: kept {kept} active, closed {}", join_ids(closed))]
    MultipleActive { kept: EntryId, closed: Vec<EntryId> },
}

fn join_ids(ids: &[EntryId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The result of a load: whatever could be decoded, plus what could not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub entries: Vec<Entry>,
    pub warnings: Vec<LoadWarning>,
}

impl Snapshot {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            warnings: Vec::new(),
        }
    }

    /// An empty snapshot carrying a single corruption warning.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            warnings: vec![LoadWarning::Corrupt {
                reason: reason.into(),
            }],
        }
    }
}

/// Loads and persists the full entry collection.
pub trait Storage {
    /// Reads the persisted snapshot.
    fn load(&self) -> Result<Snapshot, StorageError>;

    /// Replaces the persisted snapshot with `entries`.
    fn save(&mut self, entries: &[Entry]) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn load(&self) -> Result<Snapshot, StorageError> {
        (**self).load()
    }

    fn save(&mut self, entries: &[Entry]) -> Result<(), StorageError> {
        (**self).save(entries)
    }
}

/// Keeps the snapshot in memory.
///
/// Counts saves and can be switched into a failing mode, which makes it the
/// backend of choice for exercising the tracker.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Vec<Entry>,
    warnings: Vec<LoadWarning>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Warnings reported by every subsequent load.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<LoadWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    /// The last saved (or initial) snapshot.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub const fn save_count(&self) -> usize {
        self.saves
    }

    /// Makes subsequent saves fail until switched back.
    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Snapshot, StorageError> {
        Ok(Snapshot {
            entries: self.entries.clone(),
            warnings: self.warnings.clone(),
        })
    }

    fn save(&mut self, entries: &[Entry]) -> Result<(), StorageError> {
        if self.fail_saves {
            return Err(StorageError::Unavailable("saves are disabled".to_string()));
        }
        self.entries = entries.to_vec();
        self.saves += 1;
        Ok(())
    }
}
