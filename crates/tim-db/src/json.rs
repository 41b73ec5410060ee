//! JSON document backend.
//!
//! The store is one JSON array of entry records, pretty-printed with two
//! spaces. Saves go through a temporary sibling file that is synced and then
//! renamed over the target, so a crash never leaves a half-written document.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tim_core::{Entry, EntryRecord, LoadWarning, Snapshot, Storage, StorageError};

/// Entries persisted as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a document that did not load cleanly is copied.
    ///
    /// The next save rewrites the store from what could be decoded, so this
    /// copy is the only place the dropped data survives.
    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "corrupt")
    }

    /// Copies `bytes` to the backup path unless it already holds them.
    fn keep_copy(&self, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let backup = self.backup_path();
        if fs::read(&backup).is_ok_and(|existing| existing == bytes) {
            tracing::debug!(backup = %backup.display(), "backup already current");
            return Ok(backup);
        }

        write_atomic(&backup, bytes).map_err(|(path, source)| StorageError::Io { path, source })?;
        tracing::warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            "damaged store backed up"
        );
        Ok(backup)
    }

    fn degrade(&self, bytes: &[u8], reason: &str) -> Result<Snapshot, StorageError> {
        let backup = self.keep_copy(bytes)?;
        Ok(Snapshot::corrupt(format!(
            "{reason} (copy kept at {})",
            backup.display()
        )))
    }
}

impl Storage for JsonStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no store yet");
                return Ok(Snapshot::default());
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Snapshot::default());
        }

        let records = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Array(records)) => records,
            Ok(_) => return self.degrade(&bytes, "expected a JSON array of entries"),
            Err(err) => return self.degrade(&bytes, &err.to_string()),
        };

        let mut snapshot = Snapshot::default();
        let mut skipped = Vec::new();
        for (position, record) in records.into_iter().enumerate() {
            let decoded = serde_json::from_value::<EntryRecord>(record)
                .map_err(|err| err.to_string())
                .and_then(|record| Entry::try_from(record).map_err(|err| err.to_string()));
            match decoded {
                Ok(entry) => snapshot.entries.push(entry),
                Err(reason) => skipped.push((position, reason)),
            }
        }

        if !skipped.is_empty() {
            let backup = self.keep_copy(&bytes)?;
            snapshot.warnings = skipped
                .into_iter()
                .map(|(position, reason)| LoadWarning::SkippedRecord {
                    position,
                    reason: format!("{reason} (copy kept at {})", backup.display()),
                })
                .collect();
        }

        tracing::debug!(
            path = %self.path.display(),
            entries = snapshot.entries.len(),
            skipped = snapshot.warnings.len(),
            "loaded json store"
        );
        Ok(snapshot)
    }

    fn save(&mut self, entries: &[Entry]) -> Result<(), StorageError> {
        let records: Vec<EntryRecord> = entries.iter().map(EntryRecord::from).collect();
        let body = serde_json::to_vec_pretty(&records)?;
        write_atomic(&self.path, &body).map_err(|(path, source)| StorageError::Io { path, source })?;

        tracing::debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "saved json store"
        );
        Ok(())
    }
}

/// Writes `body` to a synced temporary sibling and renames it over `path`.
fn write_atomic(path: &Path, body: &[u8]) -> Result<(), (PathBuf, io::Error)> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| (parent.to_path_buf(), err))?;
    }

    let tmp = sibling(path, "tmp");
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(body)?;
        file.sync_all()
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err((tmp, err));
    }

    fs::rename(&tmp, path).map_err(|err| {
        let _ = fs::remove_file(&tmp);
        (path.to_path_buf(), err)
    })
}

/// `path` with `.suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
