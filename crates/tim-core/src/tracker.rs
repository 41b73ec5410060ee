//! Session controller.
//!
//! [`Tracker`] owns the entry collection for the lifetime of the process and
//! is the only place entries are mutated. It keeps at most one entry active:
//! starting a new entry stops the running one first.
//!
//! Every mutation builds the next snapshot, hands it to the storage backend,
//! and only replaces the in-memory collection once the save succeeded. A
//! failed save therefore leaves memory and disk in agreement.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entry::{Entry, EntryError, EntryId, Tag};
use crate::storage::{LoadWarning, Storage, StorageError};

/// Errors from tracker mutations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The new snapshot could not be persisted; nothing changed.
    #[error("failed to persist entries: {0}")]
    Persistence(#[from] StorageError),

    /// The mutation would break an entry invariant.
    #[error(transparent)]
    Entry(#[from] EntryError),
}

/// Owns the entries and enforces the single-active-entry rule.
#[derive(Debug)]
pub struct Tracker<S> {
    storage: S,
    entries: Vec<Entry>,
    warnings: Vec<LoadWarning>,
}

impl<S: Storage> Tracker<S> {
    /// Loads the persisted entries from `storage`.
    ///
    /// Malformed data never fails the load; see [`Tracker::take_warnings`].
    pub fn load(storage: S) -> Result<Self, StorageError> {
        let mut tracker = Self {
            storage,
            entries: Vec::new(),
            warnings: Vec::new(),
        };
        tracker.reload()?;
        Ok(tracker)
    }

    /// Replaces the in-memory entries with the persisted snapshot.
    ///
    /// Pending warnings are replaced by the ones found in this snapshot.
    pub fn reload(&mut self) -> Result<(), StorageError> {
        let snapshot = self.storage.load()?;
        let mut warnings = snapshot.warnings;
        let entries = repair(snapshot.entries, &mut warnings);

        for warning in &warnings {
            tracing::warn!(%warning, "degraded load");
        }
        tracing::debug!(entries = entries.len(), "loaded entries");

        self.entries = entries;
        self.warnings = warnings;
        Ok(())
    }

    /// Returns and clears the warnings from the latest load.
    pub fn take_warnings(&mut self) -> Vec<LoadWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// All entries in creation order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// The running entry, if any.
    pub fn active_entry(&self) -> Option<&Entry> {
        self.active_position().map(|position| &self.entries[position])
    }

    /// Starts a new entry at `now`, stopping the active one first.
    ///
    /// `now` may not precede the end of any completed entry.
    pub fn start_tracking(
        &mut self,
        tags: impl IntoIterator<Item = Tag>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Entry, TrackerError> {
        let latest_end = self.entries.iter().filter_map(Entry::end).max();
        if let Some(end) = latest_end.filter(|end| now < *end) {
            return Err(EntryError::StartOverlaps { start: now, end }.into());
        }

        let mut next = self.entries.clone();
        if let Some(position) = self.active_position() {
            tracing::debug!(id = %next[position].id(), "stopping active entry before start");
            next[position].stop(now)?;
        }

        let entry = Entry::new(self.next_id(now), now, tags, description);
        next.push(entry.clone());
        self.commit(next)?;

        tracing::debug!(id = %entry.id(), "started entry");
        Ok(entry)
    }

    /// Stops the active entry at `now`.
    ///
    /// Returns `None` without touching storage when nothing is running.
    pub fn stop_tracking(&mut self, now: DateTime<Utc>) -> Result<Option<Entry>, TrackerError> {
        let Some(position) = self.active_position() else {
            tracing::debug!("no active entry to stop");
            return Ok(None);
        };

        let mut next = self.entries.clone();
        next[position].stop(now)?;
        let stopped = next[position].clone();
        self.commit(next)?;

        tracing::debug!(id = %stopped.id(), "stopped entry");
        Ok(Some(stopped))
    }

    /// Deletes the entry with `id`.
    ///
    /// Unknown ids are a no-op and return `None`.
    pub fn delete_entry(&mut self, id: EntryId) -> Result<Option<Entry>, TrackerError> {
        let Some(position) = self.entries.iter().position(|entry| entry.id() == id) else {
            tracing::debug!(%id, "no entry to delete");
            return Ok(None);
        };

        let mut next = self.entries.clone();
        let removed = next.remove(position);
        self.commit(next)?;

        tracing::debug!(%id, "deleted entry");
        Ok(Some(removed))
    }

    /// Entries carrying any of `tags`; every entry when `tags` is empty.
    pub fn entries_by_tags(&self, tags: &[Tag]) -> Vec<&Entry> {
        if tags.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries
            .iter()
            .filter(|entry| entry.has_any_tag(tags))
            .collect()
    }

    /// Distinct tags used by any entry, sorted.
    pub fn known_tags(&self) -> BTreeSet<&Tag> {
        self.entries.iter().flat_map(Entry::tags).collect()
    }

    fn active_position(&self) -> Option<usize> {
        self.entries.iter().rposition(Entry::is_active)
    }

    /// Derives an id from `now`, bumped past the largest id in use.
    fn next_id(&self, now: DateTime<Utc>) -> EntryId {
        let candidate = now.timestamp();
        match self.entries.iter().map(|entry| entry.id().value()).max() {
            Some(max) if max >= candidate => EntryId::new(max.saturating_add(1)),
            _ => EntryId::new(candidate),
        }
    }

    fn commit(&mut self, next: Vec<Entry>) -> Result<(), TrackerError> {
        self.storage.save(&next)?;
        tracing::debug!(entries = next.len(), "persisted entries");
        self.entries = next;
        Ok(())
    }
}

/// Restores the store invariants on freshly loaded entries.
fn repair(entries: Vec<Entry>, warnings: &mut Vec<LoadWarning>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(entries.len());
    for entry in entries {
        if seen.insert(entry.id()) {
            unique.push(entry);
        } else {
            warnings.push(LoadWarning::DuplicateId { id: entry.id() });
        }
    }

    close_stale_active(&mut unique, warnings);
    unique
}

/// Keeps only the newest active entry running.
///
/// Each older active entry is closed where the following entry starts, which
/// is what an implicit stop on start would have recorded.
fn close_stale_active(entries: &mut [Entry], warnings: &mut Vec<LoadWarning>) {
    let Some(kept) = entries.iter().rposition(Entry::is_active) else {
        return;
    };

    let mut closed = Vec::new();
    for position in 0..kept {
        if entries[position].is_active() {
            let next_start = entries[position + 1].start();
            entries[position].close_at(next_start);
            closed.push(entries[position].id());
        }
    }

    if !closed.is_empty() {
        warnings.push(LoadWarning::MultipleActive {
            kept: entries[kept].id(),
            closed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeDelta, TimeZone};

    use crate::storage::MemoryStorage;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, hour, minute, 0).unwrap()
    }

    fn tags(names: &[&str]) -> Vec<Tag> {
        names.iter().map(|name| Tag::new(name).unwrap()).collect()
    }

    fn empty_tracker() -> Tracker<MemoryStorage> {
        Tracker::load(MemoryStorage::new()).unwrap()
    }

    fn active_count<S: Storage>(tracker: &Tracker<S>) -> usize {
        tracker.entries().iter().filter(|e| e.is_active()).count()
    }

    #[test]
    fn start_creates_active_entry_and_persists() {
        let mut tracker = empty_tracker();
        let entry = tracker
            .start_tracking(tags(&["work"]), Some("unit test".to_string()), at(9, 0))
            .unwrap();

        assert!(entry.is_active());
        assert_eq!(entry.start(), at(9, 0));
        assert_eq!(entry.id(), EntryId::new(at(9, 0).timestamp()));
        assert_eq!(tracker.active_entry(), Some(&entry));
        assert_eq!(tracker.storage().save_count(), 1);
        assert_eq!(tracker.storage().entries(), &[entry]);
    }

    #[test]
    fn start_while_active_stops_previous_at_now() {
        let mut tracker = empty_tracker();
        let first = tracker.start_tracking(tags(&["a"]), None, at(9, 0)).unwrap();
        let second = tracker.start_tracking(tags(&["b"]), None, at(9, 40)).unwrap();

        let entries = tracker.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id(), first.id());
        assert_eq!(entries[0].end(), Some(at(9, 40)));
        assert!(entries[1].is_active());
        assert_eq!(tracker.active_entry().map(Entry::id), Some(second.id()));
        assert_eq!(active_count(&tracker), 1);
    }

    #[test]
    fn at_most_one_active_entry_after_every_operation() {
        let mut tracker = empty_tracker();
        let mut now = at(8, 0);
        let script = [true, true, false, false, true, false, true, true, true, false];

        for start in script {
            now += TimeDelta::minutes(7);
            if start {
                tracker.start_tracking(vec![], None, now).unwrap();
            } else {
                tracker.stop_tracking(now).unwrap();
            }
            assert!(active_count(&tracker) <= 1);
        }
        assert_eq!(tracker.entries().len(), 6);
    }

    #[test]
    fn stop_sets_end_and_returns_entry() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(vec![], None, at(9, 0)).unwrap();

        let stopped = tracker.stop_tracking(at(9, 25)).unwrap().unwrap();
        assert_eq!(stopped.end(), Some(at(9, 25)));
        assert_eq!(stopped.duration(at(12, 0)), TimeDelta::minutes(25));
        assert!(tracker.active_entry().is_none());
        assert_eq!(tracker.storage().save_count(), 2);
    }

    #[test]
    fn stop_without_active_entry_is_a_quiet_none() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(vec![], None, at(9, 0)).unwrap();
        tracker.stop_tracking(at(9, 10)).unwrap();
        let before = tracker.entries().to_vec();

        assert!(tracker.stop_tracking(at(9, 20)).unwrap().is_none());
        assert_eq!(tracker.entries(), before.as_slice());
        assert_eq!(tracker.storage().save_count(), 2);
    }

    #[test]
    fn stop_before_start_is_rejected_without_changes() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(vec![], None, at(9, 0)).unwrap();

        let err = tracker.stop_tracking(at(8, 0)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Entry(EntryError::EndBeforeStart { .. })
        ));
        assert!(tracker.active_entry().is_some());
        assert_eq!(tracker.storage().save_count(), 1);

        let err = tracker.start_tracking(vec![], None, at(8, 30)).unwrap_err();
        assert!(matches!(err, TrackerError::Entry(_)));
        assert_eq!(tracker.entries().len(), 1);
    }

    #[test]
    fn start_inside_completed_entry_is_rejected() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(tags(&["a"]), None, at(9, 0)).unwrap();
        tracker.stop_tracking(at(10, 0)).unwrap();

        let err = tracker.start_tracking(tags(&["b"]), None, at(9, 30)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Entry(EntryError::StartOverlaps { start, end })
                if start == at(9, 30) && end == at(10, 0)
        ));
        assert_eq!(tracker.entries().len(), 1);
        assert_eq!(tracker.storage().save_count(), 2);
        assert_eq!(
            crate::aggregate::total_duration(tracker.entries(), at(12, 0)),
            TimeDelta::hours(1)
        );

        let resumed = tracker.start_tracking(tags(&["b"]), None, at(10, 0)).unwrap();
        assert_eq!(resumed.start(), at(10, 0));
    }

    #[test]
    fn delete_removes_entry_and_persists() {
        let mut tracker = empty_tracker();
        let first = tracker.start_tracking(vec![], None, at(9, 0)).unwrap();
        let second = tracker.start_tracking(vec![], None, at(10, 0)).unwrap();

        let removed = tracker.delete_entry(first.id()).unwrap().unwrap();
        assert_eq!(removed.id(), first.id());
        assert_eq!(tracker.entries().len(), 1);
        assert_eq!(tracker.entries()[0].id(), second.id());
        assert_eq!(tracker.storage().entries().len(), 1);
    }

    #[test]
    fn delete_unknown_id_is_a_noop() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(vec![], None, at(9, 0)).unwrap();
        let before = tracker.entries().to_vec();

        assert!(tracker.delete_entry(EntryId::new(-1)).unwrap().is_none());
        assert_eq!(tracker.entries(), before.as_slice());
        assert_eq!(tracker.storage().save_count(), 1);
    }

    #[test]
    fn deleting_active_entry_leaves_nothing_running() {
        let mut tracker = empty_tracker();
        let entry = tracker.start_tracking(vec![], None, at(9, 0)).unwrap();
        tracker.delete_entry(entry.id()).unwrap();
        assert!(tracker.active_entry().is_none());
    }

    #[test]
    fn entries_by_tags_filters_on_intersection() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(tags(&["work", "api"]), None, at(9, 0)).unwrap();
        tracker.start_tracking(tags(&["home"]), None, at(10, 0)).unwrap();
        tracker.start_tracking(vec![], None, at(11, 0)).unwrap();

        assert_eq!(tracker.entries_by_tags(&[]).len(), 3);
        assert_eq!(tracker.entries_by_tags(&tags(&["api"])).len(), 1);
        assert_eq!(tracker.entries_by_tags(&tags(&["api", "home"])).len(), 2);
        assert!(tracker.entries_by_tags(&tags(&["gym"])).is_empty());
    }

    #[test]
    fn failed_save_leaves_entries_untouched() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(tags(&["a"]), None, at(9, 0)).unwrap();
        let before = tracker.entries().to_vec();

        let mut storage = tracker.storage().clone();
        storage.fail_saves(true);
        let mut failing = Tracker {
            storage,
            entries: before.clone(),
            warnings: Vec::new(),
        };

        let err = failing.start_tracking(vec![], None, at(10, 0)).unwrap_err();
        assert!(matches!(err, TrackerError::Persistence(_)));
        assert_eq!(failing.entries(), before.as_slice());
        assert!(failing.stop_tracking(at(10, 0)).is_err());
        assert!(failing.entries()[0].is_active());
        assert!(failing.delete_entry(before[0].id()).is_err());
        assert_eq!(failing.entries().len(), 1);
    }

    #[test]
    fn ids_stay_unique_within_the_same_second() {
        let mut tracker = empty_tracker();
        let first = tracker.start_tracking(vec![], None, at(9, 0)).unwrap();
        let second = tracker.start_tracking(vec![], None, at(9, 0)).unwrap();
        let third = tracker.start_tracking(vec![], None, at(9, 0)).unwrap();

        assert_eq!(second.id().value(), first.id().value() + 1);
        assert_eq!(third.id().value(), first.id().value() + 2);
    }

    #[test]
    fn load_closes_all_but_newest_active_entry() {
        let entries = vec![
            Entry::new(EntryId::new(1), at(9, 0), vec![], None),
            Entry::new(EntryId::new(2), at(10, 0), vec![], None),
            Entry::new(EntryId::new(3), at(11, 0), vec![], None),
        ];
        let mut tracker = Tracker::load(MemoryStorage::with_entries(entries)).unwrap();

        assert_eq!(active_count(&tracker), 1);
        assert_eq!(tracker.active_entry().map(Entry::id), Some(EntryId::new(3)));
        assert_eq!(tracker.entries()[0].end(), Some(at(10, 0)));
        assert_eq!(tracker.entries()[1].end(), Some(at(11, 0)));
        assert_eq!(
            tracker.take_warnings(),
            vec![LoadWarning::MultipleActive {
                kept: EntryId::new(3),
                closed: vec![EntryId::new(1), EntryId::new(2)],
            }]
        );
        assert!(tracker.take_warnings().is_empty());
    }

    #[test]
    fn load_clamps_repair_when_entries_are_out_of_order() {
        let entries = vec![
            Entry::new(EntryId::new(1), at(11, 0), vec![], None),
            Entry::new(EntryId::new(2), at(9, 0), vec![], None),
        ];
        let tracker = Tracker::load(MemoryStorage::with_entries(entries)).unwrap();
        assert_eq!(tracker.entries()[0].end(), Some(at(11, 0)));
        assert!(tracker.entries()[1].is_active());
    }

    #[test]
    fn load_drops_duplicate_ids() {
        let entries = vec![
            Entry::from_parts(EntryId::new(1), at(9, 0), Some(at(9, 30)), vec![], None).unwrap(),
            Entry::from_parts(EntryId::new(1), at(10, 0), Some(at(10, 30)), vec![], None).unwrap(),
        ];
        let mut tracker = Tracker::load(MemoryStorage::with_entries(entries)).unwrap();

        assert_eq!(tracker.entries().len(), 1);
        assert_eq!(tracker.entries()[0].start(), at(9, 0));
        assert_eq!(
            tracker.take_warnings(),
            vec![LoadWarning::DuplicateId {
                id: EntryId::new(1)
            }]
        );
    }

    #[test]
    fn backend_warnings_are_surfaced() {
        let storage = MemoryStorage::new().with_warnings(vec![LoadWarning::Corrupt {
            reason: "bad json".to_string(),
        }]);
        let mut tracker = Tracker::load(storage).unwrap();
        assert!(tracker.entries().is_empty());
        assert_eq!(tracker.take_warnings().len(), 1);
    }

    #[test]
    fn reload_does_not_stack_warnings() {
        let storage = MemoryStorage::new().with_warnings(vec![LoadWarning::Corrupt {
            reason: "bad json".to_string(),
        }]);
        let mut tracker = Tracker::load(storage).unwrap();
        tracker.reload().unwrap();
        tracker.reload().unwrap();
        assert_eq!(tracker.take_warnings().len(), 1);
    }

    #[test]
    fn reload_replaces_entries_with_persisted_state() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(vec![], None, at(9, 0)).unwrap();
        tracker.reload().unwrap();
        assert_eq!(tracker.entries().len(), 1);
        assert!(tracker.active_entry().is_some());
    }

    #[test]
    fn known_tags_are_sorted_and_distinct() {
        let mut tracker = empty_tracker();
        tracker.start_tracking(tags(&["web", "api"]), None, at(9, 0)).unwrap();
        tracker.start_tracking(tags(&["api"]), None, at(10, 0)).unwrap();

        let known: Vec<&str> = tracker.known_tags().into_iter().map(Tag::as_str).collect();
        assert_eq!(known, vec!["api", "web"]);
    }
}
