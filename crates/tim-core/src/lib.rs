//! Core domain logic for the tim time tracker.
//!
//! This crate contains:
//! - Entries: tracked intervals with tags and an optional description
//! - Tracker: the session controller enforcing a single active entry
//! - Storage: the persistence interface backends implement
//! - Aggregation: per-tag totals, daily minutes and streaks

pub mod aggregate;
mod clock;
mod entry;
pub mod storage;
mod tracker;

pub use aggregate::{Streak, TagBreakdown, TagDuration, UNTAGGED};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entry::{
    Entry, EntryError, EntryId, EntryRecord, Tag, format_timestamp, parse_timestamp,
};
pub use storage::{LoadWarning, MemoryStorage, Snapshot, Storage, StorageError};
pub use tracker::{Tracker, TrackerError};
