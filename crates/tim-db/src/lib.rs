//! Storage backends for the tim time tracker.
//!
//! Both backends implement [`tim_core::Storage`] and persist the complete
//! entry collection on every save:
//!
//! - [`JsonStore`]: a single pretty-printed JSON document, written atomically
//! - [`SqliteStore`]: a relational schema with sessions, tags and a join table
//!
//! # Thread Safety
//!
//! [`SqliteStore`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Neither backend coordinates with other processes writing the same
//! file; the last writer wins.

mod json;
mod sqlite;

pub use json::JsonStore;
pub use sqlite::{DbError, SqliteStore};
