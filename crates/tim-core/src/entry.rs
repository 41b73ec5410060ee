//! Tracked time entries and their persisted record form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors raised while building or decoding an entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// A timestamp was neither RFC 3339 nor a naive ISO-8601 local time.
    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// A tag was empty after trimming.
    #[error("tag cannot be empty")]
    EmptyTag,

    /// The end of an entry precedes its start.
    #[error("entry {id} would end at {end} before it starts at {start}")]
    EndBeforeStart {
        id: EntryId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A new entry would start inside an already completed one.
    #[error("cannot start at {start}: an earlier entry runs until {end}")]
    StartOverlaps {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Stable identifier of an entry.
///
/// Assigned once by the tracker; unique among the entries of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A validated, case-sensitive tag label.
///
/// Surrounding whitespace is trimmed; blank labels are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    pub fn new(name: impl AsRef<str>) -> Result<Self, EntryError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(EntryError::EmptyTag);
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = EntryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One tracked interval.
///
/// An entry without an end is *active*. The start is fixed at creation and the
/// end is set at most once, so the only mutation is [`Entry::stop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryRecord", into = "EntryRecord")]
pub struct Entry {
    id: EntryId,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    tags: Vec<Tag>,
    description: Option<String>,
}

impl Entry {
    /// Creates an active entry starting at `start`.
    pub fn new(
        id: EntryId,
        start: DateTime<Utc>,
        tags: impl IntoIterator<Item = Tag>,
        description: Option<String>,
    ) -> Self {
        Self {
            id,
            start,
            end: None,
            tags: dedupe_tags(tags),
            description: normalize_description(description),
        }
    }

    /// Rebuilds an entry from stored parts, validating `end >= start`.
    pub fn from_parts(
        id: EntryId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        tags: impl IntoIterator<Item = Tag>,
        description: Option<String>,
    ) -> Result<Self, EntryError> {
        let mut entry = Self::new(id, start, tags, description);
        if let Some(end) = end {
            entry.stop(end)?;
        }
        Ok(entry)
    }

    pub const fn id(&self) -> EntryId {
        self.id
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub const fn is_active(&self) -> bool {
        self.end.is_none()
    }

    /// Elapsed time of the entry, measured up to `now` while it is active.
    ///
    /// Never negative: an active entry queried before its start reports zero.
    pub fn duration(&self, now: DateTime<Utc>) -> TimeDelta {
        let end = self.end.unwrap_or(now);
        (end - self.start).max(TimeDelta::zero())
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// True if the entry carries at least one of `tags`.
    pub fn has_any_tag(&self, tags: &[Tag]) -> bool {
        tags.iter().any(|tag| self.has_tag(tag))
    }

    /// Sets the end of the entry.
    pub(crate) fn stop(&mut self, at: DateTime<Utc>) -> Result<(), EntryError> {
        if at < self.start {
            return Err(EntryError::EndBeforeStart {
                id: self.id,
                start: self.start,
                end: at,
            });
        }
        self.end = Some(at);
        Ok(())
    }

    /// Ends the entry at `at`, or at its own start if `at` is earlier.
    pub(crate) fn close_at(&mut self, at: DateTime<Utc>) {
        self.end = Some(at.max(self.start));
    }
}

fn dedupe_tags(tags: impl IntoIterator<Item = Tag>) -> Vec<Tag> {
    let mut unique: Vec<Tag> = Vec::new();
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|text| !text.trim().is_empty())
}

/// The structural form an entry is persisted in.
///
/// Matches the document layout `{"id", "start_time", "end_time", "tags",
/// "description"}`. A missing `end_time` and a missing or null `description`
/// are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: i64,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<&Entry> for EntryRecord {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id.value(),
            start_time: format_timestamp(entry.start),
            end_time: entry.end.map(format_timestamp),
            tags: entry.tags.iter().map(|tag| tag.as_str().to_string()).collect(),
            description: entry.description.clone().unwrap_or_default(),
        }
    }
}

impl From<Entry> for EntryRecord {
    fn from(entry: Entry) -> Self {
        Self::from(&entry)
    }
}

impl TryFrom<EntryRecord> for Entry {
    type Error = EntryError;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        let start = parse_timestamp(&record.start_time)?;
        let end = record.end_time.as_deref().map(parse_timestamp).transpose()?;
        let tags = record
            .tags
            .into_iter()
            .map(Tag::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_parts(
            EntryId::new(record.id),
            start,
            end,
            tags,
            Some(record.description),
        )
    }
}

/// Formats a timestamp as RFC 3339 UTC without losing sub-second precision.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses a stored timestamp.
///
/// Accepts RFC 3339 with any offset, or a naive ISO-8601 date-time which is
/// taken to be local time.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, EntryError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| EntryError::InvalidTimestamp {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use insta::assert_snapshot;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, hour, minute, 0).unwrap()
    }

    fn tags(names: &[&str]) -> Vec<Tag> {
        names.iter().map(|name| Tag::new(name).unwrap()).collect()
    }

    #[test]
    fn active_duration_measures_up_to_now() {
        let entry = Entry::new(EntryId::new(1), at(9, 0), tags(&["work"]), None);
        assert!(entry.is_active());
        assert_eq!(entry.duration(at(9, 45)), TimeDelta::minutes(45));
        assert_eq!(entry.duration(at(10, 0)), TimeDelta::minutes(60));
    }

    #[test]
    fn stopped_duration_ignores_now() {
        let entry =
            Entry::from_parts(EntryId::new(1), at(9, 0), Some(at(9, 30)), vec![], None).unwrap();
        assert!(!entry.is_active());
        assert_eq!(entry.duration(at(12, 0)), TimeDelta::minutes(30));
        assert_eq!(entry.duration(at(8, 0)), TimeDelta::minutes(30));
    }

    #[test]
    fn active_duration_before_start_is_zero() {
        let entry = Entry::new(EntryId::new(1), at(9, 0), vec![], None);
        assert_eq!(entry.duration(at(8, 0)), TimeDelta::zero());
    }

    #[test]
    fn from_parts_rejects_end_before_start() {
        let err = Entry::from_parts(EntryId::new(7), at(9, 0), Some(at(8, 59)), vec![], None)
            .unwrap_err();
        assert!(matches!(err, EntryError::EndBeforeStart { id, .. } if id == EntryId::new(7)));
    }

    #[test]
    fn zero_length_entry_is_allowed() {
        let entry =
            Entry::from_parts(EntryId::new(1), at(9, 0), Some(at(9, 0)), vec![], None).unwrap();
        assert_eq!(entry.duration(at(10, 0)), TimeDelta::zero());
    }

    #[test]
    fn tag_trims_and_rejects_blank() {
        assert_eq!(Tag::new("  work ").unwrap().as_str(), "work");
        assert_eq!(Tag::new("   "), Err(EntryError::EmptyTag));
        assert_ne!(Tag::new("Work").unwrap(), Tag::new("work").unwrap());
    }

    #[test]
    fn duplicate_tags_are_collapsed_in_order() {
        let entry = Entry::new(EntryId::new(1), at(9, 0), tags(&["b", "a", "b"]), None);
        assert_eq!(entry.tags(), tags(&["b", "a"]).as_slice());
    }

    #[test]
    fn blank_description_becomes_none() {
        let entry = Entry::new(EntryId::new(1), at(9, 0), vec![], Some("  ".to_string()));
        assert_eq!(entry.description(), None);
    }

    #[test]
    fn has_any_tag_checks_intersection() {
        let entry = Entry::new(EntryId::new(1), at(9, 0), tags(&["work", "api"]), None);
        assert!(entry.has_any_tag(&tags(&["api", "home"])));
        assert!(!entry.has_any_tag(&tags(&["home"])));
        assert!(!entry.has_any_tag(&[]));
    }

    #[test]
    fn entry_serde_roundtrip() {
        let entry = Entry::from_parts(
            EntryId::new(1_735_722_000),
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap() + TimeDelta::nanoseconds(123_456_789),
            Some(at(9, 30)),
            tags(&["work", "api"]),
            Some("standup notes".to_string()),
        )
        .unwrap();

        let json = serde_json::to_string(&entry).unwrap();
        let parsed: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);

        let active = Entry::new(EntryId::new(2), at(10, 0), vec![], None);
        let json = serde_json::to_string(&active).unwrap();
        let parsed: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, active);
    }

    #[test]
    fn record_layout_matches_document_format() {
        let entry = Entry::from_parts(
            EntryId::new(1_735_722_000),
            at(9, 0),
            Some(at(9, 30)),
            tags(&["work", "api"]),
            Some("standup notes".to_string()),
        )
        .unwrap();

        assert_snapshot!(serde_json::to_string_pretty(&entry).unwrap(), @r#"
        {
          "id": 1735722000,
          "start_time": "2025-01-01T09:00:00Z",
          "end_time": "2025-01-01T09:30:00Z",
          "tags": [
            "work",
            "api"
          ],
          "description": "standup notes"
        }
        "#);
    }

    #[test]
    fn record_tolerates_missing_end_and_null_description() {
        let json = r#"{"id": 5, "start_time": "2025-01-01T09:00:00Z", "tags": [], "description": null}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id(), EntryId::new(5));
        assert!(entry.is_active());
        assert_eq!(entry.description(), None);
    }

    #[test]
    fn record_rejects_malformed_timestamp() {
        let json = r#"{"id": 5, "start_time": "yesterday", "end_time": null, "tags": [], "description": ""}"#;
        assert!(serde_json::from_str::<Entry>(json).is_err());
    }

    #[test]
    fn record_rejects_end_before_start() {
        let json = r#"{"id": 5, "start_time": "2025-01-01T10:00:00Z", "end_time": "2025-01-01T09:00:00Z", "tags": [], "description": ""}"#;
        assert!(serde_json::from_str::<Entry>(json).is_err());
    }

    #[test]
    fn parse_timestamp_accepts_offsets() {
        let parsed = parse_timestamp("2025-01-01T10:00:00+01:00").unwrap();
        assert_eq!(parsed, at(9, 0));
    }

    #[test]
    fn parse_timestamp_accepts_naive_local_time() {
        let parsed = parse_timestamp("2024-01-15T10:30:00.123456").unwrap();
        let local = parsed.with_timezone(&Local).naive_local();
        assert_eq!(
            local,
            NaiveDateTime::parse_from_str("2024-01-15T10:30:00.123456", "%Y-%m-%dT%H:%M:%S%.f")
                .unwrap()
        );

        assert!(parse_timestamp("2024-01-15T10:30:00").is_ok());
        assert!(parse_timestamp("2024-01-15 10:30:00").is_ok());
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert_eq!(
            parse_timestamp("not a time"),
            Err(EntryError::InvalidTimestamp {
                value: "not a time".to_string()
            })
        );
    }

    #[test]
    fn entry_id_parses_from_str() {
        assert_eq!(" 42 ".parse::<EntryId>().unwrap(), EntryId::new(42));
        assert!("abc".parse::<EntryId>().is_err());
    }
}
