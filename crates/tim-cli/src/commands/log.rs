//! Log command: every entry, newest first.

use std::cmp::Reverse;
use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tim_core::{Entry, EntryRecord, Storage, Tracker};

use super::util::{format_duration, format_time, join_tags, parse_tags};

pub fn run<W, S, Tz>(
    writer: &mut W,
    tracker: &Tracker<S>,
    now: &DateTime<Tz>,
    tags: &[String],
    json: bool,
) -> Result<()>
where
    W: Write,
    S: Storage,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let tz = now.timezone();
    let now = now.with_timezone(&Utc);
    let filter = parse_tags(tags)?;

    let mut entries = tracker.entries_by_tags(&filter);
    entries.sort_by_key(|entry| Reverse((entry.start(), entry.id())));

    if json {
        let records: Vec<EntryRecord> = entries.into_iter().map(EntryRecord::from).collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&records)?)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(writer, "No entries found.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<10}  {:<19}  {:<19}  {:>8}  {:<16}  DESCRIPTION",
        "ID", "START", "END", "DURATION", "TAGS"
    )?;
    for entry in entries {
        writeln!(writer, "{}", format_row(entry, now, &tz))?;
    }

    Ok(())
}

fn format_row<Tz: TimeZone>(entry: &Entry, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    let end = entry
        .end()
        .map_or_else(|| "Active".to_string(), |end| format_time(end, tz));
    let row = format!(
        "{:<10}  {:<19}  {:<19}  {:>8}  {:<16}  {}",
        entry.id(),
        format_time(entry.start(), tz),
        end,
        format_duration(entry.duration(now)),
        join_tags(entry.tags()),
        entry.description().unwrap_or_default()
    );
    row.trim_end().to_string()
}
