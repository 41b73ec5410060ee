//! Start command: begins a new session, stopping the running one first.

use std::fmt::Display;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use tim_core::{Entry, Storage, Tracker};

use super::util::{entry_label, format_duration, format_time, parse_datetime, parse_tags};

pub fn run<W, S, Tz>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    now: &DateTime<Tz>,
    tags: &[String],
    description: Option<String>,
    at: Option<&str>,
) -> Result<()>
where
    W: Write,
    S: Storage,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let tz = now.timezone();
    let now = now.with_timezone(&Utc);
    let start = at
        .map(|value| parse_datetime(value, now))
        .transpose()?
        .unwrap_or(now);
    let tags = parse_tags(tags)?;

    let previous = tracker.active_entry().map(Entry::id);
    let entry = tracker
        .start_tracking(tags, description, start)
        .context("failed to start tracking")?;

    if let Some(stopped) =
        previous.and_then(|id| tracker.entries().iter().find(|entry| entry.id() == id))
    {
        writeln!(
            writer,
            "Stopped tracking: {} ({})",
            entry_label(stopped),
            format_duration(stopped.duration(now))
        )?;
    }
    writeln!(
        writer,
        "Started tracking: {} at {} (id {})",
        entry_label(&entry),
        format_time(entry.start(), &tz),
        entry.id()
    )?;

    Ok(())
}
