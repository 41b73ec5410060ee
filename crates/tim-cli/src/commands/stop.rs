//! Stop command.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use tim_core::{Storage, Tracker};

use super::util::{entry_label, format_duration, parse_datetime};

pub fn run<W, S, Tz>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    now: &DateTime<Tz>,
    at: Option<&str>,
) -> Result<()>
where
    W: Write,
    S: Storage,
    Tz: TimeZone,
{
    let now = now.with_timezone(&Utc);
    let end = at
        .map(|value| parse_datetime(value, now))
        .transpose()?
        .unwrap_or(now);

    match tracker
        .stop_tracking(end)
        .context("failed to stop tracking")?
    {
        Some(entry) => writeln!(
            writer,
            "Stopped tracking: {} ({})",
            entry_label(&entry),
            format_duration(entry.duration(end))
        )?,
        None => writeln!(writer, "No active tracking session")?,
    }

    Ok(())
}
