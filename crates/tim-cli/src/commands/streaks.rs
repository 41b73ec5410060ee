//! Streaks command: consecutive days of completed work per tag.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone};
use tim_core::aggregate::streaks;
use tim_core::{Storage, Tracker};

pub fn run<W, S, Tz>(writer: &mut W, tracker: &Tracker<S>, now: &DateTime<Tz>, json: bool) -> Result<()>
where
    W: Write,
    S: Storage,
    Tz: TimeZone,
{
    let streaks = streaks(tracker.entries(), now.date_naive(), &now.timezone());

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&streaks)?)?;
        return Ok(());
    }

    if streaks.is_empty() {
        writeln!(writer, "No completed tagged entries yet.")?;
        return Ok(());
    }

    writeln!(writer, "{:<20} {:>8} {:>8}", "TAG", "CURRENT", "BEST")?;
    for (tag, streak) in &streaks {
        writeln!(writer, "{tag:<20} {:>8} {:>8}", streak.current, streak.best)?;
    }

    Ok(())
}
