//! Graph command: a contribution heatmap of tracked minutes per day.
//!
//! Rows are weekdays starting on Monday, columns are weeks ending with the
//! current one. Days after today are left blank.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Datelike, TimeDelta, TimeZone};
use tim_core::aggregate::{contribution_level, daily_minutes, overall_streak};
use tim_core::{Storage, Tracker};

const LEVEL_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];
const MAX_GRAPH_WEEKS: u32 = 1000;
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub fn run<W, S, Tz>(writer: &mut W, tracker: &Tracker<S>, now: &DateTime<Tz>, weeks: u32) -> Result<()>
where
    W: Write,
    S: Storage,
    Tz: TimeZone,
{
    if weeks > MAX_GRAPH_WEEKS {
        anyhow::bail!("Graph too wide: {weeks} weeks (max {MAX_GRAPH_WEEKS})");
    }
    let weeks = weeks.max(1);
    let tz = now.timezone();
    let today = now.date_naive();
    let minutes = daily_minutes(tracker.entries(), &tz);

    let this_monday = today - TimeDelta::days(i64::from(today.weekday().num_days_from_monday()));
    let first_monday = this_monday - TimeDelta::weeks(i64::from(weeks - 1));

    writeln!(writer, "Activity - Last {weeks} Weeks")?;
    writeln!(writer)?;
    for (offset, label) in (0_i64..).zip(WEEKDAYS) {
        let mut row = format!("{label} ");
        for week in 0..i64::from(weeks) {
            let day = first_monday + TimeDelta::days(week * 7 + offset);
            if day > today {
                row.push_str("  ");
                continue;
            }
            let level = contribution_level(minutes.get(&day).copied().unwrap_or(0));
            row.push(LEVEL_GLYPHS[usize::from(level)]);
            row.push(' ');
        }
        writeln!(writer, "{}", row.trim_end())?;
    }

    let streak = overall_streak(tracker.entries(), today, &tz);
    writeln!(writer)?;
    writeln!(writer, "Less {} More", legend())?;
    writeln!(
        writer,
        "Current streak: {} days, best: {} days",
        streak.current, streak.best
    )?;

    Ok(())
}

fn legend() -> String {
    LEVEL_GLYPHS
        .iter()
        .map(char::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
