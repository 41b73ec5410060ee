//! Summary command: time per tag over the last days.
//!
//! Only completed entries that started inside the window count. Percentages
//! are shares of the window's total, so an entry with several tags can make
//! the per-tag column add up to more than 100%.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::Serialize;
use tim_core::aggregate::tag_breakdown;
use tim_core::{Entry, Storage, TagBreakdown, Tracker};

use super::util::{format_duration, parse_tags};

const MAX_SUMMARY_DAYS: u32 = 1000 * 365;

#[derive(Debug, Serialize)]
struct SummaryJson {
    days: u32,
    total_seconds: i64,
    tags: Vec<TagJson>,
}

#[derive(Debug, Serialize)]
struct TagJson {
    tag: String,
    seconds: i64,
    percentage: f64,
}

impl SummaryJson {
    fn new(days: u32, breakdown: &TagBreakdown) -> Self {
        Self {
            days,
            total_seconds: breakdown.total.num_seconds(),
            tags: breakdown
                .tags
                .iter()
                .map(|tag| TagJson {
                    tag: tag.tag.clone(),
                    seconds: tag.duration.num_seconds(),
                    percentage: tag.percentage,
                })
                .collect(),
        }
    }
}

pub fn run<W, S, Tz>(
    writer: &mut W,
    tracker: &Tracker<S>,
    now: &DateTime<Tz>,
    days: u32,
    tags: &[String],
    json: bool,
) -> Result<()>
where
    W: Write,
    S: Storage,
    Tz: TimeZone,
{
    if days > MAX_SUMMARY_DAYS {
        anyhow::bail!("Summary window too large: {days} days (max {MAX_SUMMARY_DAYS})");
    }
    let now = now.with_timezone(&Utc);
    let since = now - TimeDelta::days(i64::from(days));
    let filter = parse_tags(tags)?;

    let entries: Vec<&Entry> = tracker
        .entries_by_tags(&filter)
        .into_iter()
        .filter(|entry| !entry.is_active() && entry.start() >= since)
        .collect();
    let breakdown = tag_breakdown(entries.iter().copied(), now);

    if json {
        let output = serde_json::to_string_pretty(&SummaryJson::new(days, &breakdown))?;
        writeln!(writer, "{output}")?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(writer, "No completed entries in the last {days} days")?;
        return Ok(());
    }

    writeln!(writer, "Summary - Last {days} Days")?;
    writeln!(writer)?;
    for tag in &breakdown.tags {
        writeln!(
            writer,
            "{:<20} {:>10} ({:5.1}%)",
            tag.tag,
            format_duration(tag.duration),
            tag.percentage
        )?;
    }
    writeln!(writer)?;
    writeln!(writer, "{:<20} {:>10}", "Total", format_duration(breakdown.total))?;

    Ok(())
}
