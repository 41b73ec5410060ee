//! Read-only rollups over entries.
//!
//! Nothing here mutates entries or reads the clock: durations take `now`,
//! calendar bucketing takes the time zone the caller renders in.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use serde::Serialize;

use crate::entry::Entry;

/// Bucket for entries without tags.
pub const UNTAGGED: &str = "(no tags)";

/// Sum of the durations of `entries` at `now`.
pub fn total_duration<'a>(
    entries: impl IntoIterator<Item = &'a Entry>,
    now: DateTime<Utc>,
) -> TimeDelta {
    entries
        .into_iter()
        .fold(TimeDelta::zero(), |total, entry| total + entry.duration(now))
}

/// Summed duration per tag.
///
/// An entry counts fully toward each of its tags; untagged entries go to
/// [`UNTAGGED`].
pub fn durations_by_tag<'a>(
    entries: impl IntoIterator<Item = &'a Entry>,
    now: DateTime<Utc>,
) -> BTreeMap<String, TimeDelta> {
    let mut totals: BTreeMap<String, TimeDelta> = BTreeMap::new();
    for entry in entries {
        let duration = entry.duration(now);
        if entry.tags().is_empty() {
            *totals
                .entry(UNTAGGED.to_string())
                .or_insert_with(TimeDelta::zero) += duration;
        }
        for tag in entry.tags() {
            *totals.entry(tag.to_string()).or_insert_with(TimeDelta::zero) += duration;
        }
    }
    totals
}

/// `part` as a percentage of `whole`, or `0.0` when `whole` is zero.
#[expect(
    clippy::cast_precision_loss,
    reason = "millisecond totals stay far below 2^52"
)]
pub fn percentage(part: TimeDelta, whole: TimeDelta) -> f64 {
    let whole = whole.num_milliseconds();
    if whole == 0 {
        return 0.0;
    }
    part.num_milliseconds() as f64 / whole as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagDuration {
    pub tag: String,
    pub duration: TimeDelta,
    pub percentage: f64,
}

/// Per-tag totals and their share of the overall total.
#[derive(Debug, Clone, PartialEq)]
pub struct TagBreakdown {
    pub total: TimeDelta,
    /// Longest first; ties sorted by name.
    pub tags: Vec<TagDuration>,
}

pub fn tag_breakdown<'a>(
    entries: impl IntoIterator<Item = &'a Entry>,
    now: DateTime<Utc>,
) -> TagBreakdown {
    let entries: Vec<&Entry> = entries.into_iter().collect();
    let total = total_duration(entries.iter().copied(), now);

    let mut tags: Vec<TagDuration> = durations_by_tag(entries, now)
        .into_iter()
        .map(|(tag, duration)| TagDuration {
            tag,
            duration,
            percentage: percentage(duration, total),
        })
        .collect();
    tags.sort_by(|a, b| b.duration.cmp(&a.duration).then_with(|| a.tag.cmp(&b.tag)));

    TagBreakdown { total, tags }
}

/// Whole minutes tracked per calendar day.
///
/// Only completed entries count. Each entry goes entirely to the day it
/// started in `tz`; a day's durations are summed before flooring.
pub fn daily_minutes<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a Entry>,
    tz: &Tz,
) -> BTreeMap<NaiveDate, i64> {
    let mut totals: BTreeMap<NaiveDate, TimeDelta> = BTreeMap::new();
    for entry in entries {
        let Some(end) = entry.end() else {
            continue;
        };
        *totals
            .entry(local_day(entry.start(), tz))
            .or_insert_with(TimeDelta::zero) += end - entry.start();
    }
    totals
        .into_iter()
        .map(|(day, total)| (day, total.num_minutes()))
        .collect()
}

/// Buckets daily minutes into heatmap levels 0 through 4.
pub const fn contribution_level(minutes: i64) -> u8 {
    match minutes {
        ..=0 => 0,
        1..30 => 1,
        30..60 => 2,
        60..120 => 3,
        _ => 4,
    }
}

/// Runs of consecutive days with completed work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streak {
    /// Run ending today; zero if nothing was completed today.
    pub current: u32,
    pub best: u32,
}

/// Streak per tag over completed, tagged entries.
pub fn streaks<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a Entry>,
    today: NaiveDate,
    tz: &Tz,
) -> BTreeMap<String, Streak> {
    let mut days: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
    for entry in entries.into_iter().filter(|entry| !entry.is_active()) {
        let day = local_day(entry.start(), tz);
        for tag in entry.tags() {
            days.entry(tag.to_string()).or_default().insert(day);
        }
    }
    days.into_iter()
        .map(|(tag, days)| (tag, streak_over(&days, today)))
        .collect()
}

/// Streak over all completed entries regardless of tags.
pub fn overall_streak<'a, Tz: TimeZone>(
    entries: impl IntoIterator<Item = &'a Entry>,
    today: NaiveDate,
    tz: &Tz,
) -> Streak {
    let days: BTreeSet<NaiveDate> = entries
        .into_iter()
        .filter(|entry| !entry.is_active())
        .map(|entry| local_day(entry.start(), tz))
        .collect();
    streak_over(&days, today)
}

fn streak_over(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> Streak {
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(day);
    }

    let mut current = 0;
    let mut cursor = Some(today);
    while let Some(day) = cursor.filter(|day| days.contains(day)) {
        current += 1;
        cursor = day.pred_opt();
    }

    Streak { current, best }
}

fn local_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}
