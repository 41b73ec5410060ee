//! Status command for showing the running session.

use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tim_core::{Entry, Storage, Tracker};

use super::util::{format_duration, format_time, join_tags};

/// One-line summary of the running session, measured up to `now`.
pub fn status_line(active: Option<&Entry>, now: DateTime<Utc>) -> String {
    let Some(entry) = active else {
        return "NOT TRACKING".to_string();
    };

    let mut line = format!("TRACKING: {}", format_duration(entry.duration(now)));
    if !entry.tags().is_empty() {
        line.push_str(&format!(" [{}]", join_tags(entry.tags())));
    }
    if let Some(description) = entry.description() {
        line.push_str(&format!(" - {description}"));
    }
    line
}

pub fn run<W, S, Tz>(writer: &mut W, tracker: &Tracker<S>, now: &DateTime<Tz>) -> Result<()>
where
    W: Write,
    S: Storage,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let tz = now.timezone();
    let active = tracker.active_entry();

    writeln!(writer, "{}", status_line(active, now.with_timezone(&Utc)))?;
    if let Some(entry) = active {
        writeln!(writer, "Started: {}", format_time(entry.start(), &tz))?;
        writeln!(writer, "Id: {}", entry.id())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::commands::test_support::{at, done, render, running, tracker_with};

    #[test]
    fn status_shows_running_session() {
        let tracker = tracker_with(vec![
            done(at(1, 8, 0), 30, &["admin"], "email"),
            running(at(1, 9, 0), &["work", "api"], "review"),
        ]);
        let output = render(|out| run(out, &tracker, &at(1, 9, 42)));

        assert_snapshot!(output, @r"
        TRACKING: 00:42:00 [work, api] - review
        Started: 2025-01-01 09:00:00
        Id: 1735722000
        ");
    }

    #[test]
    fn status_when_idle() {
        let tracker = tracker_with(vec![done(at(1, 8, 0), 30, &[], "email")]);
        let output = render(|out| run(out, &tracker, &at(1, 9, 0)));
        assert_snapshot!(output, @"NOT TRACKING");
    }

    #[test]
    fn status_line_omits_missing_parts() {
        let tracker = tracker_with(vec![tim_core::Entry::new(
            tim_core::EntryId::new(1),
            at(1, 9, 0),
            [],
            None,
        )]);
        assert_eq!(
            status_line(tracker.active_entry(), at(1, 9, 0) + chrono::TimeDelta::seconds(5)),
            "TRACKING: 00:00:05"
        );
    }
}
