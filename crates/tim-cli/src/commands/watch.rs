//! Watch command: live status refreshed once per second.
//!
//! Runs on a single-threaded tokio runtime. Every tick reloads the store and
//! samples the clock again, so sessions started or stopped from another
//! terminal show up and elapsed time is never cached. Load warnings are
//! printed when they first appear or change, not on every tick.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tim_core::{Clock, LoadWarning, Storage, Tracker};

use super::status::status_line;
use super::write_warnings;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Prints a status line per tick until Ctrl-C, or after `count` ticks.
pub fn run<W, E, S, C>(
    writer: &mut W,
    errors: &mut E,
    tracker: &mut Tracker<S>,
    clock: &C,
    count: Option<u64>,
) -> Result<()>
where
    W: Write,
    E: Write,
    S: Storage,
    C: Clock,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start watch runtime")?;
    runtime.block_on(watch(writer, errors, tracker, clock, count))
}

async fn watch<W, E, S, C>(
    writer: &mut W,
    errors: &mut E,
    tracker: &mut Tracker<S>,
    clock: &C,
    count: Option<u64>,
) -> Result<()>
where
    W: Write,
    E: Write,
    S: Storage,
    C: Clock,
{
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut reported: Vec<LoadWarning> = Vec::new();
    let mut ticks = 0;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!(ticks, "watch interrupted");
                break;
            }
            _ = interval.tick() => {
                tracker.reload().context("failed to reload entries")?;
                let warnings = tracker.take_warnings();
                if warnings != reported {
                    write_warnings(errors, &warnings)?;
                    reported = warnings;
                }

                writeln!(writer, "{}", status_line(tracker.active_entry(), clock.now()))?;
                writer.flush()?;

                ticks += 1;
                if count.is_some_and(|limit| ticks >= limit) {
                    break;
                }
            }
        }
    }

    Ok(())
}
