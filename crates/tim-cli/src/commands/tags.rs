//! Tags command.

use std::io::Write;

use anyhow::Result;
use tim_core::{Storage, Tracker};

pub fn run<W: Write, S: Storage>(writer: &mut W, tracker: &Tracker<S>) -> Result<()> {
    let tags = tracker.known_tags();
    if tags.is_empty() {
        writeln!(writer, "No tags yet.")?;
        return Ok(());
    }
    for tag in tags {
        writeln!(writer, "{tag}")?;
    }
    Ok(())
}
