//! Delete command.

use std::io::Write;

use anyhow::{Context, Result};
use tim_core::{EntryId, Storage, Tracker};

use super::util::entry_label;

pub fn run<W: Write, S: Storage>(writer: &mut W, tracker: &mut Tracker<S>, id: EntryId) -> Result<()> {
    match tracker
        .delete_entry(id)
        .with_context(|| format!("failed to delete entry {id}"))?
    {
        Some(entry) => writeln!(writer, "Deleted entry {id}: {}", entry_label(&entry))?,
        None => writeln!(writer, "No entry with id {id}")?,
    }
    Ok(())
}
