//! CLI subcommand implementations.
//!
//! Commands write to any `io::Write` and take `now` already sampled in the
//! zone to render in, so they run the same against a terminal or a buffer.

pub mod delete;
pub mod graph;
pub mod log;
pub mod start;
pub mod status;
pub mod stop;
pub mod streaks;
pub mod summary;
pub mod tags;
pub mod util;
pub mod watch;

use std::io::{self, Write};

use tim_core::{LoadWarning, Storage, Tracker};

/// Prints and clears the warnings collected while loading.
pub fn report_warnings<S: Storage>(tracker: &mut Tracker<S>) -> io::Result<()> {
    write_warnings(&mut io::stderr(), &tracker.take_warnings())
}

pub fn write_warnings<W: Write>(writer: &mut W, warnings: &[LoadWarning]) -> io::Result<()> {
    for warning in warnings {
        writeln!(writer, "warning: {warning}")?;
    }
    Ok(())
}
