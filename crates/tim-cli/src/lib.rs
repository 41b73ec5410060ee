//! tim command-line library.
//!
//! Argument definitions, configuration and the subcommands of the `tim`
//! binary.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::{Backend, Config};
