use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tim_core::{Clock, Storage, SystemClock, Tracker};
use tracing_subscriber::EnvFilter;

use tim_cli::commands::{
    delete, graph, log, report_warnings, start, status, stop, streaks, summary, tags, watch,
};
use tim_cli::{Cli, Commands, Config};

/// Load config, open the configured backend and load the entries.
fn open_tracker(config_path: Option<&Path>) -> Result<(Tracker<Box<dyn Storage>>, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let storage = config.open_storage()?;
    let tracker = Tracker::load(storage).context("failed to load entries")?;
    Ok((tracker, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let clock = SystemClock;
    let (mut tracker, config) = open_tracker(cli.config.as_deref())?;
    // watch reports its own warnings as they change
    if !matches!(command, Commands::Watch { .. }) {
        report_warnings(&mut tracker)?;
    }
    let now = clock.now().with_timezone(&Local);
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Start {
            tags,
            description,
            at,
        } => start::run(
            &mut stdout,
            &mut tracker,
            &now,
            tags,
            description.clone(),
            at.as_deref(),
        )?,
        Commands::Stop { at } => stop::run(&mut stdout, &mut tracker, &now, at.as_deref())?,
        Commands::Status => status::run(&mut stdout, &tracker, &now)?,
        Commands::Log { tags, json } => log::run(&mut stdout, &tracker, &now, tags, *json)?,
        Commands::Delete { id } => delete::run(&mut stdout, &mut tracker, *id)?,
        Commands::Summary { days, tags, json } => summary::run(
            &mut stdout,
            &tracker,
            &now,
            days.unwrap_or(config.summary_days),
            tags,
            *json,
        )?,
        Commands::Streaks { json } => streaks::run(&mut stdout, &tracker, &now, *json)?,
        Commands::Graph { weeks } => graph::run(
            &mut stdout,
            &tracker,
            &now,
            weeks.unwrap_or(config.graph_weeks),
        )?,
        Commands::Tags => tags::run(&mut stdout, &tracker)?,
        Commands::Watch { count } => watch::run(
            &mut stdout,
            &mut std::io::stderr(),
            &mut tracker,
            &clock,
            *count,
        )?,
    }

    Ok(())
}
