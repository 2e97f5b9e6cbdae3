pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod datetime;
pub mod group;
pub mod render;
pub mod scheduler;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting tickler CLI");

    let cfg = config::Config::load(cli.config.as_deref())?;

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let cache = store::TaskCache::open(&data_dir)
        .with_context(|| format!("failed to open task cache at {}", data_dir.display()))?;

    let mut renderer = render::Renderer::new(&cfg);
    let command = cli.command.unwrap_or(cli::Command::Schedule);

    commands::dispatch(&cache, &cfg, &mut renderer, command)?;

    info!("done");
    Ok(())
}
