pub mod category;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod progress;
pub mod render;
pub mod selection;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdeck"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(
    files = ?cfg.loaded_files,
    "configuration resolved"
  );

  let calendar =
    datetime::Calendar::resolve(&cfg);
  let renderer =
    render::Renderer::new(&cfg)?;
  let command =
    cli.command.unwrap_or_default();

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_time()
      .build()
      .context(
        "failed to build async runtime"
      )?;

  runtime.block_on(async {
    let stores = store::open_stores(
      &cfg,
      cli.data.as_deref()
    )?;
    let mut controller =
      controller::Controller::new(
        stores, calendar
      );
    commands::dispatch(
      &mut controller,
      &renderer,
      command
    )
    .await
  })?;

  info!("done");
  Ok(())
}
