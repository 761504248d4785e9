pub mod advisor;
pub mod checklist;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod projection;
pub mod render;
pub mod session;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting zenith"
  );
  debug!(
    count = pre.rc_overrides.len(),
    "preprocessed rc overrides"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let slots =
    datastore::SlotStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let key = cfg
    .get("storage.key")
    .unwrap_or_else(|| {
      store::DEFAULT_STORAGE_KEY
        .to_string()
    });
  let mut store =
    store::TaskStore::open(slots, &key);
  if let store::LoadOutcome::Corrupt(
    reason
  ) = store.load_outcome()
  {
    warn!(%reason, "continuing with an empty task list");
  }

  let renderer =
    render::Renderer::new(&cfg)?;
  let advisor = advisor::Advisor::gemini(
    advisor::AdvisorSettings::from_config(
      &cfg
    )?
  )?;

  let mut env = commands::CommandEnv {
    store: &mut store,
    cfg: &cfg,
    renderer: &renderer,
    advisor: &advisor,
    out: io::stdout().lock()
  };
  commands::dispatch(
    &mut env,
    cli.command,
    Utc::now()
  )?;

  info!("done");
  Ok(())
}
