//! `buildwatch replay`: apply a request file without alerters and print
//! the resulting tree.

use tracing::debug;

use buildwatch_core::AlertEngine;

use crate::cli::{GlobalOpts, ReplayArgs};
use crate::config;
use crate::error::CliError;
use crate::ingest;

use super::{open_input, print_builds};

pub async fn handle(args: ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let engine_config = config::load(global)?.engine_config()?;
    let reader = open_input(&args.file).await?;

    let engine = AlertEngine::start(engine_config, Vec::new());
    let ingested = ingest::ingest(reader, &engine, |builds| {
        if let Err(e) = print_builds(builds, global) {
            debug!(error = %e, "failed to print status");
        }
    })
    .await;
    let builds = engine.builds();
    engine.close().await?;

    let stats = ingested?;
    debug!(applied = stats.applied, skipped = stats.skipped, "replay finished");
    print_builds(&builds, global)
}
