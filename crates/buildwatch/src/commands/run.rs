//! `buildwatch run`: the long-running service.

use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};

use buildwatch_core::AlertEngine;

use crate::alerters;
use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;
use crate::ingest;

use super::{open_input, print_builds};

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let engine_config = config::engine_config(&cfg, &args)?;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match args.input {
        Some(ref path) => open_input(path).await?,
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let alerters = alerters::from_config(&cfg.alerters);
    if alerters.is_empty() {
        warn!("no alerters enabled, state changes are tracked but not announced");
    }
    let engine = AlertEngine::start(engine_config, alerters);
    info!(alerters = ?engine.alerters(), "buildwatch running");

    let ingested = tokio::select! {
        result = ingest::ingest(reader, &engine, |builds| {
            if let Err(e) = print_builds(builds, global) {
                warn!(error = %e, "failed to print status");
            }
        }) => result.map(Some),
        () = interrupted() => {
            info!("interrupted, shutting down");
            Ok(None)
        }
    };

    // Close even when ingestion failed so alerters are not cut off mid-call.
    let closed = engine.close().await;
    ingested?;
    closed?;
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
