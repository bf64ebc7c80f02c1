//! Command handlers.

pub mod config_cmd;
pub mod replay;
pub mod run;

use tokio::io::{AsyncBufRead, BufReader};

use buildwatch_core::Builds;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Open a request file for buffered async reading.
pub(crate) async fn open_input(
    path: &std::path::Path,
) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| CliError::Input {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Render and print a build tree in the selected output format.
pub(crate) fn print_builds(builds: &Builds, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let rendered = output::render_builds(global.output, builds, color)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
