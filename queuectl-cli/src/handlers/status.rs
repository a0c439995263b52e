use std::io::Write;

use crate::error::CliError;
use crate::output;
use crate::state::AppState;

/// `status`
pub async fn status(state: &AppState, out: &mut dyn Write) -> Result<(), CliError> {
    let stats = state.queue.stats().await?;
    let workers = state.queue.workers().await?;
    output::status(out, &stats, &workers)?;
    Ok(())
}
