use std::io::Write;

use crate::error::CliError;
use crate::output;
use crate::state::AppState;

/// `show <id> [--json]`
pub async fn show(state: &AppState, id: &str, json: bool, out: &mut dyn Write) -> Result<(), CliError> {
    let job = state.queue.get(id).await?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &job)?;
        writeln!(out)?;
    } else {
        output::job_detail(out, &job)?;
    }
    Ok(())
}
