use std::io::Write;

use crate::error::CliError;
use crate::output;
use crate::state::AppState;

/// `dlq list`
pub async fn list(
    state: &AppState,
    limit: u32,
    offset: u32,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let jobs = state.queue.dlq_list(limit, offset).await?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &jobs)?;
        writeln!(out)?;
    } else if jobs.is_empty() {
        writeln!(out, "DLQ is empty")?;
    } else {
        output::job_table(out, &jobs, false)?;
    }
    Ok(())
}

/// `dlq retry <id>`
pub async fn retry(state: &AppState, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let job = state.queue.retry_from_dlq(id).await?;
    writeln!(out, "[OK] Job '{}' moved back to the queue", job.id)?;
    Ok(())
}
