use std::io::Write;

use queuectl_job_queue::JobSpec;

use crate::error::CliError;
use crate::state::AppState;

/// `enqueue '<json>'`
pub async fn enqueue(state: &AppState, job_json: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let spec = JobSpec::from_json(job_json)?;
    let job = state.queue.enqueue(spec).await?;
    writeln!(out, "[OK] Job '{}' enqueued", job.id)?;
    Ok(())
}
