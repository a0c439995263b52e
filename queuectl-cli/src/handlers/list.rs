use std::io::Write;

use queuectl_job_queue::JobFilter;

use crate::cli::ListArgs;
use crate::error::CliError;
use crate::output;
use crate::state::AppState;

/// `list [--state S] [--limit N] [--offset N] [--json]`
pub async fn list(state: &AppState, args: &ListArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let filter = JobFilter {
        state: args.state,
        limit: args.limit,
        offset: args.offset,
    };
    let jobs = state.queue.list(&filter).await?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &jobs)?;
        writeln!(out)?;
        return Ok(());
    }
    if jobs.is_empty() {
        match args.state {
            Some(s) => writeln!(out, "No jobs found with state '{s}'")?,
            None => writeln!(out, "No jobs found")?,
        }
        return Ok(());
    }
    output::job_table(out, &jobs, true)?;
    Ok(())
}
