//! Human readable rendering for command output.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use queuectl_job_queue::{Job, QueueSettings, QueueStats, WorkerInfo};

const COMMAND_WIDTH: usize = 30;
const ID_WIDTH: usize = 20;

/// Shorten `s` to at most `width` characters, marking the cut with `...`.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_owned();
    }
    let keep = width.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Job table. `with_state` is false for DLQ listings, where every row is dead.
pub fn job_table(out: &mut dyn Write, jobs: &[Job], with_state: bool) -> io::Result<()> {
    if with_state {
        writeln!(
            out,
            "{:<ID_WIDTH$} {:<12} {:<COMMAND_WIDTH$} {:<8} {:<19}",
            "ID", "STATE", "COMMAND", "ATTEMPTS", "UPDATED"
        )?;
        writeln!(out, "{}", "=".repeat(ID_WIDTH + COMMAND_WIDTH + 43))?;
    } else {
        writeln!(
            out,
            "{:<ID_WIDTH$} {:<COMMAND_WIDTH$} {:<8} {:<19} LAST ERROR",
            "ID", "COMMAND", "ATTEMPTS", "UPDATED"
        )?;
        writeln!(out, "{}", "=".repeat(ID_WIDTH + COMMAND_WIDTH + 41))?;
    }

    for job in jobs {
        let command = truncate(&job.command, COMMAND_WIDTH);
        let updated = timestamp(job.updated_at);
        if with_state {
            writeln!(
                out,
                "{:<ID_WIDTH$} {:<12} {:<COMMAND_WIDTH$} {:<8} {:<19}",
                job.id,
                job.state.as_str(),
                command,
                job.attempts,
                updated
            )?;
        } else {
            writeln!(
                out,
                "{:<ID_WIDTH$} {:<COMMAND_WIDTH$} {:<8} {:<19} {}",
                job.id,
                command,
                job.attempts,
                updated,
                job.last_error.as_deref().unwrap_or("-")
            )?;
        }
    }
    Ok(())
}

/// Every field of one job, one per line.
pub fn job_detail(out: &mut dyn Write, job: &Job) -> io::Result<()> {
    let opt_time = |at: Option<DateTime<Utc>>| at.map(timestamp).unwrap_or_else(|| "-".into());
    writeln!(out, "id:          {}", job.id)?;
    writeln!(out, "command:     {}", job.command)?;
    writeln!(out, "state:       {}", job.state)?;
    writeln!(out, "attempts:    {}", job.attempts)?;
    match job.max_retries {
        Some(n) => writeln!(out, "max_retries: {n}")?,
        None => writeln!(out, "max_retries: (queue default)")?,
    }
    writeln!(out, "ready_at:    {}", timestamp(job.ready_at))?;
    writeln!(out, "owner:       {}", job.owner.as_deref().unwrap_or("-"))?;
    writeln!(out, "claimed_at:  {}", opt_time(job.claimed_at))?;
    writeln!(out, "last_error:  {}", job.last_error.as_deref().unwrap_or("-"))?;
    writeln!(out, "created_at:  {}", timestamp(job.created_at))?;
    writeln!(out, "updated_at:  {}", timestamp(job.updated_at))?;
    Ok(())
}

pub fn status(out: &mut dyn Write, stats: &QueueStats, workers: &[WorkerInfo]) -> io::Result<()> {
    writeln!(out, "Job States:")?;
    writeln!(out, "  Pending:    {}", stats.pending)?;
    writeln!(out, "  Processing: {}", stats.processing)?;
    writeln!(out, "  Completed:  {}", stats.completed)?;
    writeln!(out, "  Failed:     {}", stats.failed)?;
    writeln!(out, "  Dead (DLQ): {}", stats.dead)?;
    writeln!(out, "  Total:      {}", stats.total)?;
    writeln!(out)?;
    writeln!(out, "Active Workers: {}", workers.len())?;
    for w in workers {
        writeln!(
            out,
            "  {}  pid={}  host={}  heartbeat={}{}",
            w.id,
            w.pid,
            w.hostname.as_deref().unwrap_or("-"),
            timestamp(w.heartbeat_at),
            if w.stop_requested { "  (stopping)" } else { "" }
        )?;
    }
    Ok(())
}

pub fn settings(out: &mut dyn Write, settings: &QueueSettings) -> io::Result<()> {
    for (key, value) in settings.iter() {
        writeln!(out, "{}: {}", key.display_name(), value)?;
    }
    Ok(())
}
