use std::io::Write;

use queuectl_job_queue::SettingKey;

use crate::error::CliError;
use crate::output;
use crate::state::AppState;

/// `config get [key]`
pub async fn get(state: &AppState, key: Option<&str>, out: &mut dyn Write) -> Result<(), CliError> {
    let settings = state.queue.settings().await?;
    match key {
        Some(raw) => {
            let key: SettingKey = raw.parse()?;
            writeln!(out, "{}: {}", key.display_name(), settings.get(key))?;
        }
        None => output::settings(out, &settings)?,
    }
    Ok(())
}

/// `config set <key> <value>`
pub async fn set(
    state: &AppState,
    key: &str,
    value: &str,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let settings = state.queue.set_setting(key, value).await?;
    let key: SettingKey = key.parse()?;
    writeln!(
        out,
        "[OK] Configuration updated: {} = {}",
        key.display_name(),
        settings.get(key)
    )?;
    Ok(())
}
