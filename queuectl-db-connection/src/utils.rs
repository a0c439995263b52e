use std::borrow::Cow;

use serde_json::json;

use crate::config::DbConnectionConfig;

pub fn config_metadata(config: &DbConnectionConfig) -> serde_json::Value {
    json!({
        "database_url": sanitize_database_url(&config.url).as_ref(),
        "max_connections": config.max_connections,
        "min_connections": config.min_connections,
        "connect_timeout_secs": config.connect_timeout_secs,
        "idle_timeout_secs": config.idle_timeout_secs,
        "busy_timeout_secs": config.busy_timeout_secs,
    })
}

/// Strips query parameters from a SQLite URL before it is logged; they can carry
/// `vfs`/`key` style options that do not belong in log output.
pub fn sanitize_database_url(raw: &str) -> Cow<'_, str> {
    match raw.find('?') {
        Some(idx) => {
            let mut result = String::with_capacity(idx + 11);
            result.push_str(&raw[..idx]);
            result.push_str("?<redacted>");
            Cow::Owned(result)
        }
        None => Cow::Borrowed(raw),
    }
}
