use std::str::FromStr;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::config::DbConnectionConfig;
use crate::error::DbConnectionError;
use crate::utils::{config_metadata, sanitize_database_url};

pub type DbPool = SqlitePool;

// SQLite memory database patterns for efficient checking
pub const SQLITE_MEMORY_PATTERNS: &[&[u8]] = &[b":memory:", b"mode=memory"];

/// Creates a new SQLite connection pool using the provided configuration.
///
/// File-backed databases run in WAL mode with a busy timeout so that several
/// worker processes can share one database file. In-memory databases are pinned
/// to a single connection that is never recycled, otherwise the data would
/// vanish together with the connection that created it.
pub async fn create_pool(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    config.validate()?;
    let url = config.url.trim();

    tracing::debug!(config = %config_metadata(config), "creating sqlite pool");

    let in_memory = is_memory_url(url);
    if !in_memory {
        ensure_sqlite_db_file_exists(url)?;
    }

    let mut connect = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout());
    if !in_memory {
        connect = connect
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let opts = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        let mut opts = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections);
        if let Some(idle) = config.idle_timeout() {
            opts = opts.idle_timeout(idle);
        }
        opts
    };

    let pool = opts
        .acquire_timeout(config.connect_timeout())
        .connect_with(connect)
        .await?;

    tracing::debug!(url = %sanitize_database_url(url), "sqlite pool ready");
    Ok(pool)
}

/// Returns true when the URL names an in-memory SQLite database.
pub fn is_memory_url(url: &str) -> bool {
    let url_bytes = url.as_bytes();
    SQLITE_MEMORY_PATTERNS.iter().any(|&pattern| {
        url_bytes
            .windows(pattern.len())
            .any(|w| w.eq_ignore_ascii_case(pattern))
    })
}

/// Extract the file path from a SQLite connection URL.
/// Returns None for in-memory databases or empty paths.
pub(crate) fn extract_path(url: &str) -> Option<&str> {
    if is_memory_url(url) {
        return None;
    }

    let mut path = url;
    path = path
        .strip_prefix("sqlite://")
        .or_else(|| path.strip_prefix("sqlite:"))
        .unwrap_or(path);
    path = path.strip_prefix("file:").unwrap_or(path);

    if let Some(idx) = path.find('?') {
        path = &path[..idx];
    }

    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    // On Windows: strip leading slash before drive letter ("/C:/...")
    if path.len() > 2 && path.starts_with('/') && path.as_bytes().get(2) == Some(&b':') {
        Some(&path[1..])
    } else {
        Some(path)
    }
}

/// Make sure the parent directory of a file-backed database exists; SQLite
/// creates the file itself but refuses to create directories.
fn ensure_sqlite_db_file_exists(database_url: &str) -> Result<(), DbConnectionError> {
    use std::fs::create_dir_all;
    use std::path::Path;

    let Some(clean_path) = extract_path(database_url) else {
        return Ok(());
    };

    let db_path = Path::new(clean_path);
    if let Some(parent) = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        create_dir_all(parent).map_err(|e| {
            DbConnectionError::FileCreation(format!(
                "failed to create parent directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    Ok(())
}
