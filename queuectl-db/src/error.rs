use queuectl_db_connection::DbConnectionError;
use thiserror::Error;

// SQLITE_BUSY and SQLITE_LOCKED primary result codes; extended codes share the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Errors raised by the durable job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job '{0}' already exists")]
    DuplicateJob(String),
    #[error("job '{0}' changed since it was read")]
    StaleTransition(String),
    #[error("job '{0}' not found")]
    NotFound(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("failed to open database: {0}")]
    Connection(#[from] DbConnectionError),
    #[error("failed to apply migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// True for contention and I/O failures that are worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlx(err) => is_transient_sqlx(err),
            Self::Connection(DbConnectionError::Sqlx(err)) => is_transient_sqlx(err),
            _ => false,
        }
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    }
}
