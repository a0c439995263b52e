//! Durable SQLite storage for queuectl.
//!
//! Free functions in [`jobs`], [`queue_config`] and [`workers`] accept any sqlx
//! executor; [`JobStore`] bundles them behind a shared pool.

pub type DbBackend = sqlx::Sqlite;

pub mod error;
pub mod jobs;
pub mod queue_config;
pub mod rows;
pub mod state;
pub mod store;
pub mod workers;


pub use error::StoreError;
pub use queuectl_db_connection::{create_pool, DbConnectionConfig, DbConnectionError, DbPool};
pub use rows::{ConfigRow, JobRow, JobUpdate, NewJob, TransitionGuard, WorkerRow};
pub use state::{JobState, UnknownJobState};
pub use store::JobStore;

pub use sqlx::Error as SqlxError;
