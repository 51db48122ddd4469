// Result storage contract. Producers (test pipeline) write suites, jobs, series and stats;
// the reporting layer reads them back through the same interface.

mod blob;
mod schema;
pub mod sqlite;

use futures_util::stream::BoxStream;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{DataSource, JobConfig, SuiteConfig, TimeSeries};
use crate::stats::{StatKind, StatVariant};

pub use sqlite::SqliteStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("suite {storage_id} is already stored with a different configuration")]
    SuiteConflict { storage_id: String },

    #[error("nothing stored at {0}")]
    NotFound(String),

    #[error("stat at {key} is {found}, requested {expected}")]
    TypeMismatch {
        key: String,
        expected: StatKind,
        found: StatKind,
    },

    #[error("invalid key {key}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Forward-only lazy sequence; call the iter_* method again to restart.
pub type ItemStream<'a, T> = BoxStream<'a, Result<T, StorageError>>;

/// Any operation may block on the backing engine.
pub trait ResultStorage: Send + Sync {
    /// Flush buffered writes durably. Safe to call repeatedly.
    fn sync(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Store `suite`, or check it equals the suite already stored under its storage id.
    fn put_or_check_suite(
        &self,
        suite: &SuiteConfig,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn put_job(
        &self,
        suite: &SuiteConfig,
        job: &JobConfig,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Store under `ts.source`, replacing any series at that key.
    fn put_ts(&self, ts: &TimeSeries) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Opaque blob, e.g. a raw tool log.
    fn put_extra(
        &self,
        data: &[u8],
        source: &DataSource,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn put_stat<S: StatVariant>(
        &self,
        data: &S,
        source: &DataSource,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Fails with NotFound when absent and TypeMismatch when stored as another variant.
    fn get_stat<S: StatVariant>(
        &self,
        source: &DataSource,
    ) -> impl Future<Output = Result<S, StorageError>> + Send;

    fn iter_suite<'a>(&'a self, suite_type: Option<&'a str>) -> ItemStream<'a, SuiteConfig>;

    fn iter_job<'a>(&'a self, suite: &'a SuiteConfig) -> ItemStream<'a, JobConfig>;

    fn iter_ts<'a>(&'a self, suite: &'a SuiteConfig, job: &'a JobConfig)
    -> ItemStream<'a, TimeSeries>;

    /// Store a rendered artifact and return where the report generator can find it.
    fn put_plot_file(
        &self,
        data: &[u8],
        source: &DataSource,
    ) -> impl Future<Output = Result<PathBuf, StorageError>> + Send;
}
