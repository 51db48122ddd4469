// SQLite result storage. sqlx pool in WAL mode; JSON for suite/job/stat mappings,
// versioned wincode BLOBs for series arrays, plain files for plots.

use futures_util::StreamExt;
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{ItemStream, ResultStorage, StorageError, blob, schema};
use crate::config::StorageConfig;
use crate::models::{DataSource, JobConfig, MISSING_SEGMENT, Storable, SuiteConfig, TimeSeries};
use crate::stats::{StatKind, StatVariant};

pub struct SqliteStorage {
    pool: SqlitePool,
    plots_dir: PathBuf,
}

/// Key columns for a DataSource; absent segments become ''.
struct KeyColumns {
    suite_id: String,
    job_id: String,
    node_id: String,
    dev: String,
    sensor: String,
    tag: String,
}

impl KeyColumns {
    /// suite_id and job_id are required. Present segments must be non-empty, must not be
    /// the missing-segment placeholder and must not contain '/' or '.', so the rendered
    /// key (and the plot path) maps back to exactly one DataSource.
    fn from_source(source: &DataSource) -> Result<Self, StorageError> {
        let invalid = |reason| StorageError::InvalidKey {
            key: source.to_string(),
            reason,
        };
        for segment in source.segments().into_iter().flatten() {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            if segment == MISSING_SEGMENT {
                return Err(invalid("segment equals the missing-segment placeholder"));
            }
            if segment.contains(['/', '.']) {
                return Err(invalid("segment contains a separator"));
            }
        }
        let (Some(suite_id), Some(job_id)) = (&source.suite_id, &source.job_id) else {
            return Err(invalid("suite_id and job_id are required"));
        };
        let col = |s: &Option<String>| s.clone().unwrap_or_default();
        Ok(Self {
            suite_id: suite_id.clone(),
            job_id: job_id.clone(),
            node_id: col(&source.node_id),
            dev: col(&source.dev),
            sensor: col(&source.sensor),
            tag: col(&source.tag),
        })
    }
}

fn segment(row: &SqliteRow, column: &str) -> Result<Option<String>, sqlx::Error> {
    let s: String = row.try_get(column)?;
    Ok((!s.is_empty()).then_some(s))
}

fn source_from_row(row: &SqliteRow) -> Result<DataSource, sqlx::Error> {
    Ok(DataSource {
        suite_id: segment(row, "suite_id")?,
        job_id: segment(row, "job_id")?,
        node_id: segment(row, "node_id")?,
        dev: segment(row, "dev")?,
        sensor: segment(row, "sensor")?,
        tag: segment(row, "tag")?,
    })
}

fn to_json<T: Storable>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(&value.raw()?)?)
}

fn from_json<T: Storable>(text: &str) -> Result<T, StorageError> {
    let raw: Map<String, Value> = serde_json::from_str(text)?;
    Ok(T::from_raw(raw)?)
}

const KEY_MATCH: &str =
    "suite_id = $1 AND job_id = $2 AND node_id = $3 AND dev = $4 AND sensor = $5 AND tag = $6";

impl SqliteStorage {
    /// Connect to SQLite at `config.path`, creating the file and parent dir if missing.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = Path::new(&config.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(opts)
            .await?;
        Ok(Self {
            pool,
            plots_dir: PathBuf::from(&config.plots_dir),
        })
    }

    /// Create tables if they don't exist.
    pub async fn init(&self) -> Result<(), StorageError> {
        schema::init_tables(&self.pool).await?;
        Ok(())
    }

    /// Blob stored by `put_extra`.
    pub async fn get_extra(&self, source: &DataSource) -> Result<Vec<u8>, StorageError> {
        let key = KeyColumns::from_source(source)?;
        let row = sqlx::query(&format!("SELECT data FROM extras WHERE {KEY_MATCH}"))
            .bind(&key.suite_id)
            .bind(&key.job_id)
            .bind(&key.node_id)
            .bind(&key.dev)
            .bind(&key.sensor)
            .bind(&key.tag)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(StorageError::NotFound(source.to_string()));
        };
        Ok(row.try_get("data")?)
    }

    /// Series stored by `put_ts` at exactly `source`.
    pub async fn get_ts(&self, source: &DataSource) -> Result<TimeSeries, StorageError> {
        let key = KeyColumns::from_source(source)?;
        let row = sqlx::query(&format!("SELECT * FROM series WHERE {KEY_MATCH}"))
            .bind(&key.suite_id)
            .bind(&key.job_id)
            .bind(&key.node_id)
            .bind(&key.dev)
            .bind(&key.sensor)
            .bind(&key.tag)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Self::parse_series_row(&row),
            None => Err(StorageError::NotFound(source.to_string())),
        }
    }

    fn parse_series_row(row: &SqliteRow) -> Result<TimeSeries, StorageError> {
        let times: Vec<u8> = row.try_get("times")?;
        let data: Vec<u8> = row.try_get("data")?;
        let second_axis_size: i64 = row.try_get("second_axis_size")?;
        let second_axis_size = usize::try_from(second_axis_size)
            .map_err(|_| StorageError::Codec(format!("second_axis_size {}", second_axis_size)))?;
        Ok(TimeSeries {
            name: row.try_get("name")?,
            units: row.try_get("units")?,
            time_units: row.try_get("time_units")?,
            times: blob::decode_i64s(&times)?,
            data: blob::decode_f64s(&data)?,
            second_axis_size,
            raw: row.try_get("raw")?,
            source: source_from_row(row)?,
        })
    }
}

impl ResultStorage for SqliteStorage {
    /// Checkpoint the WAL into the main database file.
    #[instrument(skip(self), fields(repo = "results", operation = "sync"))]
    async fn sync(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA wal_checkpoint(FULL)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, suite), fields(repo = "results", operation = "put_or_check_suite", suite = %suite.storage_id))]
    async fn put_or_check_suite(&self, suite: &SuiteConfig) -> Result<(), StorageError> {
        let data = to_json(suite)?;
        // Insert-if-absent then read back in one write transaction: every caller
        // compares against the single row that won.
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO suites (storage_id, test_type, data) VALUES ($1, $2, $3)
             ON CONFLICT(storage_id) DO NOTHING",
        )
        .bind(&suite.storage_id)
        .bind(&suite.test_type)
        .bind(&data)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let stored: String = sqlx::query_scalar("SELECT data FROM suites WHERE storage_id = $1")
            .bind(&suite.storage_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        if inserted > 0 {
            debug!("suite stored");
            return Ok(());
        }
        let stored: SuiteConfig = from_json(&stored)?;
        if stored != *suite {
            return Err(StorageError::SuiteConflict {
                storage_id: suite.storage_id.clone(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, suite, job), fields(repo = "results", operation = "put_job", suite = %suite.storage_id, job = %job.storage_id()))]
    async fn put_job(&self, suite: &SuiteConfig, job: &JobConfig) -> Result<(), StorageError> {
        let data = to_json(job)?;
        sqlx::query(
            "INSERT INTO jobs (suite_id, job_id, data) VALUES ($1, $2, $3)
             ON CONFLICT(suite_id, job_id) DO UPDATE SET data = excluded.data",
        )
        .bind(&suite.storage_id)
        .bind(job.storage_id())
        .bind(&data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, ts), fields(repo = "results", operation = "put_ts", key = %ts.source, samples = ts.sample_count()))]
    async fn put_ts(&self, ts: &TimeSeries) -> Result<(), StorageError> {
        let key = KeyColumns::from_source(&ts.source)?;
        let times = blob::encode_i64s(&ts.times)?;
        let data = blob::encode_f64s(&ts.data)?;
        sqlx::query(
            "INSERT OR REPLACE INTO series
             (suite_id, job_id, node_id, dev, sensor, tag, name, units, time_units, second_axis_size, times, data, raw)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(&key.suite_id)
        .bind(&key.job_id)
        .bind(&key.node_id)
        .bind(&key.dev)
        .bind(&key.sensor)
        .bind(&key.tag)
        .bind(&ts.name)
        .bind(&ts.units)
        .bind(&ts.time_units)
        .bind(ts.second_axis_size as i64)
        .bind(&times)
        .bind(&data)
        .bind(ts.raw.as_deref())
        .execute(&self.pool)
        .await?;
        debug!(bytes = data.len(), "series stored");
        Ok(())
    }

    #[instrument(skip(self, data, source), fields(repo = "results", operation = "put_extra", key = %source, bytes = data.len()))]
    async fn put_extra(&self, data: &[u8], source: &DataSource) -> Result<(), StorageError> {
        let key = KeyColumns::from_source(source)?;
        sqlx::query(
            "INSERT OR REPLACE INTO extras (suite_id, job_id, node_id, dev, sensor, tag, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&key.suite_id)
        .bind(&key.job_id)
        .bind(&key.node_id)
        .bind(&key.dev)
        .bind(&key.sensor)
        .bind(&key.tag)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, data, source), fields(repo = "results", operation = "put_stat", key = %source, kind = %S::KIND))]
    async fn put_stat<S: StatVariant>(
        &self,
        data: &S,
        source: &DataSource,
    ) -> Result<(), StorageError> {
        let key = KeyColumns::from_source(source)?;
        let json = to_json(data)?;
        sqlx::query(
            "INSERT OR REPLACE INTO stats (suite_id, job_id, node_id, dev, sensor, tag, kind, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&key.suite_id)
        .bind(&key.job_id)
        .bind(&key.node_id)
        .bind(&key.dev)
        .bind(&key.sensor)
        .bind(&key.tag)
        .bind(S::KIND.as_str())
        .bind(&json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, source), fields(repo = "results", operation = "get_stat", key = %source, kind = %S::KIND))]
    async fn get_stat<S: StatVariant>(&self, source: &DataSource) -> Result<S, StorageError> {
        let key = KeyColumns::from_source(source)?;
        let row = sqlx::query(&format!("SELECT kind, data FROM stats WHERE {KEY_MATCH}"))
            .bind(&key.suite_id)
            .bind(&key.job_id)
            .bind(&key.node_id)
            .bind(&key.dev)
            .bind(&key.sensor)
            .bind(&key.tag)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(StorageError::NotFound(source.to_string()));
        };
        let kind: String = row.try_get("kind")?;
        let found = StatKind::from_str(&kind).map_err(StorageError::Codec)?;
        if found != S::KIND {
            return Err(StorageError::TypeMismatch {
                key: source.to_string(),
                expected: S::KIND,
                found,
            });
        }
        let data: String = row.try_get("data")?;
        from_json(&data)
    }

    fn iter_suite<'a>(&'a self, suite_type: Option<&'a str>) -> ItemStream<'a, SuiteConfig> {
        sqlx::query("SELECT data FROM suites WHERE $1 IS NULL OR test_type = $2")
            .bind(suite_type)
            .bind(suite_type)
            .fetch(&self.pool)
            .map(|row| -> Result<SuiteConfig, StorageError> {
                let data: String = row?.try_get("data")?;
                from_json(&data)
            })
            .boxed()
    }

    fn iter_job<'a>(&'a self, suite: &'a SuiteConfig) -> ItemStream<'a, JobConfig> {
        sqlx::query("SELECT data FROM jobs WHERE suite_id = $1")
            .bind(suite.storage_id.as_str())
            .fetch(&self.pool)
            .map(|row| -> Result<JobConfig, StorageError> {
                let data: String = row?.try_get("data")?;
                from_json(&data)
            })
            .boxed()
    }

    fn iter_ts<'a>(
        &'a self,
        suite: &'a SuiteConfig,
        job: &'a JobConfig,
    ) -> ItemStream<'a, TimeSeries> {
        sqlx::query("SELECT * FROM series WHERE suite_id = $1 AND job_id = $2")
            .bind(suite.storage_id.as_str())
            .bind(job.storage_id())
            .fetch(&self.pool)
            .map(|row| -> Result<TimeSeries, StorageError> { Self::parse_series_row(&row?) })
            .boxed()
    }

    /// Written to `plots_dir/{suite}.{job}/{node}/{dev}.{sensor}.{tag}`.
    #[instrument(skip(self, data, source), fields(repo = "results", operation = "put_plot_file", key = %source, bytes = data.len()))]
    async fn put_plot_file(
        &self,
        data: &[u8],
        source: &DataSource,
    ) -> Result<PathBuf, StorageError> {
        KeyColumns::from_source(source)?;
        let path = self.plots_dir.join(source.to_string());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        debug!(path = %path.display(), "plot file written");
        Ok(path)
    }
}
