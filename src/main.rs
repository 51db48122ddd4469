use anyhow::Result;
use benchstore::config::AppConfig;
use benchstore::models::{DataSource, JobConfig, SuiteConfig};
use benchstore::stats::{StatSummary, reduce_series, stat_source};
use benchstore::storage::{ResultStorage, SqliteStorage};
use futures_util::TryStreamExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = AppConfig::load()?;
    let storage = SqliteStorage::connect(&app_config.storage).await?;
    storage.init().await?;
    tracing::info!(path = %app_config.storage.path, "result storage opened");

    // Optional suite type filter as first argument.
    let suite_type = std::env::args().nth(1);
    let suites: Vec<SuiteConfig> = storage
        .iter_suite(suite_type.as_deref())
        .try_collect()
        .await?;
    tracing::info!(suites = suites.len(), "reducing stored suites");

    for suite in &suites {
        let jobs: Vec<JobConfig> = storage.iter_job(suite).try_collect().await?;
        for job in &jobs {
            reduce_stored_job(&storage, &app_config, suite, job).await?;
        }
    }

    storage.sync().await?;
    Ok(())
}

/// Reduce every stored series of one job and store the statistics next to it.
async fn reduce_stored_job<S: ResultStorage>(
    storage: &S,
    app_config: &AppConfig,
    suite: &SuiteConfig,
    job: &JobConfig,
) -> Result<()> {
    let series: Vec<_> = storage.iter_ts(suite, job).try_collect().await?;
    let mut reduced = 0usize;
    for ts in &series {
        let stat = match reduce_series(ts, &app_config.reduction) {
            Ok(stat) => stat,
            Err(e) => {
                tracing::warn!(key = %ts.source, error = %e, "series skipped");
                continue;
            }
        };
        let key: DataSource = stat_source(&ts.source);
        match &stat {
            StatSummary::Norm(s) => storage.put_stat(s, &key).await?,
            StatSummary::Histo(s) => storage.put_stat(s, &key).await?,
        }
        tracing::debug!(key = %key, "\n{}", summary_text(&stat));
        reduced += 1;
    }
    tracing::info!(
        suite = %suite.storage_id,
        job = %job.storage_id(),
        series = series.len(),
        reduced,
        "job reduced"
    );
    Ok(())
}

fn summary_text(stat: &StatSummary) -> String {
    match stat {
        StatSummary::Norm(s) => s.to_string(),
        StatSummary::Histo(s) => s.to_string(),
    }
}
