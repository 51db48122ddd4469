// Shared test helpers

#![allow(dead_code)]

use benchstore::config::StorageConfig;
use benchstore::models::*;
use benchstore::storage::SqliteStorage;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

pub fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("params must be a JSON object"),
    }
}

pub fn suite(test_type: &str, nodes: &[&str], idx: usize) -> SuiteConfig {
    SuiteConfig::new(
        test_type,
        params(json!({"runtime": 30, "size": "1G"})),
        "uuid-1",
        nodes
            .iter()
            .map(|n| NodeRef::new(*n, format!("ssh://root@{}", n)))
            .collect(),
        "/tmp/wally",
        idx,
    )
}

pub fn job(summary: &str, idx: usize) -> JobConfig {
    JobConfig::new(idx, summary, params(json!({"bs": "4k", "rw": "randread"})))
}

pub fn source(suite: &SuiteConfig, job: &JobConfig) -> DataSource {
    DataSource::new()
        .with_suite(&suite.storage_id)
        .with_job(job.storage_id())
}

pub fn series(source: DataSource, data: Vec<f64>) -> TimeSeries {
    let times = (0..data.len() as i64).map(|t| 1_000 + t * 1_000).collect();
    TimeSeries::new("sda.iops", data, times, "iops", source)
}

pub async fn storage(dir: &TempDir) -> SqliteStorage {
    let config = StorageConfig {
        path: dir.path().join("results.db").to_str().unwrap().to_string(),
        plots_dir: dir.path().join("plots").to_str().unwrap().to_string(),
        max_connections: 4,
        busy_timeout_secs: 5,
    };
    let storage = SqliteStorage::connect(&config).await.unwrap();
    storage.init().await.unwrap();
    storage
}

/// Deterministic pseudo-random samples in [offset, offset + spread). Values are not
/// dyadic, so they exercise exact float persistence.
pub fn noisy_samples(count: usize, seed: u64, offset: f64, spread: f64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            offset + unit * spread
        })
        .collect()
}
