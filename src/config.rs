use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub reduction: ReductionConfig,
    /// Per-suite parameter tables, keyed by test type (`[tests.fio]`).
    #[serde(default)]
    pub tests: BTreeMap<String, toml::Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    pub path: String,
    /// Directory for rendered plot files.
    #[serde(default = "default_plots_dir")]
    pub plots_dir: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_plots_dir() -> String {
    "data/plots".into()
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Bins for scalar (iops/bw) histograms.
    #[serde(default = "default_bins_count")]
    pub bins_count: usize,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Merge latency buckets into this many display bins. All buckets are kept when unset.
    #[serde(default)]
    pub histo_rebins: Option<usize>,
    /// Fraction of latency population cut from each side of the display bins.
    #[serde(default = "default_histo_tail")]
    pub histo_tail: f64,
}

fn default_bins_count() -> usize {
    20
}

fn default_confidence_level() -> f64 {
    crate::stats::norm::DEFAULT_CONFIDENCE_LEVEL
}

fn default_histo_tail() -> f64 {
    crate::stats::histo::DEFAULT_TAIL
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            bins_count: default_bins_count(),
            confidence_level: default_confidence_level(),
            histo_rebins: None,
            histo_tail: default_histo_tail(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Nested lookup, e.g. `get("reduction/bins_count")`. Unset optional fields resolve to None.
    pub fn get(&self, path: &str) -> Option<toml::Value> {
        let mut curr = toml::Value::try_from(self).ok()?;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            curr = match curr {
                toml::Value::Table(mut table) => table.remove(name)?,
                _ => return None,
            };
        }
        Some(curr)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Parameters of `[tests.<test_type>]` as a JSON map, the form suites are stored with.
    pub fn suite_params(
        &self,
        test_type: &str,
    ) -> anyhow::Result<Option<serde_json::Map<String, serde_json::Value>>> {
        let Some(table) = self.tests.get(test_type) else {
            return Ok(None);
        };
        match serde_json::to_value(table)? {
            serde_json::Value::Object(map) => Ok(Some(map)),
            other => anyhow::bail!("tests.{} is not a table: {}", test_type, other),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.storage.path.is_empty(),
            "storage.path must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.plots_dir.is_empty(),
            "storage.plots_dir must be non-empty"
        );
        anyhow::ensure!(
            self.storage.max_connections > 0,
            "storage.max_connections must be > 0, got {}",
            self.storage.max_connections
        );
        anyhow::ensure!(
            self.storage.busy_timeout_secs > 0,
            "storage.busy_timeout_secs must be > 0, got {}",
            self.storage.busy_timeout_secs
        );
        anyhow::ensure!(
            self.reduction.bins_count > 0,
            "reduction.bins_count must be > 0, got {}",
            self.reduction.bins_count
        );
        anyhow::ensure!(
            self.reduction.confidence_level > 0.0 && self.reduction.confidence_level < 1.0,
            "reduction.confidence_level must be in (0, 1), got {}",
            self.reduction.confidence_level
        );
        anyhow::ensure!(
            self.reduction.histo_rebins != Some(0),
            "reduction.histo_rebins must be > 0 when set"
        );
        anyhow::ensure!(
            (0.0..0.5).contains(&self.reduction.histo_tail),
            "reduction.histo_tail must be in [0, 0.5), got {}",
            self.reduction.histo_tail
        );
        Ok(())
    }
}
