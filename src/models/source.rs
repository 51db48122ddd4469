// DataSource: composite key (suite, job, node, device, sensor, tag) of one measurement stream

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendered in place of an absent segment.
pub const MISSING_SEGMENT: &str = "_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSource {
    pub suite_id: Option<String>,
    pub job_id: Option<String>,
    pub node_id: Option<String>,
    pub dev: Option<String>,
    pub sensor: Option<String>,
    pub tag: Option<String>,
}

/// Fields to replace in `DataSource::with_overrides`. `None` keeps the original value.
#[derive(Debug, Clone, Default)]
pub struct DataSourceOverride {
    pub suite_id: Option<String>,
    pub job_id: Option<String>,
    pub node_id: Option<String>,
    pub dev: Option<String>,
    pub sensor: Option<String>,
    pub tag: Option<String>,
}

impl DataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of `self` with the set fields of `over` replaced.
    pub fn with_overrides(&self, over: DataSourceOverride) -> Self {
        Self {
            suite_id: over.suite_id.or_else(|| self.suite_id.clone()),
            job_id: over.job_id.or_else(|| self.job_id.clone()),
            node_id: over.node_id.or_else(|| self.node_id.clone()),
            dev: over.dev.or_else(|| self.dev.clone()),
            sensor: over.sensor.or_else(|| self.sensor.clone()),
            tag: over.tag.or_else(|| self.tag.clone()),
        }
    }

    pub fn with_suite(&self, suite_id: impl Into<String>) -> Self {
        Self {
            suite_id: Some(suite_id.into()),
            ..self.clone()
        }
    }

    pub fn with_job(&self, job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..self.clone()
        }
    }

    pub fn with_node(&self, node_id: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            ..self.clone()
        }
    }

    pub fn with_dev(&self, dev: impl Into<String>) -> Self {
        Self {
            dev: Some(dev.into()),
            ..self.clone()
        }
    }

    pub fn with_sensor(&self, sensor: impl Into<String>) -> Self {
        Self {
            sensor: Some(sensor.into()),
            ..self.clone()
        }
    }

    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..self.clone()
        }
    }

    /// Segments in key order: suite, job, node, dev, sensor, tag.
    pub fn segments(&self) -> [Option<&str>; 6] {
        [
            self.suite_id.as_deref(),
            self.job_id.as_deref(),
            self.node_id.as_deref(),
            self.dev.as_deref(),
            self.sensor.as_deref(),
            self.tag.as_deref(),
        ]
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [suite, job, node, dev, sensor, tag] =
            self.segments().map(|s| s.unwrap_or(MISSING_SEGMENT));
        write!(f, "{suite}.{job}/{node}/{dev}.{sensor}.{tag}")
    }
}
