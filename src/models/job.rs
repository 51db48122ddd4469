// Finished job: config, run interval, raw series and (after reduction) their statistics

use std::collections::HashMap;

use super::{JobConfig, TimeSeries};
use crate::stats::StatSummary;

/// (node_id, device, metric)
pub type MetricKey = (String, String, String);

pub type JobMetrics = HashMap<MetricKey, TimeSeries>;

pub type JobStatMetrics = HashMap<MetricKey, StatSummary>;

#[derive(Debug, Clone)]
pub struct JobResult {
    pub info: JobConfig,
    /// (begin, end), ms from Unix epoch.
    pub run_interval: (i64, i64),
    pub raw: JobMetrics,
    pub processed: Option<JobStatMetrics>,
}

impl JobResult {
    pub fn new(info: JobConfig, begin_time: i64, end_time: i64, raw: JobMetrics) -> Self {
        Self {
            info,
            run_interval: (begin_time, end_time),
            raw,
            processed: None,
        }
    }

    pub fn set_processed(&mut self, processed: JobStatMetrics) {
        self.processed = Some(processed);
    }

    pub fn duration_ms(&self) -> i64 {
        self.run_interval.1 - self.run_interval.0
    }
}
