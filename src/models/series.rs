// TimeSeries: samples from one sensor (system sensor or load generator such as fio)

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DataSource;
use crate::stats::StatError;

pub const DEFAULT_TIME_UNITS: &str = "us";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Sensor name, by convention `DEVICE.METRIC`.
    pub name: String,
    pub units: String,
    pub time_units: String,
    /// Sample times, ms from Unix epoch.
    pub times: Vec<i64>,
    pub data: Vec<f64>,
    /// Row width. Greater than 1 for 2-D sensors such as latency, where each point is a histogram.
    pub second_axis_size: usize,
    /// Original tool output (e.g. fio log), if kept.
    pub raw: Option<Vec<u8>>,
    pub source: DataSource,
}

impl TimeSeries {
    pub fn new(
        name: impl Into<String>,
        data: Vec<f64>,
        times: Vec<i64>,
        units: impl Into<String>,
        source: DataSource,
    ) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            time_units: DEFAULT_TIME_UNITS.to_string(),
            times,
            data,
            second_axis_size: 1,
            raw: None,
            source,
        }
    }

    pub fn with_second_axis(mut self, second_axis_size: usize) -> Self {
        self.second_axis_size = second_axis_size;
        self
    }

    pub fn with_raw(mut self, raw: Vec<u8>) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Fails unless `data` splits into whole rows of `second_axis_size`.
    pub fn validate(&self) -> Result<(), StatError> {
        if self.second_axis_size == 0 || self.data.len() % self.second_axis_size != 0 {
            return Err(StatError::ShapeMismatch {
                len: self.data.len(),
                width: self.second_axis_size,
            });
        }
        Ok(())
    }

    /// Effective number of time points (rows).
    pub fn sample_count(&self) -> usize {
        if self.second_axis_size == 0 {
            return 0;
        }
        self.data.len() / self.second_axis_size
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.second_axis_size.max(1))
    }
}

impl fmt::Display for TimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TS({}):", self.name)?;
        writeln!(f, "    source={}", self.source)?;
        writeln!(f, "    times_size={}", self.times.len())?;
        writeln!(f, "    data_size={}", self.data.len())?;
        writeln!(
            f,
            "    data_shape={}x{}",
            self.sample_count(),
            self.second_axis_size
        )
    }
}
