// Statistical reduction of finalized series into StatProps summaries.
//
// Percentiles use linear interpolation between order statistics (rank = p * (n - 1)).
// Scalar histograms use `bins_count` equal-width bins over [min, max], last bin closed.

pub mod fio;
pub mod histo;
pub mod norm;
pub mod reduce;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{Storable, storable_eq};

pub use histo::HistoStatProps;
pub use norm::{NormStatProps, NormalTest};
pub use reduce::{StatSummary, reduce_job, reduce_series, stat_source};

pub const PERCENTILES: [f64; 4] = [0.5, 0.9, 0.95, 0.99];

#[derive(Debug, Error, PartialEq)]
pub enum StatError {
    #[error("cannot reduce an empty sample array")]
    EmptyInput,

    #[error("invalid sample {value} at index {index}")]
    InvalidSample { index: usize, value: f64 },

    #[error("data of length {len} does not split into rows of width {width}")]
    ShapeMismatch { len: usize, width: usize },

    #[error("invalid histogram edges: {0}")]
    InvalidEdges(String),

    #[error("confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),

    #[error("{field} is not representable as a finite f64")]
    Overflow { field: &'static str },
}

/// Variant tag stored next to persisted statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Basic,
    Norm,
    Histo,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Basic => "basic",
            StatKind::Norm => "norm",
            StatKind::Histo => "histo",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(StatKind::Basic),
            "norm" => Ok(StatKind::Norm),
            "histo" => Ok(StatKind::Histo),
            other => Err(format!("unknown stat kind {:?}", other)),
        }
    }
}

/// A persistable statistics type; `KIND` is the tag checked by `get_stat`.
pub trait StatVariant: Storable + Send + Sync {
    const KIND: StatKind;

    fn props(&self) -> &StatProps;
}

/// Statistic properties for a series with unknown distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatProps {
    pub perc_50: f64,
    pub perc_90: f64,
    pub perc_95: f64,
    pub perc_99: f64,
    pub min: f64,
    pub max: f64,
    /// Bin centers; `bins_populations[i]` counts samples in the bin centered at `bins_mids[i]`.
    pub bins_mids: Vec<f64>,
    pub bins_populations: Vec<u64>,
    /// Source samples, for display only. Not persisted.
    #[serde(default)]
    pub data: Vec<f64>,
}

impl StatProps {
    pub fn from_samples(data: &[f64], bins_count: usize) -> Result<Self, StatError> {
        check_samples(data)?;
        let sorted = sorted_copy(data);
        Ok(Self::from_sorted(&sorted, data, bins_count))
    }

    /// `sorted` must be non-empty, finite and ascending.
    pub(crate) fn from_sorted(sorted: &[f64], data: &[f64], bins_count: usize) -> Self {
        let [perc_50, perc_90, perc_95, perc_99] = PERCENTILES.map(|p| percentile(sorted, p));
        let (bins_mids, bins_populations) = histogram(sorted, bins_count);
        Self {
            perc_50,
            perc_90,
            perc_95,
            perc_99,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            bins_mids,
            bins_populations,
            data: data.to_vec(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.data.len()
    }

    fn fmt_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    perc_50 = {}", round_digits(self.perc_50))?;
        writeln!(f, "    perc_90 = {}", round_digits(self.perc_90))?;
        writeln!(f, "    perc_95 = {}", round_digits(self.perc_95))?;
        writeln!(f, "    perc_99 = {}", round_digits(self.perc_99))?;
        write!(
            f,
            "    range {} {}",
            round_digits(self.min),
            round_digits(self.max)
        )
    }
}

impl PartialEq for StatProps {
    fn eq(&self, other: &Self) -> bool {
        storable_eq(self, other)
    }
}

impl Storable for StatProps {
    const IGNORED_FIELDS: &'static [&'static str] = &["data"];
}

impl StatVariant for StatProps {
    const KIND: StatKind = StatKind::Basic;

    fn props(&self) -> &StatProps {
        self
    }
}

impl fmt::Display for StatProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "StatProps(size = {}):", self.sample_count())?;
        self.fmt_body(f)
    }
}

/// Rejects empty input and non-finite samples.
pub(crate) fn check_samples(data: &[f64]) -> Result<(), StatError> {
    if data.is_empty() {
        return Err(StatError::EmptyInput);
    }
    match data.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(StatError::InvalidSample {
            index,
            value: data[index],
        }),
        None => Ok(()),
    }
}

pub(crate) fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Percentile `p` in [0, 1] of ascending `sorted`, linear interpolation between order statistics.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 1.0 {
        return sorted[n - 1];
    }
    let rank = p * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = rank - lower as f64;
    let (lo, hi) = (sorted[lower], sorted[upper]);
    let span = hi - lo;
    if span.is_finite() {
        lo + span * fraction
    } else {
        lo * (1.0 - fraction) + hi * fraction
    }
}

/// Equal-width histogram of ascending `sorted`. Returns (bin mids, bin populations).
pub fn histogram(sorted: &[f64], bins_count: usize) -> (Vec<f64>, Vec<u64>) {
    let bins_count = bins_count.max(1);
    let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
        return (Vec::new(), Vec::new());
    };
    let (lo, hi) = if first == last {
        (first - 0.5, last + 0.5)
    } else {
        (first, last)
    };
    let n = bins_count as f64;
    let span = hi - lo;
    // a range wider than f64::MAX is measured in bin widths instead
    let width = if span.is_finite() {
        span / n
    } else {
        hi / n - lo / n
    };

    let mut populations = vec![0u64; bins_count];
    for &v in sorted {
        let offset = v - lo;
        let pos = if offset.is_finite() {
            offset / width
        } else {
            v / width - lo / width
        };
        let idx = (pos as usize).min(bins_count - 1);
        populations[idx] += 1;
    }
    let mids = (0..bins_count)
        .map(|i| lo + width * (i as f64 + 0.5))
        .collect();
    (mids, populations)
}

/// Compact rendering for summaries: three decimals below 1000, integers above.
pub fn round_digits(v: f64) -> String {
    if v.abs() >= 1000.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.3}", v)
    }
}
