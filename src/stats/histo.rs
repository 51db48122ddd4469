// Statistics for 2-D series (latency), where each time point is a row of bucket counts.
//
// Bucket i spans [edges[i], edges[i + 1]). Rows are summed per bucket; percentile p is
// the lower edge of the first bucket whose cumulative weight reaches p * total.
// Weights may be fractional (averaged histograms); only the display populations are
// rounded, after merging.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{PERCENTILES, StatError, StatKind, StatProps, StatVariant, round_digits};
use crate::models::{Storable, TimeSeries, storable_eq};

/// Fraction of the population cut from each side of the display bins.
pub const DEFAULT_TAIL: f64 = 0.005;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoStatProps {
    #[serde(flatten)]
    pub base: StatProps,
    pub second_axis_size: usize,
}

impl HistoStatProps {
    pub fn from_series(
        ts: &TimeSeries,
        bins_edges: &[f64],
        rebins_count: Option<usize>,
        tail: f64,
    ) -> Result<Self, StatError> {
        Self::from_rows(
            &ts.data,
            ts.second_axis_size,
            bins_edges,
            rebins_count,
            tail,
        )
    }

    pub fn from_rows(
        data: &[f64],
        second_axis_size: usize,
        bins_edges: &[f64],
        rebins_count: Option<usize>,
        tail: f64,
    ) -> Result<Self, StatError> {
        if second_axis_size == 0 || data.len() % second_axis_size != 0 {
            return Err(StatError::ShapeMismatch {
                len: data.len(),
                width: second_axis_size,
            });
        }
        check_edges(bins_edges, second_axis_size)?;
        if data.is_empty() {
            return Err(StatError::EmptyInput);
        }
        if let Some(index) = data.iter().position(|v| !v.is_finite() || *v < 0.0) {
            return Err(StatError::InvalidSample {
                index,
                value: data[index],
            });
        }

        let mut aggregated = vec![0.0f64; second_axis_size];
        for row in data.chunks_exact(second_axis_size) {
            for (acc, v) in aggregated.iter_mut().zip(row) {
                *acc += v;
            }
        }
        let cumsum: Vec<f64> = aggregated
            .iter()
            .scan(0.0f64, |acc, &v| {
                *acc += v;
                Some(*acc)
            })
            .collect();
        let total = cumsum.last().copied().unwrap_or(0.0);
        if !total.is_finite() {
            return Err(StatError::Overflow { field: "population" });
        }
        if total <= 0.0 {
            return Err(StatError::EmptyInput);
        }

        let bucket_at = |level: f64| search_cumsum(&cumsum, level * total);
        let [perc_50, perc_90, perc_95, perc_99] = PERCENTILES.map(|p| bins_edges[bucket_at(p)]);

        // total > 0, so both ends exist
        let first = aggregated.iter().position(|&c| c > 0.0).unwrap_or(0);
        let last = aggregated
            .iter()
            .rposition(|&c| c > 0.0)
            .unwrap_or(second_axis_size - 1);

        let tail = tail.clamp(0.0, 0.49);
        let left = bucket_at(tail);
        let right = bucket_at(1.0 - tail);
        let (bins_mids, bins_populations) =
            rebin(&aggregated, bins_edges, left, right, rebins_count);

        Ok(Self {
            base: StatProps {
                perc_50,
                perc_90,
                perc_95,
                perc_99,
                min: bins_edges[first],
                max: bins_edges[last + 1],
                bins_mids,
                bins_populations,
                data: data.to_vec(),
            },
            second_axis_size,
        })
    }

    /// Number of time points (rows) the summary was built from.
    pub fn rows_count(&self) -> usize {
        self.base.data.len() / self.second_axis_size.max(1)
    }
}

fn check_edges(edges: &[f64], buckets: usize) -> Result<(), StatError> {
    if edges.len() != buckets + 1 {
        return Err(StatError::InvalidEdges(format!(
            "expected {} edges for {} buckets, got {}",
            buckets + 1,
            buckets,
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(StatError::InvalidEdges(
            "edges must be finite and strictly increasing".to_string(),
        ));
    }
    Ok(())
}

/// First index whose cumulative weight is >= `target`.
fn search_cumsum(cumsum: &[f64], target: f64) -> usize {
    cumsum
        .partition_point(|&c| c < target)
        .min(cumsum.len() - 1)
}

/// Buckets [left, right] merged into at most `rebins_count` groups of equal width.
/// Merged weights are rounded to whole counts.
fn rebin(
    populations: &[f64],
    edges: &[f64],
    left: usize,
    right: usize,
    rebins_count: Option<usize>,
) -> (Vec<f64>, Vec<u64>) {
    let span = right - left + 1;
    let groups = rebins_count
        .filter(|&c| c > 0 && c < span)
        .unwrap_or(span);
    let chunk = span.div_ceil(groups);

    let mut mids = Vec::with_capacity(groups);
    let mut pops = Vec::with_capacity(groups);
    let mut start = left;
    while start <= right {
        let end = (start + chunk).min(right + 1);
        mids.push(edges[start] / 2.0 + edges[end] / 2.0);
        pops.push(populations[start..end].iter().sum::<f64>().round() as u64);
        start = end;
    }
    (mids, pops)
}

impl PartialEq for HistoStatProps {
    fn eq(&self, other: &Self) -> bool {
        storable_eq(self, other)
    }
}

impl Storable for HistoStatProps {
    const IGNORED_FIELDS: &'static [&'static str] = &["data"];
}

impl StatVariant for HistoStatProps {
    const KIND: StatKind = StatKind::Histo;

    fn props(&self) -> &StatProps {
        &self.base
    }
}

impl fmt::Display for HistoStatProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "HistoStatProps(size = {}x{}):",
            self.rows_count(),
            self.second_axis_size
        )?;
        self.base.fmt_body(f)?;
        write!(
            f,
            "\n    bins = {}, peak = {}",
            self.base.bins_mids.len(),
            round_digits(
                self.base
                    .bins_mids
                    .iter()
                    .zip(&self.base.bins_populations)
                    .max_by_key(|(_, p)| **p)
                    .map(|(m, _)| *m)
                    .unwrap_or(f64::NAN)
            )
        )
    }
}
