// Job reduction: scalar series -> NormStatProps, 2-D series -> HistoStatProps (fio latency edges)

use serde::{Deserialize, Serialize};

use super::{HistoStatProps, NormStatProps, StatError, StatKind, StatProps, fio};
use crate::config::ReductionConfig;
use crate::models::{DataSource, JobResult, JobStatMetrics, TimeSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StatSummary {
    Norm(NormStatProps),
    Histo(HistoStatProps),
}

impl StatSummary {
    pub fn kind(&self) -> StatKind {
        match self {
            StatSummary::Norm(_) => StatKind::Norm,
            StatSummary::Histo(_) => StatKind::Histo,
        }
    }

    pub fn props(&self) -> &StatProps {
        match self {
            StatSummary::Norm(s) => &s.base,
            StatSummary::Histo(s) => &s.base,
        }
    }
}

pub fn reduce_series(ts: &TimeSeries, config: &ReductionConfig) -> Result<StatSummary, StatError> {
    ts.validate()?;
    if ts.second_axis_size == 1 {
        let stat =
            NormStatProps::from_samples(&ts.data, config.bins_count, config.confidence_level)?;
        return Ok(StatSummary::Norm(stat));
    }
    let edges = fio::lat_bin_edges(ts.second_axis_size);
    let stat = HistoStatProps::from_series(ts, &edges, config.histo_rebins, config.histo_tail)?;
    Ok(StatSummary::Histo(stat))
}

/// Reduce every raw series of `job`. Fails on the first series that cannot be reduced.
pub fn reduce_job(job: &JobResult, config: &ReductionConfig) -> Result<JobStatMetrics, StatError> {
    job.raw
        .iter()
        .map(|(key, ts)| Ok((key.clone(), reduce_series(ts, config)?)))
        .collect()
}

/// Key the statistics of the series at `source` are stored under. The series tag is kept
/// as a prefix, so series differing only by tag get distinct stat keys.
pub fn stat_source(source: &DataSource) -> DataSource {
    match &source.tag {
        Some(tag) => source.with_tag(format!("{}-stat", tag)),
        None => source.with_tag("stat"),
    }
}
