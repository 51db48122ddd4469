// Result data model: addressing, raw series, suite/job metadata

mod job;
mod series;
mod source;
mod storable;
mod suite;

pub use job::{JobMetrics, JobResult, JobStatMetrics, MetricKey};
pub use series::{DEFAULT_TIME_UNITS, TimeSeries};
pub use source::{DataSource, DataSourceOverride, MISSING_SEGMENT};
pub use storable::{Storable, storable_eq};
pub use suite::{JobConfig, NodeRef, SuiteConfig};
