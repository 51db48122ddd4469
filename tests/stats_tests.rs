// Stats tests: scalar and histogram reductions, persisted forms, job reduction

mod common;

use benchstore::config::ReductionConfig;
use benchstore::models::*;
use benchstore::stats::fio::{PLAT_NR, lat_bin_edges, plat_idx_to_val};
use benchstore::stats::*;
use serde_json::{Map, Value};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn one_to_ten() -> Vec<f64> {
    (1..=10).map(f64::from).collect()
}

#[test]
fn norm_props_of_one_to_ten() {
    let stat = NormStatProps::from_samples(&one_to_ten(), 10, 0.95).unwrap();
    let p = &stat.base;
    assert_eq!(p.min, 1.0);
    assert_eq!(p.max, 10.0);
    assert!(approx(stat.average, 5.5));
    assert!(approx(p.perc_50, 5.5));
    assert!(approx(p.perc_90, 9.1));
    assert!(approx(p.perc_95, 9.55));
    assert!(approx(p.perc_99, 9.91));

    // unbiased: sum of squares 82.5 over 9
    assert!(approx(stat.deviation, (82.5f64 / 9.0).sqrt()));
    assert!((stat.confidence - 1.959964 * stat.deviation / 10f64.sqrt()).abs() < 1e-5);
    let (lo, hi) = stat.confidence_interval();
    assert!(lo < stat.average && stat.average < hi);

    assert_eq!(stat.skew, 0.0);
    assert!((stat.kurt - (-1.2242424242)).abs() < 1e-6);
    assert!(stat.normtest.is_some());

    assert_eq!(p.bins_populations, vec![1; 10]);
    assert!(approx(p.bins_mids[0], 1.45));
    assert_eq!(p.sample_count(), 10);
}

#[test]
fn percentiles_are_ordered_within_range() {
    let data = [
        12.0, 3.5, 7.25, 100.0, 0.5, 42.0, 42.0, 8.0, 19.5, 61.0, 2.0, 5.0, 77.0,
    ];
    let p = StatProps::from_samples(&data, 5).unwrap();
    assert!(p.min <= p.perc_50);
    assert!(p.perc_50 <= p.perc_90);
    assert!(p.perc_90 <= p.perc_95);
    assert!(p.perc_95 <= p.perc_99);
    assert!(p.perc_99 <= p.max);
    assert_eq!(p.bins_populations.iter().sum::<u64>(), data.len() as u64);
    assert_eq!(p.bins_mids.len(), p.bins_populations.len());
}

#[test]
fn single_sample_has_zero_spread() {
    let stat = NormStatProps::from_samples(&[7.0], 4, 0.95).unwrap();
    assert_eq!(stat.base.perc_50, 7.0);
    assert_eq!(stat.base.perc_99, 7.0);
    assert_eq!(stat.deviation, 0.0);
    assert_eq!(stat.confidence, 0.0);
    assert_eq!(stat.skew, 0.0);
    assert_eq!(stat.kurt, 0.0);
    assert!(stat.normtest.is_none());
    assert_eq!(stat.base.bins_populations.iter().sum::<u64>(), 1);
}

#[test]
fn constant_samples_skip_shape_statistics() {
    let stat = NormStatProps::from_samples(&[3.0; 20], 5, 0.95).unwrap();
    assert_eq!(stat.average, 3.0);
    assert_eq!(stat.deviation, 0.0);
    assert_eq!(stat.skew, 0.0);
    assert_eq!(stat.kurt, 0.0);
    assert!(stat.normtest.is_none());
}

#[test]
fn short_input_has_no_normality_test() {
    let stat = NormStatProps::from_samples(&[1.0, 2.0, 4.0, 8.0], 4, 0.95).unwrap();
    assert!(stat.normtest.is_none());
    assert!(stat.skew > 0.0);
}

#[test]
fn empty_and_non_finite_input_is_rejected() {
    assert_eq!(
        StatProps::from_samples(&[], 10).unwrap_err(),
        StatError::EmptyInput
    );
    assert_eq!(
        NormStatProps::from_samples(&[], 10, 0.95).unwrap_err(),
        StatError::EmptyInput
    );
    assert!(matches!(
        NormStatProps::from_samples(&[1.0, f64::NAN, 3.0], 10, 0.95),
        Err(StatError::InvalidSample { index: 1, .. })
    ));
    assert!(matches!(
        StatProps::from_samples(&[f64::INFINITY], 10),
        Err(StatError::InvalidSample { index: 0, .. })
    ));
}

#[test]
fn confidence_level_must_be_open_unit_interval() {
    for level in [0.0, 1.0, 1.5, -0.1] {
        assert_eq!(
            NormStatProps::from_samples(&one_to_ten(), 10, level).unwrap_err(),
            StatError::InvalidConfidence(level)
        );
    }
}

#[test]
fn higher_confidence_widens_interval() {
    let narrow = NormStatProps::from_samples(&one_to_ten(), 10, 0.9).unwrap();
    let wide = NormStatProps::from_samples(&one_to_ten(), 10, 0.99).unwrap();
    assert!(wide.confidence > narrow.confidence);
}

#[test]
fn norm_props_persisted_form_round_trips() {
    let stat = NormStatProps::from_samples(&one_to_ten(), 10, 0.95).unwrap();
    let raw = stat.raw().unwrap();
    assert!(!raw.contains_key("data"));
    assert!(raw.contains_key("perc_95"));
    assert!(raw["normtest"].is_array());

    let restored = NormStatProps::from_raw(raw).unwrap();
    assert_eq!(restored, stat);
    assert!(restored.base.data.is_empty());
    assert_eq!(restored.base.perc_99, stat.base.perc_99);
    assert_eq!(restored.normtest, stat.normtest);
    assert_eq!(restored.base.bins_mids, stat.base.bins_mids);
}

#[test]
fn equality_ignores_source_samples() {
    let a = NormStatProps::from_samples(&one_to_ten(), 10, 0.95).unwrap();
    let mut b = a.clone();
    b.base.data.clear();
    assert_eq!(a, b);
    b.average += 1.0;
    assert_ne!(a, b);
}

const EDGES: [f64; 5] = [0.0, 1.0, 2.0, 4.0, 8.0];
const ROWS: [f64; 8] = [0.0, 2.0, 1.0, 1.0, 0.0, 3.0, 2.0, 1.0];

#[test]
fn histo_props_aggregate_rows() {
    let stat = HistoStatProps::from_rows(&ROWS, 4, &EDGES, None, 0.0).unwrap();
    let p = &stat.base;
    // aggregated [0, 5, 3, 2], total 10
    assert_eq!(p.perc_50, 1.0);
    assert_eq!(p.perc_90, 4.0);
    assert_eq!(p.perc_95, 4.0);
    assert_eq!(p.perc_99, 4.0);
    assert_eq!(p.min, 1.0);
    assert_eq!(p.max, 8.0);
    assert_eq!(p.bins_mids, vec![0.5, 1.5, 3.0, 6.0]);
    assert_eq!(p.bins_populations, vec![0, 5, 3, 2]);
    assert_eq!(stat.second_axis_size, 4);
    assert_eq!(stat.rows_count(), 2);
}

#[test]
fn histo_tail_trims_and_rebin_merges() {
    let trimmed = HistoStatProps::from_rows(&ROWS, 4, &EDGES, None, 0.005).unwrap();
    assert_eq!(trimmed.base.bins_mids, vec![1.5, 3.0, 6.0]);
    assert_eq!(trimmed.base.bins_populations, vec![5, 3, 2]);

    let merged = HistoStatProps::from_rows(&ROWS, 4, &EDGES, Some(2), 0.005).unwrap();
    assert_eq!(merged.base.bins_mids, vec![2.5, 6.0]);
    assert_eq!(merged.base.bins_populations, vec![8, 2]);
}

#[test]
fn histo_input_errors() {
    assert!(matches!(
        HistoStatProps::from_rows(&ROWS[..7], 4, &EDGES, None, 0.0),
        Err(StatError::ShapeMismatch { len: 7, width: 4 })
    ));
    assert!(matches!(
        HistoStatProps::from_rows(&ROWS, 4, &EDGES[..4], None, 0.0),
        Err(StatError::InvalidEdges(_))
    ));
    assert!(matches!(
        HistoStatProps::from_rows(&ROWS, 4, &[0.0, 2.0, 1.0, 4.0, 8.0], None, 0.0),
        Err(StatError::InvalidEdges(_))
    ));
    assert_eq!(
        HistoStatProps::from_rows(&[0.0; 8], 4, &EDGES, None, 0.0).unwrap_err(),
        StatError::EmptyInput
    );
    assert!(matches!(
        HistoStatProps::from_rows(&[0.0, -1.0, 0.0, 0.0], 4, &EDGES, None, 0.0),
        Err(StatError::InvalidSample { index: 1, .. })
    ));
}

#[test]
fn histo_props_persisted_form_round_trips() {
    let stat = HistoStatProps::from_rows(&ROWS, 4, &EDGES, None, 0.0).unwrap();
    let raw = stat.raw().unwrap();
    assert!(!raw.contains_key("data"));
    assert_eq!(raw["second_axis_size"], serde_json::json!(4));
    let restored = HistoStatProps::from_raw(raw).unwrap();
    assert_eq!(restored, stat);
    assert_eq!(restored.base.bins_populations, stat.base.bins_populations);
}

#[test]
fn fio_edges_are_increasing_microseconds() {
    assert_eq!(plat_idx_to_val(0), 0.0);
    assert_eq!(plat_idx_to_val(127), 127.0);
    assert_eq!(plat_idx_to_val(128), 128.0);
    assert_eq!(plat_idx_to_val(192), 256.0);

    let edges = lat_bin_edges(PLAT_NR);
    assert_eq!(edges.len(), PLAT_NR + 1);
    assert_eq!(edges[0], 0.0);
    assert!(approx(edges[1], 0.001));
    assert!(edges.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn stat_kind_parses_its_own_names() {
    for kind in [StatKind::Basic, StatKind::Norm, StatKind::Histo] {
        assert_eq!(kind.as_str().parse::<StatKind>().unwrap(), kind);
    }
    assert!("normal".parse::<StatKind>().is_err());
}

#[test]
fn reduce_job_picks_variant_by_shape() {
    let source = DataSource::new().with_suite("fio_0").with_job("rrd4k_0");
    let iops = common::series(source.with_sensor("iops"), one_to_ten());
    let mut lat_rows = vec![0.0; 2 * 16];
    lat_rows[3] = 4.0;
    lat_rows[16 + 5] = 6.0;
    let lat = TimeSeries::new(
        "sda.lat",
        lat_rows,
        vec![1_000, 2_000],
        "us",
        source.with_sensor("lat"),
    )
    .with_second_axis(16);

    let key = |m: &str| ("n1".to_string(), "sda".to_string(), m.to_string());
    let mut raw = JobMetrics::new();
    raw.insert(key("iops"), iops);
    raw.insert(key("lat"), lat);
    let mut result = JobResult::new(common::job("rrd4k", 0), 0, 2_000, raw);

    let processed = reduce_job(&result, &ReductionConfig::default()).unwrap();
    assert_eq!(processed[&key("iops")].kind(), StatKind::Norm);
    assert!(approx(processed[&key("iops")].props().perc_50, 5.5));

    let lat_stat = &processed[&key("lat")];
    assert_eq!(lat_stat.kind(), StatKind::Histo);
    // buckets 3 and 5 of fio's linear range: 3 ns and 5 ns
    assert!(approx(lat_stat.props().min, 0.003));
    assert!(approx(lat_stat.props().max, 0.006));

    result.set_processed(processed);
    assert_eq!(result.processed.as_ref().map(|p| p.len()), Some(2));
}

#[test]
fn reduce_job_reports_bad_series() {
    let source = DataSource::new().with_suite("fio_0").with_job("rrd4k_0");
    let mut raw = JobMetrics::new();
    raw.insert(
        ("n1".into(), "sda".into(), "iops".into()),
        common::series(source, vec![1.0, f64::NAN]),
    );
    let result = JobResult::new(common::job("rrd4k", 0), 0, 2_000, raw);
    assert!(matches!(
        reduce_job(&result, &ReductionConfig::default()),
        Err(StatError::InvalidSample { index: 1, .. })
    ));
}

#[test]
fn summary_serializes_with_kind_tag() {
    let summary = reduce_series(
        &common::series(DataSource::new(), one_to_ten()),
        &ReductionConfig::default(),
    )
    .unwrap();
    let value = serde_json::to_value(&summary).unwrap();
    assert_eq!(value["kind"], serde_json::json!("norm"));
    let back: StatSummary = serde_json::from_value(value).unwrap();
    assert_eq!(back, summary);
}

fn through_json_text<T: Storable>(value: &T) -> T {
    let text = serde_json::to_string(&value.raw().unwrap()).unwrap();
    let raw: Map<String, Value> = serde_json::from_str(&text).unwrap();
    T::from_raw(raw).unwrap()
}

#[test]
fn noisy_norm_props_survive_json_text_exactly() {
    for seed in 0..50 {
        let data = common::noisy_samples(37, seed, 1000.0, 345.678);
        let stat = NormStatProps::from_samples(&data, 20, 0.95).unwrap();
        let back = through_json_text(&stat);
        assert_eq!(back, stat, "seed {}", seed);
        assert_eq!(back.average.to_bits(), stat.average.to_bits());
        assert_eq!(back.confidence.to_bits(), stat.confidence.to_bits());
        assert_eq!(back.base.perc_95.to_bits(), stat.base.perc_95.to_bits());
        assert_eq!(back.base.bins_mids, stat.base.bins_mids);
    }
}

#[test]
fn huge_range_keeps_percentiles_and_bins_finite() {
    let p = StatProps::from_samples(&[-1e308, 1e308], 4).unwrap();
    assert_eq!(p.perc_50, 0.0);
    assert!(approx(p.perc_90 / 1e308, 0.8));
    assert!(p.bins_mids.iter().all(|m| m.is_finite()));
    assert!(approx(p.bins_mids[0] / 1e308, -0.75));
    assert_eq!(p.bins_populations, vec![1, 0, 0, 1]);
    assert_eq!(through_json_text(&p), p);
}

#[test]
fn huge_magnitudes_keep_moments_finite() {
    let stat = NormStatProps::from_samples(&[-1e307, 1e307], 4, 0.95).unwrap();
    assert_eq!(stat.average, 0.0);
    assert!((stat.deviation / (2f64.sqrt() * 1e307) - 1.0).abs() < 1e-12);
    assert!(stat.confidence.is_finite());
    assert_eq!(stat.skew, 0.0);
    assert!(approx(stat.kurt, -2.0));
    assert_eq!(through_json_text(&stat), stat);
}

#[test]
fn unrepresentable_confidence_is_an_error() {
    assert_eq!(
        NormStatProps::from_samples(&[-1e308, 1e308], 4, 0.95).unwrap_err(),
        StatError::Overflow {
            field: "confidence"
        }
    );
}

#[test]
fn histo_fractional_weights_keep_their_mass() {
    // aggregated [0.5, 0.5, 1.0, 0.0], total 2
    let rows = [0.25, 0.25, 0.5, 0.0, 0.25, 0.25, 0.5, 0.0];
    let stat = HistoStatProps::from_rows(&rows, 4, &EDGES, None, 0.0).unwrap();
    assert_eq!(stat.base.perc_50, 1.0);
    assert_eq!(stat.base.perc_90, 2.0);
    assert_eq!(stat.base.min, 0.0);
    assert_eq!(stat.base.max, 4.0);

    let small = HistoStatProps::from_rows(&[0.4; 4], 4, &EDGES, Some(1), 0.0).unwrap();
    assert_eq!(small.base.min, 0.0);
    assert_eq!(small.base.max, 8.0);
    assert_eq!(small.base.bins_mids, vec![4.0]);
    assert_eq!(small.base.bins_populations, vec![2]);
}

#[test]
fn noisy_histo_props_survive_json_text_exactly() {
    let edges = lat_bin_edges(64);
    for seed in 0..20 {
        let rows = common::noisy_samples(3 * 64, seed, 0.0, 50.0);
        let stat = HistoStatProps::from_rows(&rows, 64, &edges, Some(10), 0.005).unwrap();
        let back = through_json_text(&stat);
        assert_eq!(back, stat, "seed {}", seed);
        assert_eq!(back.base.bins_mids, stat.base.bins_mids);
        assert_eq!(back.base.perc_99.to_bits(), stat.base.perc_99.to_bits());
    }
}

#[test]
fn stat_source_keeps_series_tag() {
    let base = DataSource::new()
        .with_suite("fio_0")
        .with_job("rrd4k_0")
        .with_sensor("iops");
    assert_eq!(stat_source(&base).tag.as_deref(), Some("stat"));

    let csv = base.with_tag("csv");
    let json = base.with_tag("json");
    assert_eq!(stat_source(&csv).tag.as_deref(), Some("csv-stat"));
    assert_ne!(stat_source(&csv), stat_source(&json));
    assert_ne!(stat_source(&csv), stat_source(&base));
    assert_eq!(stat_source(&csv).sensor, csv.sensor);
}
