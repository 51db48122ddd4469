// Normal-distribution statistics for scalar metrics (iops, bandwidth).
//
// Deviation is the unbiased sample deviation. Skew is the Fisher-Pearson g1,
// kurt is the excess g2. The normality test is D'Agostino-Pearson K^2 and
// needs at least MIN_NORMTEST_SAMPLES non-constant samples.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use std::fmt;

use super::{StatError, StatKind, StatProps, StatVariant, check_samples, round_digits, sorted_copy};
use crate::models::{Storable, storable_eq};

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
pub const MIN_NORMTEST_SAMPLES: usize = 8;

/// Normality test result. Persisted as `[statistic, pvalue]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct NormalTest {
    pub statistic: f64,
    pub pvalue: f64,
}

impl NormalTest {
    /// True when the null hypothesis (data is normal) is rejected at `alpha`.
    pub fn rejects_normality(&self, alpha: f64) -> bool {
        self.pvalue < alpha
    }
}

impl From<(f64, f64)> for NormalTest {
    fn from((statistic, pvalue): (f64, f64)) -> Self {
        Self { statistic, pvalue }
    }
}

impl From<NormalTest> for (f64, f64) {
    fn from(t: NormalTest) -> Self {
        (t.statistic, t.pvalue)
    }
}

impl fmt::Display for NormalTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NormaltestResult(statistic={}, pvalue={})",
            round_digits(self.statistic),
            round_digits(self.pvalue)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormStatProps {
    #[serde(flatten)]
    pub base: StatProps,
    pub average: f64,
    pub deviation: f64,
    /// Half-width of the two-sided confidence interval around `average`.
    pub confidence: f64,
    pub confidence_level: f64,
    pub normtest: Option<NormalTest>,
    pub skew: f64,
    pub kurt: f64,
}

impl NormStatProps {
    pub fn from_samples(
        data: &[f64],
        bins_count: usize,
        confidence_level: f64,
    ) -> Result<Self, StatError> {
        check_samples(data)?;
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(StatError::InvalidConfidence(confidence_level));
        }
        let sorted = sorted_copy(data);
        let base = StatProps::from_sorted(&sorted, data, bins_count);

        let n = data.len() as f64;
        let sum = data.iter().sum::<f64>();
        let average = if sum.is_finite() {
            sum / n
        } else {
            data.iter().map(|x| x / n).sum()
        };
        let scale = moment_scale(data);
        let moments = CentralMoments::new(data, scale);

        let deviation = if data.len() > 1 {
            (moments.m2 * n / (n - 1.0)).sqrt() * scale
        } else {
            0.0
        };

        let z = Normal::standard().inverse_cdf((1.0 + confidence_level) / 2.0);
        let confidence = z * (deviation / n.sqrt());

        // Constant input has no shape; keep skew/kurt at zero and skip the test.
        let constant = base.min == base.max;
        let (skew, kurt, normtest) = if constant {
            (0.0, 0.0, None)
        } else {
            let g1 = moments.m3 / moments.m2.powf(1.5);
            let b2 = moments.m4 / (moments.m2 * moments.m2);
            let normtest = if data.len() >= MIN_NORMTEST_SAMPLES {
                normal_test(g1, b2, data.len())
            } else {
                None
            };
            (g1, b2 - 3.0, normtest)
        };

        for (field, value) in [
            ("average", average),
            ("deviation", deviation),
            ("confidence", confidence),
            ("skew", skew),
            ("kurt", kurt),
        ] {
            if !value.is_finite() {
                return Err(StatError::Overflow { field });
            }
        }

        Ok(Self {
            base,
            average,
            deviation,
            confidence,
            confidence_level,
            normtest,
            skew,
            kurt,
        })
    }

    /// Interval expected to contain the true mean at `confidence_level`.
    pub fn confidence_interval(&self) -> (f64, f64) {
        (
            self.average - self.confidence,
            self.average + self.confidence,
        )
    }
}

impl PartialEq for NormStatProps {
    fn eq(&self, other: &Self) -> bool {
        storable_eq(self, other)
    }
}

impl Storable for NormStatProps {
    const IGNORED_FIELDS: &'static [&'static str] = &["data"];
}

impl StatVariant for NormStatProps {
    const KIND: StatKind = StatKind::Norm;

    fn props(&self) -> &StatProps {
        &self.base
    }
}

impl fmt::Display for NormStatProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NormStatProps(size = {}):", self.base.sample_count())?;
        writeln!(
            f,
            "    distr = {} ~ {}",
            round_digits(self.average),
            round_digits(self.deviation)
        )?;
        writeln!(
            f,
            "    confidence({}) = {}",
            self.confidence_level,
            round_digits(self.confidence)
        )?;
        self.base.fmt_body(f)?;
        writeln!(f)?;
        match &self.normtest {
            Some(t) => writeln!(f, "    normtest = {}", t)?,
            None => writeln!(f, "    normtest = n/a")?,
        }
        write!(
            f,
            "    skew ~ kurt = {} ~ {}",
            round_digits(self.skew),
            round_digits(self.kurt)
        )
    }
}

/// Power of two near the largest magnitude in `data`. Dividing by it is exact and keeps
/// every scaled sample small enough that its fourth power stays finite.
fn moment_scale(data: &[f64]) -> f64 {
    let max_abs = data.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if max_abs == 0.0 {
        return 1.0;
    }
    2f64.powi(max_abs.log2().floor().clamp(-1022.0, 1023.0) as i32)
}

/// Population central moments m2..m4 (divided by n) of `data / scale`.
struct CentralMoments {
    m2: f64,
    m3: f64,
    m4: f64,
}

impl CentralMoments {
    fn new(data: &[f64], scale: f64) -> Self {
        let n = data.len() as f64;
        let mean = data.iter().map(|x| x / scale).sum::<f64>() / n;
        let (mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0);
        for &x in data {
            let d = x / scale - mean;
            let d2 = d * d;
            s2 += d2;
            s3 += d2 * d;
            s4 += d2 * d2;
        }
        Self {
            m2: s2 / n,
            m3: s3 / n,
            m4: s4 / n,
        }
    }
}

/// D'Agostino-Pearson K^2 from sample skewness `g1` and Pearson kurtosis `b2`.
fn normal_test(g1: f64, b2: f64, n: usize) -> Option<NormalTest> {
    let zs = skew_test(g1, n as f64);
    let zk = kurtosis_test(b2, n as f64)?;
    let statistic = zs * zs + zk * zk;
    let pvalue = ChiSquared::new(2.0).ok()?.sf(statistic);
    if statistic.is_finite() && pvalue.is_finite() {
        Some(NormalTest { statistic, pvalue })
    } else {
        None
    }
}

/// D'Agostino skewness z-score.
fn skew_test(g1: f64, n: f64) -> f64 {
    let y = g1 * (((n + 1.0) * (n + 3.0)) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

/// Anscombe-Glynn kurtosis z-score. None when the transform is undefined.
fn kurtosis_test(b2: f64, n: f64) -> Option<f64> {
    let e = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - e) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * ((6.0 * (n + 3.0) * (n + 5.0)) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return None;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    Some((term1 - term2) / (2.0 / (9.0 * a)).sqrt())
}
