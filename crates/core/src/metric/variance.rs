use crate::error::MetricError;
use crate::submission::{Submission, Value};

/// Re-weights a finished base matrix by how much each pair stands out from
/// the rest of both rows. At importance 0 the base scores pass through.
#[derive(Debug, Clone)]
pub struct Variance {
    key: String,
    base_key: String,
    mean_key: String,
    side_sd_key: String,
    outlier_importance: f64,
}

impl Variance {
    pub fn new(base_key: impl Into<String>, outlier_importance: f64) -> Self {
        let base_key = base_key.into();
        let key = format!("variance_on_{base_key}_{outlier_importance}");
        Self::with_key(key, base_key, outlier_importance)
    }

    pub fn with_key(
        key: impl Into<String>,
        base_key: impl Into<String>,
        outlier_importance: f64,
    ) -> Self {
        let key = key.into();
        Self {
            mean_key: format!("{key}_mean"),
            side_sd_key: format!("{key}_ssd"),
            key,
            base_key: base_key.into(),
            outlier_importance,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn outlier_importance(&self) -> f64 {
        self.outlier_importance
    }

    pub(crate) fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "base": self.base_key,
            "outlierImportance": self.outlier_importance,
        })
    }

    pub(crate) fn preprocess(&self, sub: &mut Submission) -> Result<(), MetricError> {
        if sub.contains(&self.mean_key) && sub.contains(&self.side_sd_key) {
            return Ok(());
        }
        let (mean, side_sd) = row_stats(sub.row(&self.base_key)?, sub.index());
        sub.insert(self.mean_key.clone(), Value::Number(mean));
        sub.insert(self.side_sd_key.clone(), Value::Number(side_sd));
        Ok(())
    }

    pub(crate) fn score(&self, a: &Submission, b: &Submission) -> Result<f32, MetricError> {
        let base = a.distance_to(&self.base_key, b.index())?;
        if base < 0.0 || base.is_nan() {
            return Err(MetricError::FailedBase {
                key: self.base_key.clone(),
            });
        }
        let a_in_b = b.distance_to(&self.base_key, a.index())?;

        let dev_a_in_b = side_deviation(
            b.number(&self.mean_key)?,
            a_in_b,
            b.number(&self.side_sd_key)?,
        );
        let dev_b_in_a = side_deviation(
            a.number(&self.mean_key)?,
            base,
            a.number(&self.side_sd_key)?,
        );

        let exponent = dev_a_in_b * dev_b_in_a;
        let idisp = if exponent.is_nan() {
            1.0
        } else {
            1.0 / 2f64.powf(exponent)
        };
        let w = self.outlier_importance;
        Ok(((idisp * w + (1.0 - w)) * f64::from(base)) as f32)
    }
}

/// Mean of the row without the diagonal or failed cells, and the deviation
/// of the cells below that mean.
pub(crate) fn row_stats(row: &[f32], own_index: usize) -> (f64, f64) {
    let values: Vec<f64> = row
        .iter()
        .enumerate()
        .filter(|&(i, &v)| i != own_index && v >= 0.0)
        .map(|(_, &v)| f64::from(v))
        .collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    let mut sum_sq = 0.0;
    let mut below = 0usize;
    for &v in values.iter().filter(|&&v| v < mean) {
        sum_sq += (v - mean) * (v - mean);
        below += 1;
    }
    let side_sd = if below == 0 {
        0.0
    } else {
        (sum_sq / below as f64).sqrt()
    };
    (mean, side_sd)
}

fn side_deviation(mean: f64, value: f32, side_sd: f64) -> f64 {
    if side_sd <= 0.0 {
        return 0.0;
    }
    (mean - f64::from(value)).max(0.0) / side_sd
}
