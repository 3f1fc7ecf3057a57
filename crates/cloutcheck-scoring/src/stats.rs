use serde::{Deserialize, Serialize};

/// Mean, maximum and sample count of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub max: f64,
    pub count: usize,
}

/// Summarize `values`, or `None` when empty.
///
/// Values are sorted by total order before summing, so the result does not
/// depend on input order.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn summarize(mut values: Vec<f64>) -> Option<MetricSummary> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let sum: f64 = values.iter().sum();
    Some(MetricSummary {
        mean: sum / values.len() as f64,
        max: values.last().copied().unwrap_or(0.0),
        count: values.len(),
    })
}

/// Mean of `values` in total order, `0.0` when empty.
pub(crate) fn mean(values: Vec<f64>) -> f64 {
    summarize(values).map_or(0.0, |s| s.mean)
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round() / factor;
    // Avoid serializing "-0.0".
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
