//! Numeric helpers for the statistics engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Slope (°C/hour) beyond which a drive is considered heating or cooling
pub const TREND_NOISE_BAND: f64 = 0.1;

/// Direction of the fitted temperature trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Heating,
    Cooling,
    Stable,
    InsufficientData,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Heating => f.write_str("heating"),
            TrendDirection::Cooling => f.write_str("cooling"),
            TrendDirection::Stable => f.write_str("stable"),
            TrendDirection::InsufficientData => f.write_str("insufficient_data"),
        }
    }
}

/// Least-squares slope `b` of `y = a + b·x`
///
/// Returns 0 for fewer than two points or when every `x` is identical.
pub fn linear_regression_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;

    for (x, y) in points {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

/// Classify a slope, given how many points produced it
pub fn classify_trend(slope: f64, points: usize) -> TrendDirection {
    if points < 2 {
        TrendDirection::InsufficientData
    } else if slope > TREND_NOISE_BAND {
        TrendDirection::Heating
    } else if slope < -TREND_NOISE_BAND {
        TrendDirection::Cooling
    } else {
        TrendDirection::Stable
    }
}

/// Population standard deviation
pub(crate) fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
