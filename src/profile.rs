use serde::{Deserialize, Serialize};

use crate::frame::{DataFrame, Series};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Identifier,
    Categorical,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub outliers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub missing_pct: f64,
    pub unique: usize,
    pub numeric: Option<NumericSummary>,
    pub insight: String,
}

const CATEGORICAL_MAX_UNIQUE: usize = 20;
const NEAR_CONSTANT_STD: f64 = 1e-3;

pub fn profile_columns(frame: &DataFrame) -> Vec<ColumnProfile> {
    frame.columns().iter().map(profile_series).collect()
}

fn profile_series(series: &Series) -> ColumnProfile {
    let len = series.len();
    let missing_pct = if len == 0 {
        0.0
    } else {
        series.missing_count() as f64 / len as f64 * 100.0
    };
    let unique = series.unique_count();

    let numeric = series.numeric_values().map(|values| summarize(&values));

    let kind = if numeric.is_some() {
        ColumnKind::Numeric
    } else if unique == 2 {
        ColumnKind::Boolean
    } else if len > 0 && unique == len {
        ColumnKind::Identifier
    } else if unique <= CATEGORICAL_MAX_UNIQUE {
        ColumnKind::Categorical
    } else {
        ColumnKind::Text
    };

    let insight = insight_for(kind, missing_pct, unique, numeric.as_ref());

    ColumnProfile {
        name: series.name().to_string(),
        kind,
        missing_pct,
        unique,
        numeric,
        insight,
    }
}

fn insight_for(
    kind: ColumnKind,
    missing_pct: f64,
    unique: usize,
    numeric: Option<&NumericSummary>,
) -> String {
    if kind == ColumnKind::Identifier {
        return "Unique identifier column; not suited to statistical summaries.".to_string();
    }
    if missing_pct > 0.0 {
        return format!("{:.1}% of values are missing.", missing_pct);
    }
    if let Some(summary) = numeric {
        if summary.std_dev < NEAR_CONSTANT_STD {
            return "Standard deviation is near zero; the column is almost constant.".to_string();
        }
    }
    if kind == ColumnKind::Categorical && unique < 5 {
        return format!("Categorical column with only {} distinct values.", unique);
    }
    "No notable issues in this column.".to_string()
}

fn summarize(values: &[f64]) -> NumericSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = quantile(&sorted, 0.5);

    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;
    let outliers = sorted
        .iter()
        .filter(|v| **v < lower_fence || **v > upper_fence)
        .count();

    NumericSummary {
        min,
        max,
        mean,
        median,
        std_dev,
        outliers,
    }
}

// Linear interpolation between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
