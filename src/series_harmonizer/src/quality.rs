//! Read-only data-quality inspection of a canonical series.

use chrono::TimeDelta;
use demand_ingestor::models::canonical_series::CanonicalSeries;
use demand_ingestor::models::resolution::Resolution;
use indexmap::IndexMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityReport {
    pub rows: usize,
    pub missing_values: usize,
    /// Occurrences of each step between consecutive stamps, most frequent first.
    pub step_counts: IndexMap<TimeDelta, usize>,
}

impl QualityReport {
    /// The single step used throughout the series, if there is exactly one.
    pub fn constant_step(&self) -> Option<TimeDelta> {
        match self.step_counts.len() {
            1 => self.step_counts.keys().next().copied(),
            _ => None,
        }
    }
}

/// Count gaps and step irregularities. Never alters the series.
pub fn inspect(series: &CanonicalSeries) -> QualityReport {
    let missing_values = series.missing_values();
    if missing_values > 0 {
        warn!(
            missing_values,
            "There are {} missing values in the time series.", missing_values
        );
    }

    let mut counts: IndexMap<TimeDelta, usize> = IndexMap::new();
    for w in series.index().axis().windows(2) {
        *counts.entry(w[1] - w[0]).or_default() += 1;
    }
    // most frequent first, ties by shorter step
    counts.sort_by(|a, n, b, m| m.cmp(n).then(a.cmp(b)));

    let report = QualityReport {
        rows: series.len(),
        missing_values,
        step_counts: counts,
    };

    match report.constant_step() {
        Some(step) => info!(
            step = %Resolution::hours_label(step),
            "The time series has a constant time step of {}.",
            Resolution::hours_label(step)
        ),
        None if report.step_counts.len() > 1 => {
            let steps = report
                .step_counts
                .iter()
                .map(|(d, n)| format!("{}×{n}", Resolution::hours_label(*d)))
                .collect::<Vec<_>>()
                .join(", ");
            warn!(distinct_steps = report.step_counts.len(), "The time step differences are: {steps}.");
        }
        None => {}
    }
    report
}
