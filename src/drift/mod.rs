//! Drift detection module
//!
//! Compares the train split against the test split column by column with a
//! two-sample KS test and summarises the result into a pass/fail verdict plus
//! a per-column report.

mod data_drift;

pub use data_drift::{kolmogorov_q, KolmogorovSmirnovTest, KsResult};

use crate::error::{NetsecError, Result};
use crate::utils::data_loader::column_to_vec;
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use tracing::{debug, info};

/// Per-column entry of the drift report
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub d_statistic: f64,
    /// True when `p_value` is below the threshold
    pub drift_status: bool,
}

/// Column name to drift entry, in base frame column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftReport {
    entries: Vec<(String, ColumnDrift)>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, entry: ColumnDrift) {
        self.entries.push((column.into(), entry));
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDrift> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDrift)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drifted_count(&self) -> usize {
        self.entries.iter().filter(|(_, e)| e.drift_status).count()
    }

    /// Names of drifted columns
    pub fn drifted_columns(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.drift_status)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl Serialize for DriftReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// Verdict plus the report it was derived from
#[derive(Debug, Clone)]
pub struct DriftOutcome {
    /// False only when the drifted fraction exceeds the allowed maximum
    pub drift_ok: bool,
    pub report: DriftReport,
}

/// `drifted / total <= max_fraction`; an empty comparison is acceptable.
pub fn drift_ok_from_counts(drifted: usize, total: usize, max_fraction: f64) -> bool {
    if total == 0 {
        return true;
    }
    drifted as f64 / total as f64 <= max_fraction
}

/// Column-wise drift detector
#[derive(Debug, Clone)]
pub struct DriftDetector {
    /// A column drifts when its p-value falls below this
    threshold: f64,
    /// Largest drifted fraction still considered acceptable
    max_drift_fraction: f64,
    test: KolmogorovSmirnovTest,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(0.05, 0.1)
    }
}

impl DriftDetector {
    pub fn new(threshold: f64, max_drift_fraction: f64) -> Self {
        Self {
            threshold,
            max_drift_fraction,
            test: KolmogorovSmirnovTest::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Test every column of `base` against the same-named column of `current`.
    pub fn detect(&self, base: &DataFrame, current: &DataFrame) -> Result<DriftOutcome> {
        let mut pairs = Vec::with_capacity(base.width());
        for series in base.get_columns() {
            let name = series.name().to_string();
            let other = current
                .column(&name)
                .map_err(|_| NetsecError::ColumnNotFound(name.clone()))?;
            pairs.push((name, column_to_vec(series)?, column_to_vec(other)?));
        }

        let entries: Vec<(String, ColumnDrift)> = pairs
            .into_par_iter()
            .map(|(name, reference, observed)| {
                let ks = self.test.test(&reference, &observed);
                let entry = ColumnDrift {
                    p_value: ks.p_value,
                    d_statistic: ks.statistic,
                    drift_status: ks.p_value < self.threshold,
                };
                (name, entry)
            })
            .collect();

        let report = DriftReport { entries };
        for (name, entry) in report.iter() {
            debug!(column = name, p_value = entry.p_value, d = entry.d_statistic, "KS test");
        }

        let drifted = report.drifted_count();
        let drift_ok = drift_ok_from_counts(drifted, report.len(), self.max_drift_fraction);
        info!(
            drifted,
            total = report.len(),
            drift_ok,
            "Drift detection finished"
        );

        Ok(DriftOutcome { drift_ok, report })
    }
}
