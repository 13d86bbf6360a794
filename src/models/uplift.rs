//! Offline uplift dataset construction for lifecycle treatment analysis.
//!
//! Produces `(account_id, features..., treatment, treatment_indicator,
//! observed_outcome)` rows for consumption by an external causal
//! meta-learner. No estimation happens here; column construction is
//! deterministic for a given input.

use crate::error::ServiceError;
use crate::feature_extractor::FeatureExtractor;
use crate::types::application::LoanApplication;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const DEFAULT_CONTROL_LABEL: &str = "control";

/// One account from a lifecycle experiment or policy log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub account_id: String,
    /// Strategy applied, e.g. "sms", "call", "email", "control"
    pub treatment: String,
    /// Observed outcome, e.g. paid_on_time (0/1)
    pub outcome: f64,
    pub dealer_id: String,
    pub vehicle_type: String,
    pub region: String,
    pub applicant_income: f64,
    pub loan_amount: f64,
    pub vehicle_age: i32,
}

impl LifecycleRecord {
    pub fn application(&self) -> LoanApplication {
        LoanApplication {
            dealer_id: self.dealer_id.clone(),
            vehicle_type: self.vehicle_type.clone(),
            region: self.region.clone(),
            applicant_income: self.applicant_income,
            loan_amount: self.loan_amount,
            vehicle_age: self.vehicle_age,
        }
    }
}

/// Row of the finished dataset
#[derive(Debug, Clone, PartialEq)]
pub struct UpliftRow {
    pub account_id: String,
    pub features: Vec<f32>,
    pub treatment: String,
    /// 0 for control, 1..n for treatments in sorted label order
    pub treatment_code: u32,
    /// 1 when any non-control treatment was applied
    pub treatment_indicator: u8,
    pub observed_outcome: f64,
}

/// Per-treatment descriptive statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentSummary {
    pub treatment: String,
    pub rows: usize,
    pub mean_outcome: f64,
}

/// Finished uplift dataset
#[derive(Debug, Clone, PartialEq)]
pub struct UpliftDataset {
    pub feature_names: Vec<String>,
    /// Treatment label -> code; control is always 0
    pub treatment_codes: BTreeMap<String, u32>,
    pub rows: Vec<UpliftRow>,
}

impl UpliftDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header in output column order
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.feature_names.len() + 4);
        columns.push("account_id".to_string());
        columns.extend(self.feature_names.iter().cloned());
        columns.push("treatment".to_string());
        columns.push("treatment_indicator".to_string());
        columns.push("observed_outcome".to_string());
        columns
    }

    /// Row counts and mean outcome per treatment label
    pub fn summary(&self) -> Vec<TreatmentSummary> {
        let mut groups: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
        for row in &self.rows {
            let entry = groups.entry(row.treatment.as_str()).or_default();
            entry.0 += 1;
            entry.1 += row.observed_outcome;
        }
        groups
            .into_iter()
            .map(|(treatment, (rows, total))| TreatmentSummary {
                treatment: treatment.to_string(),
                rows,
                mean_outcome: total / rows as f64,
            })
            .collect()
    }

    /// Write the dataset as CSV
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.columns())?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(row.features.len() + 4);
            record.push(row.account_id.clone());
            record.extend(row.features.iter().map(|f| f.to_string()));
            record.push(row.treatment.clone());
            record.push(row.treatment_indicator.to_string());
            record.push(row.observed_outcome.to_string());
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create uplift dataset {}", path.display()))?;
        self.write_to(file)?;
        info!(path = %path.display(), rows = self.rows.len(), "Uplift dataset written");
        Ok(())
    }
}

/// Builds uplift datasets from lifecycle records
pub struct UpliftDatasetBuilder {
    extractor: FeatureExtractor,
    control_label: String,
}

impl UpliftDatasetBuilder {
    pub fn new(control_label: &str) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            control_label: normalize_label(control_label),
        }
    }

    pub fn build(&self, records: &[LifecycleRecord]) -> Result<UpliftDataset, ServiceError> {
        for record in records {
            if record.account_id.trim().is_empty() {
                return Err(ServiceError::invalid("account_id must not be empty"));
            }
            if normalize_label(&record.treatment).is_empty() {
                return Err(ServiceError::invalid(format!(
                    "account {} has no treatment label",
                    record.account_id
                )));
            }
            if !record.outcome.is_finite() {
                return Err(ServiceError::invalid(format!(
                    "account {} has a non-finite outcome",
                    record.account_id
                )));
            }
            record.application().validate()?;
        }

        let treatment_codes = self.treatment_codes(records);
        let rows = records
            .iter()
            .map(|record| {
                let treatment = normalize_label(&record.treatment);
                let treatment_code = treatment_codes[&treatment];
                UpliftRow {
                    account_id: record.account_id.clone(),
                    features: self.extractor.extract(&record.application()),
                    treatment_indicator: u8::from(treatment_code != 0),
                    treatment,
                    treatment_code,
                    observed_outcome: record.outcome,
                }
            })
            .collect();

        Ok(UpliftDataset {
            feature_names: self.extractor.feature_names(),
            treatment_codes,
            rows,
        })
    }

    /// Control maps to 0, remaining labels to 1..n in sorted order
    fn treatment_codes(&self, records: &[LifecycleRecord]) -> BTreeMap<String, u32> {
        let labels: BTreeSet<String> = records
            .iter()
            .map(|r| normalize_label(&r.treatment))
            .filter(|t| *t != self.control_label)
            .collect();

        let mut codes = BTreeMap::new();
        codes.insert(self.control_label.clone(), 0);
        for (i, label) in labels.into_iter().enumerate() {
            codes.insert(label, i as u32 + 1);
        }
        codes
    }
}

impl Default for UpliftDatasetBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_LABEL)
    }
}

/// Load lifecycle records from CSV
pub fn load_lifecycle_records<P: AsRef<Path>>(path: P) -> Result<Vec<LifecycleRecord>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open lifecycle dataset {}", path.display()))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<LifecycleRecord>, _>>()
        .with_context(|| format!("Failed to parse lifecycle dataset {}", path.display()))
}

/// Write lifecycle records as CSV
pub fn save_lifecycle_records<P: AsRef<Path>>(path: P, records: &[LifecycleRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create lifecycle dataset {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(account_id: &str, treatment: &str, outcome: f64) -> LifecycleRecord {
        LifecycleRecord {
            account_id: account_id.to_string(),
            treatment: treatment.to_string(),
            outcome,
            dealer_id: "7".to_string(),
            vehicle_type: "suv".to_string(),
            region: "west".to_string(),
            applicant_income: 42000.0,
            loan_amount: 14000.0,
            vehicle_age: 9,
        }
    }

    #[test]
    fn test_build_columns_and_indicator() {
        let records = vec![
            record("A1", "control", 0.0),
            record("A2", "SMS", 1.0),
            record("A3", "call", 1.0),
            record("A4", " sms ", 0.0),
        ];

        let dataset = UpliftDatasetBuilder::default().build(&records).unwrap();
        assert_eq!(dataset.len(), 4);

        let columns = dataset.columns();
        assert_eq!(columns.first().map(String::as_str), Some("account_id"));
        assert_eq!(columns[columns.len() - 2], "treatment_indicator");
        assert_eq!(columns.last().map(String::as_str), Some("observed_outcome"));
        assert!(columns.contains(&"income_to_loan_ratio".to_string()));

        assert_eq!(dataset.treatment_codes["control"], 0);
        assert_eq!(dataset.treatment_codes["call"], 1);
        assert_eq!(dataset.treatment_codes["sms"], 2);

        assert_eq!(dataset.rows[0].treatment_indicator, 0);
        assert_eq!(dataset.rows[1].treatment_indicator, 1);
        assert_eq!(dataset.rows[1].treatment, "sms");
        assert_eq!(dataset.rows[3].treatment_code, 2);
    }

    #[test]
    fn test_build_is_deterministic() {
        let records = vec![record("A1", "email", 1.0), record("A2", "control", 0.0)];
        let builder = UpliftDatasetBuilder::default();
        assert_eq!(builder.build(&records).unwrap(), builder.build(&records).unwrap());
    }

    #[test]
    fn test_rejects_bad_records() {
        let builder = UpliftDatasetBuilder::default();
        assert!(builder.build(&[record("A1", "", 1.0)]).is_err());
        assert!(builder.build(&[record("A1", "sms", f64::NAN)]).is_err());
        assert!(builder.build(&[record(" ", "sms", 1.0)]).is_err());
    }

    #[test]
    fn test_summary() {
        let records = vec![
            record("A1", "control", 0.0),
            record("A2", "control", 1.0),
            record("A3", "sms", 1.0),
        ];
        let summary = UpliftDatasetBuilder::default().build(&records).unwrap().summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].treatment, "control");
        assert_eq!(summary[0].rows, 2);
        assert_eq!(summary[0].mean_outcome, 0.5);
        assert_eq!(summary[1].mean_outcome, 1.0);
    }

    #[test]
    fn test_csv_output() {
        let records = vec![record("A1", "control", 0.0), record("A2", "call", 1.0)];
        let dataset = UpliftDatasetBuilder::default().build(&records).unwrap();

        let mut buf = Vec::new();
        dataset.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("account_id,applicant_income"));
        assert!(lines[0].ends_with("treatment,treatment_indicator,observed_outcome"));
        assert!(lines[2].starts_with("A2,42000,"));
        assert!(lines[2].ends_with("call,1,1"));
    }

    #[test]
    fn test_lifecycle_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifecycle_uplift_dataset.csv");
        let records = vec![record("A1", "sms", 1.0), record("A2", "control", 0.0)];

        save_lifecycle_records(&path, &records).unwrap();
        assert_eq!(load_lifecycle_records(&path).unwrap(), records);
    }
}
