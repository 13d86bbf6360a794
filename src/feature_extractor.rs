//! Feature extraction for credit approval model inference.
//!
//! Produces the engineered column set the approval model was exported
//! against. The same builder feeds the uplift dataset so offline and online
//! features never diverge.

use crate::types::application::LoanApplication;

/// Vehicle ages strictly above this count as old
pub const OLD_VEHICLE_AGE_YEARS: i32 = 7;

/// Added to the loan amount before dividing
const RATIO_EPSILON: f64 = 1e-6;

/// Known vehicle types in alphabetical order; the first is the dropped baseline
const VEHICLE_TYPES: [&str; 3] = ["car", "suv", "truck"];

/// Known regions in alphabetical order; the first is the dropped baseline
const REGIONS: [&str; 3] = ["midwest", "south", "west"];

const NUMERIC_FEATURES: [&str; 5] = [
    "applicant_income",
    "loan_amount",
    "vehicle_age",
    "income_to_loan_ratio",
    "is_old_vehicle",
];

/// Named feature rows for a batch of applications
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Feature extractor that transforms applications into model input features.
///
/// Features are emitted in the exact order expected by the ONNX model.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from an application.
    pub fn extract(&self, app: &LoanApplication) -> Vec<f32> {
        let mut features = Vec::with_capacity(self.feature_count());

        // Raw numerics
        features.push(app.applicant_income as f32);
        features.push(app.loan_amount as f32);
        features.push(app.vehicle_age as f32);

        // Engineered
        features.push(income_to_loan_ratio(app.applicant_income, app.loan_amount) as f32);
        let is_old_vehicle = if app.vehicle_age > OLD_VEHICLE_AGE_YEARS { 1.0 } else { 0.0 };
        features.push(is_old_vehicle);

        // One-hot categoricals, baseline level dropped
        push_one_hot(&mut features, &app.vehicle_type, &VEHICLE_TYPES);
        push_one_hot(&mut features, &app.region, &REGIONS);

        features
    }

    /// Build a feature matrix for a batch of applications.
    pub fn build_feature_matrix(&self, apps: &[LoanApplication]) -> FeatureMatrix {
        FeatureMatrix {
            columns: self.feature_names().into_iter().map(String::from).collect(),
            rows: apps.iter().map(|app| self.extract(app)).collect(),
        }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        NUMERIC_FEATURES.len() + (VEHICLE_TYPES.len() - 1) + (REGIONS.len() - 1)
    }

    /// Get feature names in model order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect();
        names.extend(VEHICLE_TYPES[1..].iter().map(|v| format!("vehicle_type_{v}")));
        names.extend(REGIONS[1..].iter().map(|r| format!("region_{r}")));
        names
    }
}

pub fn income_to_loan_ratio(applicant_income: f64, loan_amount: f64) -> f64 {
    applicant_income / (loan_amount + RATIO_EPSILON)
}

fn push_one_hot(features: &mut Vec<f32>, value: &str, levels: &[&str]) {
    let value = value.trim().to_ascii_lowercase();
    for level in &levels[1..] {
        features.push(if value == *level { 1.0 } else { 0.0 });
    }
}
