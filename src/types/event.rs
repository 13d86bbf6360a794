//! Audit record for scored applications

use crate::types::application::LoanApplication;
use crate::types::decision::{ApprovalPrediction, Decision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lightweight record of a prediction kept for audit and debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionEvent {
    /// Unique event identifier
    pub event_id: String,

    pub timestamp: DateTime<Utc>,

    pub dealer_id: String,

    pub region: String,

    pub model_name: String,

    pub model_version: Option<String>,

    pub approval_risk: f64,

    pub decision: Decision,
}

impl PredictionEvent {
    /// Create an event for a scored application
    pub fn new(application: &LoanApplication, prediction: &ApprovalPrediction) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            dealer_id: application.dealer_id.clone(),
            region: application.region.clone(),
            model_name: prediction.model_name.clone(),
            model_version: prediction.model_version.clone(),
            approval_risk: prediction.approval_risk,
            decision: prediction.decision,
        }
    }
}
