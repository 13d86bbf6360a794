//! Request and response bodies for the REST API

use crate::types::application::LoanApplication;
use crate::types::decision::ApprovalPrediction;
use crate::types::dealer::DealerContext;
use crate::types::event::PredictionEvent;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENTS_LIMIT: usize = 20;
pub const MAX_EVENTS_LIMIT: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationRequest {
    pub dealer_id: String,
    pub vehicle_type: String,
    pub region: String,
    pub applicant_income: f64,
    pub loan_amount: f64,
    pub vehicle_age: i32,
}

impl From<ApplicationRequest> for LoanApplication {
    fn from(req: ApplicationRequest) -> Self {
        LoanApplication {
            dealer_id: req.dealer_id,
            vehicle_type: req.vehicle_type,
            region: req.region,
            applicant_income: req.applicant_income,
            loan_amount: req.loan_amount,
            vehicle_age: req.vehicle_age,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    pub dealer_id: String,
    /// Candidate actions; the configured default arms are used when absent
    #[serde(default)]
    pub available_actions: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<DealerContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub dealer_id: String,
    pub recommended_action: String,
    pub candidates: Vec<String>,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditUpdateResponse {
    pub status: String,
    pub message: String,
    pub dealer_id: String,
    pub action_id: String,
    pub successes: f64,
    pub failures: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

impl EventsQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_EVENTS_LIMIT)
            .min(MAX_EVENTS_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub count: usize,
    pub events: Vec<PredictionEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub prediction: ApprovalPrediction,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_limit_is_capped() {
        assert_eq!(EventsQuery::default().limit(), 20);
        assert_eq!(EventsQuery { limit: Some(5) }.limit(), 5);
        assert_eq!(EventsQuery { limit: Some(5000) }.limit(), 200);
    }

    #[test]
    fn test_recommendation_request_optional_fields() {
        let req: RecommendationRequest = serde_json::from_str(r#"{"dealer_id": "D001"}"#).unwrap();
        assert!(req.available_actions.is_none());
        assert!(req.context.is_none());

        let req: RecommendationRequest = serde_json::from_str(
            r#"{"dealer_id": "D001", "available_actions": ["sms", "call"], "context": {"region": "south"}}"#,
        )
        .unwrap();
        assert_eq!(req.available_actions.unwrap().len(), 2);
        assert_eq!(req.context.unwrap().region.as_deref(), Some("south"));
    }
}
