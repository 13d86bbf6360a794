//! Dealer context and bandit feedback structures

use serde::{Deserialize, Serialize};

/// Snapshot of a dealer at decision time.
///
/// Read-only input to arm selection; the recommender logs it but does not
/// keep it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealerContext {
    #[serde(default)]
    pub region: Option<String>,

    /// Monthly volume bucket (e.g. "low", "mid", "high")
    #[serde(default)]
    pub volume_tier: Option<String>,

    #[serde(default)]
    pub risk_flag: Option<bool>,
}

/// Observed reward for a previously recommended action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub dealer_id: String,

    #[serde(alias = "arm_id")]
    pub action_id: String,

    /// 1 for success (e.g. click), 0 otherwise
    pub reward: f64,
}

/// One row of historical arm performance used to seed the bandit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmHistoryRecord {
    pub dealer_id: String,
    pub arm_id: String,
    pub clicks: u64,
    pub impressions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_accepts_arm_id_alias() {
        let event: FeedbackEvent =
            serde_json::from_str(r#"{"dealer_id":"D1","arm_id":"layout_b","reward":1}"#).unwrap();
        assert_eq!(event.action_id, "layout_b");
        assert_eq!(event.reward, 1.0);
    }

    #[test]
    fn test_context_fields_are_optional() {
        let ctx: DealerContext = serde_json::from_str("{}").unwrap();
        assert_eq!(ctx, DealerContext::default());
    }
}
