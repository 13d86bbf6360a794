//! Approval decision data structures

use serde::{Deserialize, Serialize};

/// Outcome of applying the decision threshold to an approval score.
///
/// Scores are probabilities of a bad outcome, so lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Review,
}

impl Decision {
    /// Map a bad-outcome probability to a decision.
    ///
    /// Anything at or above the threshold goes to manual review.
    pub fn from_score(probability: f64, threshold: f64) -> Self {
        if probability < threshold {
            Decision::Approve
        } else {
            Decision::Review
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Review => "REVIEW",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored application returned by the approval classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPrediction {
    /// Probability of a bad outcome (0.0 - 1.0)
    pub approval_risk: f64,

    /// Threshold decision
    pub decision: Decision,

    /// Threshold the decision was taken against
    pub threshold: f64,

    /// Model that produced the score
    pub model_name: String,

    /// Model version or registry stage, when known
    pub model_version: Option<String>,
}
