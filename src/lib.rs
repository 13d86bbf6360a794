//! Credit Flywheel Service Library
//!
//! Approval scoring for used-vehicle finance applications, Thompson-Sampling
//! next-action recommendations for dealers, offline uplift datasets and
//! in-memory monitoring with score drift.

pub mod api;
pub mod config;
pub mod copilot;
pub mod drift;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod types;

pub use api::{create_router, AppState};
pub use config::AppConfig;
pub use error::ServiceError;
pub use feature_extractor::FeatureExtractor;
pub use metrics::MonitoringState;
pub use models::{ApprovalClassifier, DealerBandit};
pub use types::{ApprovalPrediction, Decision, LoanApplication};
