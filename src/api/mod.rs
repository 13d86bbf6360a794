//! REST API over the approval classifier, dealer bandit and monitor

pub mod error;
pub mod routes;
pub mod schemas;

pub use error::ApiError;
pub use routes::create_router;

use crate::config::AppConfig;
use crate::metrics::MonitoringState;
use crate::models::{ApprovalClassifier, DealerBandit};
use anyhow::Result;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<ApprovalClassifier>,
    pub bandit: Arc<DealerBandit>,
    pub monitoring: Arc<MonitoringState>,
}

impl AppState {
    pub fn new(
        classifier: Arc<ApprovalClassifier>,
        bandit: Arc<DealerBandit>,
        monitoring: Arc<MonitoringState>,
    ) -> Self {
        Self {
            classifier,
            bandit,
            monitoring,
        }
    }

    /// Build every component from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let classifier = ApprovalClassifier::from_config(&config.models)?;
        let bandit = DealerBandit::from_config(&config.bandit)?;
        let monitoring = MonitoringState::from_config(&config.monitoring)?;
        Ok(Self::new(
            Arc::new(classifier),
            Arc::new(bandit),
            Arc::new(monitoring),
        ))
    }
}
