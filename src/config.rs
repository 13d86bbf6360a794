//! Configuration management for the credit flywheel service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "FLYWHEEL_CONFIG";

/// How bandit rewards are validated before being applied
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RewardPolicy {
    /// Only exactly 0 or 1 is accepted
    #[default]
    Binary,
    /// Any finite value in [0, 1] is accepted
    Fractional,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub bandit: BanditConfig,
    pub monitoring: MonitoringConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on
    pub bind_addr: String,
}

/// Approval model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Path to the ONNX export of the approval model
    pub approval_model_path: String,
    /// Name reported alongside predictions
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Version or registry stage reported alongside predictions
    #[serde(default)]
    pub model_version: Option<String>,
    /// Bad-outcome probability at or above which applications go to review
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_model_name() -> String {
    "credit_approval_xgb".to_string()
}

fn default_decision_threshold() -> f64 {
    0.4
}

fn default_onnx_threads() -> usize {
    1
}

/// Dealer bandit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BanditConfig {
    /// Arms always offered when a request carries no candidate list
    #[serde(default = "default_arms")]
    pub default_arms: Vec<String>,
    /// Optional CSV of historical clicks/impressions used to seed the posteriors
    #[serde(default)]
    pub history_path: Option<String>,
    #[serde(default)]
    pub reward_policy: RewardPolicy,
}

fn default_arms() -> Vec<String> {
    vec![
        "layout_a".to_string(),
        "layout_b".to_string(),
        "layout_c".to_string(),
    ]
}

/// In-memory monitoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Latency samples retained; oldest evicted first
    #[serde(default = "default_latency_capacity")]
    pub latency_capacity: usize,
    /// Prediction events retained for the audit endpoint
    #[serde(default = "default_max_events")]
    pub max_events_kept: usize,
    /// Score buckets used when no reference distribution file is present
    #[serde(default = "default_psi_buckets")]
    pub psi_buckets: usize,
    /// JSON reference distribution of approval scores from training
    #[serde(default)]
    pub reference_path: Option<String>,
    /// Seconds between logged summaries (0 disables the reporter)
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_latency_capacity() -> usize {
    10_000
}

fn default_max_events() -> usize {
    200
}

fn default_psi_buckets() -> usize {
    10
}

fn default_report_interval() -> u64 {
    60
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `FLYWHEEL_CONFIG` or the default file
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, layered with `FLYWHEEL__*` env vars
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("FLYWHEEL")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bandit.default_arms")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.models.decision_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("models.decision_threshold must be within [0, 1], got {threshold}");
        }
        if self.models.onnx_threads == 0 {
            anyhow::bail!("models.onnx_threads must be at least 1");
        }
        if self.bandit.default_arms.is_empty() {
            anyhow::bail!("bandit.default_arms must name at least one arm");
        }
        if self.monitoring.latency_capacity == 0 {
            anyhow::bail!("monitoring.latency_capacity must be at least 1");
        }
        if self.monitoring.psi_buckets < 2 {
            anyhow::bail!("monitoring.psi_buckets must be at least 2");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "0.0.0.0:8000".to_string(),
            },
            models: ModelsConfig {
                approval_model_path: "data/models/credit_approval_xgb.onnx".to_string(),
                model_name: default_model_name(),
                model_version: Some("Production".to_string()),
                decision_threshold: default_decision_threshold(),
                onnx_threads: default_onnx_threads(),
            },
            bandit: BanditConfig {
                default_arms: default_arms(),
                history_path: Some("data/processed/dealer_bandit_context.csv".to_string()),
                reward_policy: RewardPolicy::Binary,
            },
            monitoring: MonitoringConfig {
                latency_capacity: default_latency_capacity(),
                max_events_kept: default_max_events(),
                psi_buckets: default_psi_buckets(),
                reference_path: Some("data/processed/approval_score_reference.json".to_string()),
                report_interval_secs: default_report_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.models.decision_threshold, 0.4);
        assert_eq!(config.bandit.default_arms.len(), 3);
        assert_eq!(config.bandit.reward_policy, RewardPolicy::Binary);
        assert_eq!(config.monitoring.latency_capacity, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.models.decision_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bandit.default_arms.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.monitoring.psi_buckets = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
bind_addr = "127.0.0.1:9000"

[models]
approval_model_path = "models/approval.onnx"
decision_threshold = 0.35

[bandit]
default_arms = ["sms", "call"]
reward_policy = "fractional"

[monitoring]
latency_capacity = 500

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.models.decision_threshold, 0.35);
        assert_eq!(config.models.model_name, "credit_approval_xgb");
        assert_eq!(config.bandit.default_arms, vec!["sms", "call"]);
        assert_eq!(config.bandit.reward_policy, RewardPolicy::Fractional);
        assert_eq!(config.monitoring.latency_capacity, 500);
        assert_eq!(config.monitoring.max_events_kept, 200);
        assert!(config.monitoring.reference_path.is_none());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.toml");
        let shipped = AppConfig::load_from_path(path).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(shipped.server.bind_addr, defaults.server.bind_addr);
        assert_eq!(shipped.models.approval_model_path, defaults.models.approval_model_path);
        assert_eq!(shipped.models.model_version, defaults.models.model_version);
        assert_eq!(shipped.bandit.default_arms, defaults.bandit.default_arms);
        assert_eq!(shipped.bandit.history_path, defaults.bandit.history_path);
        assert_eq!(shipped.monitoring.reference_path, defaults.monitoring.reference_path);
        assert_eq!(shipped.logging.format, defaults.logging.format);
    }
}
