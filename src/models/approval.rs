//! Credit approval classifier: model scoring plus the threshold decision

use crate::config::ModelsConfig;
use crate::error::ServiceError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::loader::{open_session, ApprovalSession};
use crate::types::application::LoanApplication;
use crate::types::decision::{ApprovalPrediction, Decision};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Anything that turns a feature vector into a bad-outcome probability
pub trait ProbabilityModel: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> Option<&str> {
        None
    }

    /// Probability of the positive (bad outcome) class
    fn predict_proba(&self, features: &[f32]) -> Result<f64>;
}

/// Apply the decision threshold to a bad-outcome probability
pub fn decide(probability: f64, threshold: f64) -> Decision {
    Decision::from_score(probability, threshold)
}

/// Gradient-boosted approval model exported to ONNX
pub struct OnnxApprovalModel {
    /// Inference needs exclusive access to the session
    model: Mutex<ApprovalSession>,
    name: String,
    version: Option<String>,
}

impl OnnxApprovalModel {
    pub fn load(config: &ModelsConfig) -> Result<Self> {
        let path = std::path::Path::new(&config.approval_model_path);
        if !path.exists() {
            anyhow::bail!("model file {} does not exist", path.display());
        }

        let model = open_session(path, config)?;
        Ok(Self {
            model: Mutex::new(model),
            name: config.model_name.clone(),
            version: config.model_version.clone(),
        })
    }
}

impl ProbabilityModel for OnnxApprovalModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn predict_proba(&self, features: &[f32]) -> Result<f64> {
        use ort::value::Tensor;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let mut guard = self.model.lock();
        let model = &mut *guard;
        let outputs = model
            .session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])?;

        if let Some(output) = outputs.get(model.output_name.as_str()) {
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                return positive_class_probability(&dims, data)
                    .context("Empty probability tensor");
            }
        }

        // Fallback: first float tensor that is not the label output
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                debug!(model = %self.name, output = %name, "Extracted probability from fallback output");
                return positive_class_probability(&dims, data)
                    .context("Empty probability tensor");
            }
        }

        anyhow::bail!("model {} produced no float probability output", self.name)
    }
}

/// Pick the positive-class probability out of a probability tensor.
///
/// Handles `[batch, classes]`, `[classes]` and single-column outputs.
pub fn positive_class_probability(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = dims.last().copied().unwrap_or(data.len() as i64);
    if classes >= 2 && data.len() >= 2 {
        Some(data[1] as f64)
    } else {
        data.first().map(|&v| v as f64)
    }
}

/// Wraps the approval model with feature building and the decision threshold.
///
/// The model is optional: the service starts without one and reports
/// [`ServiceError::ModelUnavailable`] until an artifact is shipped.
pub struct ApprovalClassifier {
    model: Option<Arc<dyn ProbabilityModel>>,
    extractor: FeatureExtractor,
    threshold: f64,
    model_name: String,
}

impl ApprovalClassifier {
    pub fn new(
        model: Option<Arc<dyn ProbabilityModel>>,
        threshold: f64,
    ) -> Result<Self, ServiceError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ServiceError::invalid(format!(
                "decision threshold must be within [0, 1], got {threshold}"
            )));
        }
        let model_name = model
            .as_ref()
            .map(|m| m.name().to_string())
            .unwrap_or_default();
        Ok(Self {
            model,
            extractor: FeatureExtractor::new(),
            threshold,
            model_name,
        })
    }

    /// Build the classifier from configuration, loading the ONNX model when present
    pub fn from_config(config: &ModelsConfig) -> Result<Self> {
        let model: Option<Arc<dyn ProbabilityModel>> = match OnnxApprovalModel::load(config) {
            Ok(model) => Some(Arc::new(model)),
            Err(e) => {
                warn!(
                    path = %config.approval_model_path,
                    error = %e,
                    "Approval model not loaded; scoring requests will be rejected"
                );
                None
            }
        };

        let classifier = Self::new(model, config.decision_threshold)?;
        if classifier.is_loaded() {
            info!(
                model = %config.model_name,
                threshold = config.decision_threshold,
                "Approval classifier ready"
            );
        }
        Ok(classifier)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Bad-outcome probability for an application
    pub fn predict_proba(&self, app: &LoanApplication) -> Result<f64, ServiceError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ServiceError::ModelUnavailable("no approval model loaded".into()))?;

        app.validate()?;
        let features = self.extractor.extract(app);

        let probability = model
            .predict_proba(&features)
            .map_err(|e| ServiceError::Inference(e.to_string()))?;
        if !probability.is_finite() {
            return Err(ServiceError::Inference(format!(
                "model returned non-finite probability {probability}"
            )));
        }
        Ok(probability.clamp(0.0, 1.0))
    }

    /// Score an application and apply the decision threshold
    pub fn predict(&self, app: &LoanApplication) -> Result<ApprovalPrediction, ServiceError> {
        let approval_risk = self.predict_proba(app)?;
        let decision = decide(approval_risk, self.threshold);

        debug!(
            dealer_id = %app.dealer_id,
            approval_risk = approval_risk,
            decision = %decision,
            "Application scored"
        );

        Ok(ApprovalPrediction {
            approval_risk,
            decision,
            threshold: self.threshold,
            model_name: self.model_name.clone(),
            model_version: self
                .model
                .as_ref()
                .and_then(|m| m.version().map(str::to_string)),
        })
    }
}
