//! Opens the approval model's ONNX session and resolves its tensor names

use crate::config::ModelsConfig;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Fallback names used by sklearn/XGBoost ONNX exports
const DEFAULT_INPUT: &str = "float_input";
const DEFAULT_OUTPUT: &str = "probabilities";

/// Session plus the tensor names inference feeds and reads
pub struct ApprovalSession {
    pub session: Session,
    pub input_name: String,
    pub output_name: String,
}

/// Open the approval model with the configured thread count
pub fn open_session(path: &Path, config: &ModelsConfig) -> Result<ApprovalSession> {
    ort::init().with_name("credit-flywheel").commit()?;

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(config.onnx_threads)?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load approval model from {}", path.display()))?;

    let inputs: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
    let outputs: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
    let input_name = pick_input_name(&inputs);
    let output_name = pick_output_name(&outputs);

    info!(
        model = %config.model_name,
        path = %path.display(),
        threads = config.onnx_threads,
        input = %input_name,
        output = %output_name,
        "Approval model session opened"
    );

    Ok(ApprovalSession {
        session,
        input_name,
        output_name,
    })
}

/// First declared input, since the feature vector is the only one
pub fn pick_input_name(inputs: &[&str]) -> String {
    inputs.first().copied().unwrap_or(DEFAULT_INPUT).to_string()
}

/// The probability tensor, else the last declared output
pub fn pick_output_name(outputs: &[&str]) -> String {
    outputs
        .iter()
        .find(|name| name.contains("prob"))
        .or_else(|| outputs.last())
        .copied()
        .unwrap_or(DEFAULT_OUTPUT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_prefers_probability_tensor() {
        assert_eq!(pick_output_name(&["label", "probabilities"]), "probabilities");
        assert_eq!(pick_output_name(&["output_probability", "output_label"]), "output_probability");
        assert_eq!(pick_output_name(&["label", "scores"]), "scores");
        assert_eq!(pick_output_name(&[]), "probabilities");
    }

    #[test]
    fn test_input_is_first_declared() {
        assert_eq!(pick_input_name(&["features", "extra"]), "features");
        assert_eq!(pick_input_name(&[]), "float_input");
    }
}
