//! Error types surfaced by the scoring, bandit and monitoring paths.

/// Errors returned to callers of the service operations.
///
/// Startup and artifact loading use `anyhow`; everything reachable from a
/// request handler returns this type so the API layer can map it to a status.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    /// Malformed or missing request data (empty action list, bad reward, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The approval model was not loaded at startup.
    #[error("approval model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model was loaded but inference failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::InvalidInput(msg.into())
    }

    /// Whether the caller is at fault (4xx) rather than the service (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServiceError::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ServiceError::invalid("empty action list").is_client_error());
        assert!(!ServiceError::ModelUnavailable("missing".into()).is_client_error());
        assert!(!ServiceError::Inference("shape".into()).is_client_error());
    }

    #[test]
    fn test_display() {
        let err = ServiceError::invalid("reward must be 0 or 1");
        assert_eq!(err.to_string(), "invalid input: reward must be 0 or 1");
    }
}
