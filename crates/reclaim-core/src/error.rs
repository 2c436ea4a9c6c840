//! Error handling for reclaim analysis
//!
//! Provides a unified error type and result type shared by the configuration
//! layer and the projection engine.

/// Result type alias for reclaim operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for reclaim analysis
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Non-positive geometry, profile dimensions or rate constants
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// A trigger-time computation divided by a zero rate or concentration
    #[error("Undefined projection: {0}")]
    UndefinedProjection(String),

    /// A reliability model left its valid output range
    #[error("Model divergence in {model}: failure rate {value} is outside [0, 1)")]
    ModelDivergence { model: String, value: f64 },

    /// Malformed or missing calibration input
    #[error("Data error: {0}")]
    Data(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration layering errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an undefined projection error
    pub fn undefined_projection(msg: impl Into<String>) -> Self {
        Self::UndefinedProjection(msg.into())
    }

    /// Create a model divergence error
    pub fn divergence(model: impl Into<String>, value: f64) -> Self {
        Self::ModelDivergence {
            model: model.into(),
            value,
        }
    }

    /// Create a data error
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Whether the engine recovers from this error on its own.
    ///
    /// Only an undefined projection is recovered, by reporting that the
    /// policy never fires.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::UndefinedProjection(_))
    }

    /// Get the error category for logging and attached sweep faults
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::UndefinedProjection(_) => "undefined_projection",
            Error::ModelDivergence { .. } => "model_divergence",
            Error::Data(_) => "data",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

/// Extension trait for adding context to Results
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", context.into(), original_error))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("total_blocks must be > 0");
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: total_blocks must be > 0"
        );
    }

    #[test]
    fn test_divergence_message() {
        let err = Error::divergence("physical_rber", 1.25);
        assert!(err.to_string().contains("physical_rber"));
        assert!(err.to_string().contains("1.25"));
        assert_eq!(err.category(), "model_divergence");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::config("x").category(), "configuration");
        assert_eq!(Error::undefined_projection("x").category(), "undefined_projection");
        assert_eq!(Error::data("x").category(), "data");
    }

    #[test]
    fn test_only_undefined_projection_is_recoverable() {
        assert!(Error::undefined_projection("zero rate").is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
        assert!(!Error::divergence("simplified", 2.0).is_recoverable());
        assert!(!Error::data("empty").is_recoverable());
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let err = result.with_context("failed to read samples").unwrap_err();

        assert!(matches!(err, Error::Other(_)));
        assert!(err.to_string().contains("failed to read samples"));
        assert!(err.to_string().contains("file not found"));
    }
}
