//! Unified error types for the amp modeling workspace.

/// Main error type for model construction, inference, and export.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Invalid hyperparameters detected at construction time.
    #[error("invalid configuration for {component}: {reason}")]
    Construction { component: String, reason: String },

    /// A forward pass received a buffer or state of the wrong shape.
    #[error("shape mismatch in {component}: expected {expected}, got {actual}")]
    ShapeMismatch {
        component: String,
        expected: String,
        actual: String,
    },

    /// A required parameter leaf is absent from a state dict.
    #[error("missing parameter leaf: {path}")]
    MissingParameter { path: String },

    /// A parameter leaf exists but its contents are inconsistent.
    #[error("malformed parameter leaf {path}: {reason}")]
    MalformedParameter { path: String, reason: String },

    /// A document names a model type no builder is registered for.
    #[error("unknown model type: {0}")]
    UnknownModelType(String),

    /// Malformed export document (missing section, wrong value kind).
    #[error("malformed document: {0}")]
    Document(String),

    /// Underlying tensor operation failed.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with ModelError.
pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// Create a construction-contract error for a named component.
    pub fn construction(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Create a shape-mismatch error for a named component.
    pub fn shape_mismatch(
        component: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            component: component.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a missing-parameter error for a full leaf path.
    pub fn missing_parameter(path: impl Into<String>) -> Self {
        Self::MissingParameter { path: path.into() }
    }

    /// Create a malformed-parameter error for a full leaf path.
    pub fn malformed_parameter(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedParameter {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-document error with message.
    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }
}
