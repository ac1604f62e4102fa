//! Error types for the value crate.

use thiserror::Error;

/// Result type for value operations.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur while parsing or rendering values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Input text was not valid JSON.
    #[error("JSON parsing failed: {message}")]
    ParseFailed {
        /// Description of the parse error.
        message: String,
    },

    /// Value could not be rendered as JSON text.
    #[error("JSON rendering failed: {message}")]
    RenderFailed {
        /// Description of the rendering error.
        message: String,
    },

    /// A float value was NaN or infinite.
    #[error("non-finite float at {path}")]
    NonFiniteFloat {
        /// Location of the offending value.
        path: String,
    },
}

impl ValueError {
    /// Create a parse failed error.
    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::ParseFailed {
            message: message.into(),
        }
    }

    /// Create a render failed error.
    pub fn render_failed(message: impl Into<String>) -> Self {
        Self::RenderFailed {
            message: message.into(),
        }
    }

    /// Create a non-finite float error.
    pub fn non_finite_float(path: impl Into<String>) -> Self {
        Self::NonFiniteFloat { path: path.into() }
    }
}
