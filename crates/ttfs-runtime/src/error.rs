//! Error types for the TTFS inference runtime

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while driving a simulation
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Backend forward pass failed
    #[error("Backend failure at timestep {step}: {reason}")]
    Backend {
        /// Timestep at which the forward pass failed
        step: usize,
        /// Reason for failure
        reason: String,
    },

    /// Tensor shape did not match the expected layout
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Where the mismatch was detected
        context: String,
        /// Expected shape description
        expected: String,
        /// Actual shape description
        actual: String,
    },

    /// Event-stream input source ran out of frames
    #[error("Event stream exhausted at timestep {step}")]
    InputExhausted {
        /// Timestep at which the stream ran dry
        step: usize,
    },

    /// Layer introspection returned an inconsistent signal
    #[error("Layer {layer} signal error: {reason}")]
    LayerSignal {
        /// Index of the offending layer
        layer: usize,
        /// Reason for the inconsistency
        reason: String,
    },
}

impl SimError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a backend failure error
    pub fn backend(step: usize, reason: impl Into<String>) -> Self {
        Self::Backend {
            step,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a layer signal error
    pub fn layer_signal(layer: usize, reason: impl Into<String>) -> Self {
        Self::LayerSignal {
            layer,
            reason: reason.into(),
        }
    }
}
