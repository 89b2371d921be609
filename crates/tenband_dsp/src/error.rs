//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during DSP operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    /// A filter or bank parameter is outside its supported domain.
    ///
    /// This is a configuration error: it is raised while building a bank,
    /// never while streaming.
    #[error("Invalid {name}: {value} (must be {constraint})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        constraint: String,
    },

    #[error("Unknown band: {0:?}")]
    UnknownBand(String),
}

impl DspError {
    pub(crate) fn invalid(name: &'static str, value: f64, constraint: impl Into<String>) -> Self {
        DspError::InvalidParameter {
            name,
            value,
            constraint: constraint.into(),
        }
    }

    /// Whether this error came from parameter validation
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, DspError::InvalidParameter { .. })
    }
}
