//! Typed errors for the filter engine
//!
//! Nothing on the evaluation path returns an error: conditions that cannot
//! be evaluated simply do not match. These types cover the edges only,
//! decoding preset documents, loading configuration and talking to the
//! preset backend.

use thiserror::Error;
use uuid::Uuid;

/// The main error type of the crate
#[derive(Debug, Error)]
pub enum FilterError {
    /// The preset backend failed
    #[error("persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    /// A stored preset document could not be decoded
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl FilterError {
    /// Error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            FilterError::Persistence(_) => "PERSISTENCE_ERROR",
            FilterError::Wire(e) => e.error_code(),
            FilterError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Errors raised while decoding a preset document
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    /// The document is not valid JSON for the expected shape
    #[error("malformed preset document: {0}")]
    Malformed(String),

    /// The top-level `filters` array holds something other than one group
    #[error("preset {preset_id} must hold exactly one root group, found {found} items")]
    RootShape { preset_id: Uuid, found: usize },

    /// A condition value does not fit its declared `valueType`
    #[error("condition {id}: value {value} does not fit value type {value_type}")]
    ValueMismatch {
        id: Uuid,
        value_type: String,
        value: String,
    },

    /// Two nodes of one tree share an id
    #[error("duplicate rule id {0}")]
    DuplicateId(Uuid),
}

impl WireError {
    pub fn error_code(&self) -> &'static str {
        match self {
            WireError::Malformed(_) => "WIRE_MALFORMED",
            WireError::RootShape { .. } => "WIRE_ROOT_SHAPE",
            WireError::ValueMismatch { .. } => "WIRE_VALUE_MISMATCH",
            WireError::DuplicateId(_) => "WIRE_DUPLICATE_ID",
        }
    }
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::Malformed(err.to_string())
    }
}
