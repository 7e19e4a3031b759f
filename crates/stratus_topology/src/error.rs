//! Error types for topology manifests and providers.

use thiserror::Error;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors that can occur while loading topologies or provisioning resources.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid {what} '{value}': must start with a letter and contain only letters, digits and '-'")]
    InvalidIdentifier { what: &'static str, value: String },

    #[error("Reference policy violation in {stack}/{resource}: {message}")]
    PolicyViolation {
        stack: String,
        resource: String,
        message: String,
    },

    #[error("Unknown stack: {0}")]
    UnknownStack(String),

    #[error("Provisioning {kind} '{logical_name}' failed: {message}")]
    ProvisionFailed {
        logical_name: String,
        kind: String,
        message: String,
    },

    #[error("Core error: {0}")]
    Core(#[from] stratus_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TopologyError {
    /// Whether the error came from an invalid manifest rather than a run.
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self,
            TopologyError::InvalidManifest(_)
                | TopologyError::InvalidIdentifier { .. }
                | TopologyError::PolicyViolation { .. }
                | TopologyError::UnknownStack(_)
                | TopologyError::Yaml(_)
        )
    }
}
