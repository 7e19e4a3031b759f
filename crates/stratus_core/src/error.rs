//! Error types for the core module.

use thiserror::Error;

use crate::planner::DeploymentReport;
use crate::resource::ResourceKind;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while planning or running a deployment.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("Duplicate stack id: {0}")]
    DuplicateStack(String),

    #[error("Export '{name}' is already published by stack '{existing}' (attempted by '{attempted}')")]
    ExportCollision {
        name: String,
        existing: String,
        attempted: String,
    },

    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Unresolved dependency in stack '{stack}': no producer for {selector}")]
    UnresolvedDependency { stack: String, selector: String },

    #[error("Ambiguous dependency in stack '{stack}': {selector} is produced by {}", .candidates.join(", "))]
    AmbiguousDependency {
        stack: String,
        selector: String,
        candidates: Vec<String>,
    },

    #[error("Export not found: {0}")]
    ExportNotFound(String),

    #[error("Type mismatch for {selector}: {message}")]
    TypeMismatch { selector: String, message: String },

    #[error("Missing binding in stack '{stack}' for {selector}")]
    MissingBinding { stack: String, selector: String },

    #[error("Provider error in stack '{stack}': {message}")]
    Provider { stack: String, message: String },

    #[error("Invalid output from stack '{stack}': {message}")]
    InvalidOutput { stack: String, message: String },

    #[error("Deployment cancelled before stack '{0}'")]
    Cancelled(String),

    #[error("Deployment halted: {source}")]
    Halted {
        report: Box<DeploymentReport>,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Whether the error was detected while building the plan, before any
    /// stack executed.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            CoreError::DuplicateStack(_)
                | CoreError::ExportCollision { .. }
                | CoreError::CyclicDependency { .. }
                | CoreError::UnresolvedDependency { .. }
                | CoreError::AmbiguousDependency { .. }
        )
    }

    /// The partial deployment report carried by a halted run.
    pub fn report(&self) -> Option<&DeploymentReport> {
        match self {
            CoreError::Halted { report, .. } => Some(report),
            _ => None,
        }
    }

    /// The underlying cause, looking through `Halted`.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::Halted { source, .. } => source.root(),
            other => other,
        }
    }
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

/// Errors returned by a stack body during execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    /// A selector the stack asked for was not bound. Indicates a resolver or
    /// broker defect, not operator error.
    #[error("Missing binding in stack '{stack}' for {selector}")]
    MissingBinding { stack: String, selector: String },

    #[error("Bound {kind} resource '{resource}' has no attribute '{attribute}'")]
    MissingAttribute {
        resource: String,
        kind: ResourceKind,
        attribute: String,
    },

    #[error("Provider error in stack '{stack}': {message}")]
    Provider { stack: String, message: String },
}

impl ProvisioningError {
    pub fn provider(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            stack: stack.into(),
            message: message.into(),
        }
    }
}

impl From<ProvisioningError> for CoreError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::MissingBinding { stack, selector } => {
                CoreError::MissingBinding { stack, selector }
            }
            ProvisioningError::MissingAttribute {
                resource,
                kind,
                attribute,
            } => CoreError::TypeMismatch {
                selector: format!("{} '{}'", kind, resource),
                message: format!("missing attribute '{}'", attribute),
            },
            ProvisioningError::Provider { stack, message } => CoreError::Provider { stack, message },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_closes_loop() {
        let err = CoreError::CyclicDependency {
            cycle: vec!["A".to_string(), "B".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic dependency: A -> B -> A");
    }

    #[test]
    fn test_provisioning_error_conversion() {
        let err: CoreError = ProvisioningError::provider("Ecr", "quota exceeded").into();
        assert!(matches!(err, CoreError::Provider { ref stack, .. } if stack == "Ecr"));
        assert!(!err.is_resolution_error());
    }
}
