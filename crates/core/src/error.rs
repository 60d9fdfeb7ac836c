// Error types for deployment and storage operations

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Row not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Database error (connection, query, timeout)
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error for JSON columns
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        StoreError::Database(msg.into())
    }

    /// Create a unique violation error
    pub fn unique(msg: impl Into<String>) -> Self {
        StoreError::UniqueViolation(msg.into())
    }

    /// Whether this error is a uniqueness conflict (a lost insert race)
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors that stop a deployment before provisioning starts
#[derive(Debug, Error)]
pub enum DeployError {
    /// Template id does not exist
    #[error("team template not found: {0}")]
    TemplateNotFound(Uuid),

    /// A team-agent link or delegation points at an agent that cannot be resolved
    #[error("template {template_id} references unresolvable agent {agent_id}")]
    IncompleteAgentReference { template_id: Uuid, agent_id: Uuid },

    /// The tier's plan has no template linked
    #[error("no team template linked to tier '{0}'")]
    DeployTargetMissing(String),

    /// Workspace has no active deployment
    #[error("no active deployment for workspace {0}")]
    DeploymentNotFound(Uuid),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeployError {
    /// Stable error code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            DeployError::TemplateNotFound(_) => "template_not_found",
            DeployError::IncompleteAgentReference { .. } => "incomplete_agent_reference",
            DeployError::DeployTargetMissing(_) => "deploy_target_missing",
            DeployError::DeploymentNotFound(_) => "deployment_not_found",
            DeployError::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detection() {
        assert!(StoreError::unique("schedules_tenant_key").is_unique_violation());
        assert!(!StoreError::database("connection reset").is_unique_violation());
    }

    #[test]
    fn test_deploy_error_codes() {
        let id = Uuid::now_v7();
        assert_eq!(DeployError::TemplateNotFound(id).code(), "template_not_found");
        assert_eq!(
            DeployError::DeployTargetMissing("teams".into()).code(),
            "deploy_target_missing"
        );
        assert_eq!(
            DeployError::from(StoreError::database("boom")).code(),
            "store_error"
        );
    }
}
