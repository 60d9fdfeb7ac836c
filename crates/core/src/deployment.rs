// Deployment entity
//
// A deployment is the tenant-specific, versioned instantiation of a team
// template. At most one row per workspace is `active`; when more than one is
// (two racing deploys), the most recently created wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TeamConfig;
use crate::customizations::Customizations;

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Inserted, provisioning not yet verified
    Pending,
    /// Live configuration for the workspace
    Active,
    /// Superseded by a newer active deployment
    Replaced,
    /// Provisioning could not be verified
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Replaced => "replaced",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "replaced" => Ok(Self::Replaced),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown deployment status: {other}")),
        }
    }
}

/// Persisted deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub source_template_id: Uuid,
    pub source_version: i32,
    pub base_config: TeamConfig,
    pub customizations: Customizations,
    pub active_config: TeamConfig,
    pub status: DeploymentStatus,
    pub previous_deployment_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a deployment; always starts as `pending`
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub workspace_id: Uuid,
    pub source_template_id: Uuid,
    pub source_version: i32,
    pub base_config: TeamConfig,
    pub customizations: Customizations,
    pub active_config: TeamConfig,
    pub previous_deployment_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            DeploymentStatus::Pending,
            DeploymentStatus::Active,
            DeploymentStatus::Replaced,
            DeploymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<DeploymentStatus>(), Ok(status));
        }
        assert!("archived".parse::<DeploymentStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(DeploymentStatus::Replaced).unwrap();
        assert_eq!(json, "replaced");
    }
}
