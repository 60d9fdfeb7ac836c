// Workspace billing state relevant to agent deployment
//
// The payment integration writes these fields; this crate only consumes the
// pending tier (exactly once, via a conditional update) and reports the
// deploy outcome back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription status for the agent add-on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    PastDue,
    Canceled,
    Inactive,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Inactive => "inactive",
        }
    }
}

impl From<&str> for AgentStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Inactive,
        }
    }
}

/// Outcome of the most recent tier-triggered deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Deploying,
    Deployed,
    Failed,
}

impl DeployStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploying => "deploying",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deploying" => Some(Self::Deploying),
            "deployed" => Some(Self::Deployed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Billing fields of a workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceBilling {
    pub workspace_id: Uuid,
    pub agent_tier: Option<String>,
    pub agent_tier_pending: Option<String>,
    pub agent_tier_pending_effective_at: Option<DateTime<Utc>>,
    pub agent_status: AgentStatus,
    pub agent_deploy_status: Option<DeployStatus>,
    pub updated_at: DateTime<Utc>,
}

/// A pending tier change that is due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTier {
    pub workspace_id: Uuid,
    pub tier: String,
    pub effective_at: Option<DateTime<Utc>>,
}

/// Kind of billing alert raised for operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingAlertKind {
    DeployFailed,
}

impl BillingAlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeployFailed => "deploy_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBillingAlert {
    pub workspace_id: Uuid,
    pub kind: BillingAlertKind,
    pub message: String,
    pub metadata: serde_json::Value,
}

/// Persisted billing alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingAlert {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub kind: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
