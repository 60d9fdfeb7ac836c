// Operational audit log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod actions {
    /// Verification still incomplete after retries
    pub const PROVISIONING_INCOMPLETE: &str = "deployment_provisioning_incomplete";
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub workspace_id: Uuid,
    pub action: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub action: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
