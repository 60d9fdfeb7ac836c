// Per-agent workspace resources: identity, membership, channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messaging identity of an agent inside one workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub workspace_id: Uuid,
    pub address: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAgentIdentity {
    pub agent_id: Uuid,
    pub workspace_id: Uuid,
    pub address: String,
    pub display_name: String,
}

/// Communication channel owned by a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChannel {
    pub workspace_id: Uuid,
    pub name: String,
    pub agent_id: Option<Uuid>,
}

/// Kind of workspace member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Agent,
    Human,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Human => "human",
        }
    }
}

/// Resource counts used for completeness checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounts {
    pub profiles: u64,
    pub channels: u64,
    pub schedules: u64,
}

/// Deterministic synthetic address: `{slug}.{workspace prefix}@{domain}`
pub fn identity_address(slug: &str, workspace_id: Uuid, domain: &str) -> String {
    let simple = workspace_id.simple().to_string();
    format!("{}.{}@{}", slug, &simple[..8], domain)
}

/// Deterministic channel name for an agent
pub fn channel_name(slug: &str) -> String {
    format!("agent-{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_address_is_deterministic() {
        let workspace_id = Uuid::parse_str("0195a0c4-1f2e-7c3d-9abc-def012345678").unwrap();
        let address = identity_address("researcher", workspace_id, "agents.example");
        assert_eq!(address, "researcher.0195a0c4@agents.example");
        assert_eq!(
            address,
            identity_address("researcher", workspace_id, "agents.example")
        );
    }

    #[test]
    fn test_channel_name() {
        assert_eq!(channel_name("writer"), "agent-writer");
    }
}
