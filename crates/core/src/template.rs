// Team template catalog types
//
// Templates are tenant-independent and read-only to this crate. Delegations
// are stored by agent id; the snapshot builder resolves them to slugs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reusable team-of-agents definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamTemplate {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub head_agent_id: Option<Uuid>,
    pub current_version: i32,
}

/// A piece of knowledge attached to an agent or shared by the whole team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub title: String,
    pub content: String,
}

impl KnowledgeItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Agent definition inside a team template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub id: Uuid,
    /// Stable cross-reference key for delegations and customizations
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_ref: Option<String>,
    pub system_prompt: String,
    pub model: String,
    pub provider: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub knowledge: Vec<KnowledgeItem>,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// Ordered membership of an agent in a team template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAgentLink {
    pub template_id: Uuid,
    pub agent_id: Uuid,
    pub position: i32,
}

/// Delegation edge between two agents of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationTemplate {
    pub id: Uuid,
    pub template_id: Uuid,
    pub from_agent_id: Uuid,
    pub to_agent_id: Uuid,
    pub condition: Option<String>,
    pub context_template: Option<String>,
}

/// Subscription plan; links a tier to the template it deploys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tier: String,
    pub template_id: Option<Uuid>,
}
