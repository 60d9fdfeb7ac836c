// Denormalized team configuration
//
// TeamConfig is the self-contained snapshot stored on a deployment, both as
// the immutable base and as the customized active configuration read by the
// agent runtime. Field order and Vec ordering are stable so serialization is
// deterministic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template::{AgentTemplate, KnowledgeItem};

/// Fully materialized configuration of a deployed team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub template_id: Uuid,
    pub template_slug: String,
    pub template_name: String,
    pub version: i32,
    /// Slug of the head agent, when the head agent is part of the team
    #[serde(default)]
    pub head_agent_slug: Option<String>,
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub delegations: Vec<DelegationConfig>,
    /// Shared team knowledge plus tenant-added knowledge
    #[serde(default)]
    pub knowledge: Vec<KnowledgeItem>,
}

impl TeamConfig {
    /// Agents that are live in this configuration, in template order
    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.iter().filter(|a| a.enabled)
    }

    pub fn enabled_agent_count(&self) -> usize {
        self.enabled_agents().count()
    }

    pub fn agent(&self, slug: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.slug == slug)
    }
}

/// Agent entry of a team configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent template id; schedules and identities are keyed by it
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_ref: Option<String>,
    pub system_prompt: String,
    pub model: String,
    pub provider: String,
    pub tools: Vec<String>,
    pub skills: Vec<String>,
    pub knowledge: Vec<KnowledgeItem>,
    pub rules: Vec<String>,
    pub enabled: bool,
}

impl From<AgentTemplate> for AgentConfig {
    fn from(agent: AgentTemplate) -> Self {
        Self {
            id: agent.id,
            slug: agent.slug,
            name: agent.name,
            description: agent.description,
            avatar_ref: agent.avatar_ref,
            system_prompt: agent.system_prompt,
            model: agent.model,
            provider: agent.provider,
            tools: agent.tools,
            skills: agent.skills,
            knowledge: agent.knowledge,
            rules: agent.rules,
            enabled: true,
        }
    }
}

/// Delegation entry of a team configuration, resolved to slugs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationConfig {
    pub id: Uuid,
    pub from_agent_slug: String,
    pub to_agent_slug: String,
    pub condition: Option<String>,
    pub context_template: Option<String>,
    pub enabled: bool,
}
