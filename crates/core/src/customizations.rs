// Tenant customizations over a deployment's base configuration

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::template::KnowledgeItem;

/// Tenant-authored deltas over a base configuration
///
/// Ordered collections keep the serialized form stable, so identical
/// customizations always persist byte-identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customizations {
    #[serde(default)]
    pub disabled_agent_slugs: BTreeSet<String>,
    #[serde(default)]
    pub disabled_delegation_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub added_knowledge: Vec<KnowledgeItem>,
    #[serde(default)]
    pub per_agent_overrides: BTreeMap<String, AgentOverride>,
}

impl Customizations {
    pub fn is_empty(&self) -> bool {
        self.disabled_agent_slugs.is_empty()
            && self.disabled_delegation_ids.is_empty()
            && self.added_knowledge.is_empty()
            && self.per_agent_overrides.is_empty()
    }

    pub fn disable_agent(mut self, slug: impl Into<String>) -> Self {
        self.disabled_agent_slugs.insert(slug.into());
        self
    }

    pub fn disable_delegation(mut self, id: Uuid) -> Self {
        self.disabled_delegation_ids.insert(id);
        self
    }

    pub fn add_knowledge(mut self, item: KnowledgeItem) -> Self {
        self.added_knowledge.push(item);
        self
    }

    pub fn override_agent(mut self, slug: impl Into<String>, patch: AgentOverride) -> Self {
        self.per_agent_overrides.insert(slug.into(), patch);
        self
    }
}

/// Per-agent partial update; only `Some` fields are applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl AgentOverride {
    /// Shallow-merge the provided fields into `agent`
    pub fn apply_to(&self, agent: &mut AgentConfig) {
        // Destructure so a new override field fails to compile until handled here
        let AgentOverride {
            system_prompt,
            model,
            enabled,
        } = self;

        if let Some(system_prompt) = system_prompt {
            agent.system_prompt = system_prompt.clone();
        }
        if let Some(model) = model {
            agent.model = model.clone();
        }
        if let Some(enabled) = enabled {
            agent.enabled = *enabled;
        }
    }
}
