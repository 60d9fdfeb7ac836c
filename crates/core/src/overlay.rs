// Customization overlay engine
//
// Pure: (base config, customizations) -> active config. Steps run in a fixed
// order: agent disable flags, delegation disable flags, added knowledge, then
// per-agent overrides. Unknown slugs and ids are ignored and reported back.

use uuid::Uuid;

use crate::config::TeamConfig;
use crate::customizations::Customizations;

/// A customization entry that matched nothing in the base configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredReference {
    DisabledAgent(String),
    DisabledDelegation(Uuid),
    Override(String),
}

/// Result of applying customizations
#[derive(Debug, Clone)]
pub struct OverlayOutcome {
    pub config: TeamConfig,
    pub ignored: Vec<IgnoredReference>,
}

/// Apply `customizations` to a copy of `base`
pub fn apply_customizations(base: &TeamConfig, customizations: &Customizations) -> OverlayOutcome {
    let mut config = base.clone();
    let mut ignored = Vec::new();

    for agent in &mut config.agents {
        agent.enabled = !customizations.disabled_agent_slugs.contains(&agent.slug);
    }
    for slug in &customizations.disabled_agent_slugs {
        if config.agent(slug).is_none() {
            ignored.push(IgnoredReference::DisabledAgent(slug.clone()));
        }
    }

    for delegation in &mut config.delegations {
        delegation.enabled = !customizations
            .disabled_delegation_ids
            .contains(&delegation.id);
    }
    for id in &customizations.disabled_delegation_ids {
        if !config.delegations.iter().any(|d| d.id == *id) {
            ignored.push(IgnoredReference::DisabledDelegation(*id));
        }
    }

    config
        .knowledge
        .extend(customizations.added_knowledge.iter().cloned());

    for (slug, patch) in &customizations.per_agent_overrides {
        match config.agents.iter_mut().find(|a| &a.slug == slug) {
            Some(agent) => patch.apply_to(agent),
            None => ignored.push(IgnoredReference::Override(slug.clone())),
        }
    }

    OverlayOutcome { config, ignored }
}
