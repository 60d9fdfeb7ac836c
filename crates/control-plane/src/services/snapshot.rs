// Config snapshot builder
//
// Reads an immutable team template and materializes a self-contained
// TeamConfig. Delegations are stored by agent id and resolved to slugs here.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use teamdeploy_core::{
    AgentConfig, DelegationConfig, DeployError, TeamConfig, TemplateStore,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct SnapshotBuilder {
    templates: Arc<dyn TemplateStore>,
}

impl SnapshotBuilder {
    pub fn new(templates: Arc<dyn TemplateStore>) -> Self {
        Self { templates }
    }

    /// Build the base configuration of `template_id`
    ///
    /// Every agent and delegation starts enabled. Fails with
    /// `TemplateNotFound` for an unknown template and with
    /// `IncompleteAgentReference` when a team-agent link or a delegation
    /// endpoint does not resolve to an agent of the team.
    pub async fn build(&self, template_id: Uuid) -> Result<TeamConfig, DeployError> {
        let template = self
            .templates
            .get_template(template_id)
            .await?
            .ok_or(DeployError::TemplateNotFound(template_id))?;

        let links = self.templates.list_team_agent_links(template_id).await?;
        let mut seen = HashSet::with_capacity(links.len());
        let agent_ids: Vec<Uuid> = links
            .iter()
            .map(|link| link.agent_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let mut by_id: HashMap<Uuid, _> = self
            .templates
            .get_agent_templates(&agent_ids)
            .await?
            .into_iter()
            .map(|agent| (agent.id, agent))
            .collect();

        let mut agents = Vec::with_capacity(agent_ids.len());
        for agent_id in &agent_ids {
            let agent = by_id
                .remove(agent_id)
                .ok_or(DeployError::IncompleteAgentReference {
                    template_id,
                    agent_id: *agent_id,
                })?;
            agents.push(AgentConfig::from(agent));
        }

        let slugs: HashMap<Uuid, String> = agents
            .iter()
            .map(|agent| (agent.id, agent.slug.clone()))
            .collect();
        let resolve = |agent_id: Uuid| {
            slugs
                .get(&agent_id)
                .cloned()
                .ok_or(DeployError::IncompleteAgentReference {
                    template_id,
                    agent_id,
                })
        };

        let mut delegations = Vec::new();
        for delegation in self.templates.list_delegations(template_id).await? {
            delegations.push(DelegationConfig {
                id: delegation.id,
                from_agent_slug: resolve(delegation.from_agent_id)?,
                to_agent_slug: resolve(delegation.to_agent_id)?,
                condition: delegation.condition,
                context_template: delegation.context_template,
                enabled: true,
            });
        }

        let knowledge = self.templates.list_shared_knowledge(template_id).await?;
        let head_agent_slug = template
            .head_agent_id
            .and_then(|id| slugs.get(&id).cloned());

        debug!(
            template_id = %template_id,
            agents = agents.len(),
            delegations = delegations.len(),
            "Built config snapshot"
        );

        Ok(TeamConfig {
            template_id,
            template_slug: template.slug,
            template_name: template.name,
            version: template.current_version,
            head_agent_slug,
            agents,
            delegations,
            knowledge,
        })
    }
}
