// Resource provisioner
//
// Ensures each enabled agent has an identity, workspace membership, a channel
// and channel membership. Every step is check-then-insert; a uniqueness
// conflict means a concurrent writer got there first and the row is re-read.
//
// `provision_agent` returns errors. `provision_all` logs them and moves on
// to the next agent, so one failing agent never blocks its siblings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use teamdeploy_core::resources::{channel_name, identity_address};
use teamdeploy_core::{
    AgentConfig, AgentIdentity, Channel, MemberKind, NewAgentIdentity, NewChannel,
    ResourceStore, StoreError, StoreResult,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::DeployConfig;

/// Resources backing one provisioned agent
#[derive(Debug, Clone)]
pub struct ProvisionedAgent {
    pub identity: AgentIdentity,
    pub channel: Channel,
}

/// Per-agent result of `provision_all`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProvisionOutcome {
    pub agent_id: Uuid,
    pub slug: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSummary {
    pub outcomes: Vec<AgentProvisionOutcome>,
}

impl ProvisionSummary {
    pub fn failed(&self) -> impl Iterator<Item = &AgentProvisionOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

#[derive(Clone)]
pub struct ResourceProvisioner {
    resources: Arc<dyn ResourceStore>,
    identity_domain: String,
}

impl ResourceProvisioner {
    pub fn new(resources: Arc<dyn ResourceStore>, config: &DeployConfig) -> Self {
        Self {
            resources,
            identity_domain: config.identity_domain.clone(),
        }
    }

    /// Provision every agent, logging failures instead of returning them
    pub async fn provision_all(
        &self,
        workspace_id: Uuid,
        agents: &[AgentConfig],
        created_by: Option<Uuid>,
    ) -> ProvisionSummary {
        let mut summary = ProvisionSummary::default();
        for agent in agents {
            let error = match self.provision_agent(workspace_id, agent, created_by).await {
                Ok(_) => None,
                Err(e) => {
                    error!(
                        workspace_id = %workspace_id,
                        agent = %agent.slug,
                        error = %e,
                        "Failed to provision agent resources"
                    );
                    Some(e.to_string())
                }
            };
            summary.outcomes.push(AgentProvisionOutcome {
                agent_id: agent.id,
                slug: agent.slug.clone(),
                error,
            });
        }
        summary
    }

    /// Ensure all resources of one agent exist
    pub async fn provision_agent(
        &self,
        workspace_id: Uuid,
        agent: &AgentConfig,
        created_by: Option<Uuid>,
    ) -> StoreResult<ProvisionedAgent> {
        let identity = self.ensure_identity(workspace_id, agent).await?;
        self.ensure_workspace_member(workspace_id, identity.id).await?;

        let channel = self.ensure_channel(workspace_id, agent).await?;
        self.ensure_channel_member(channel.id, identity.id).await?;
        if let Some(creator) = created_by {
            self.ensure_channel_member(channel.id, creator).await?;
        }

        debug!(
            workspace_id = %workspace_id,
            agent = %agent.slug,
            identity_id = %identity.id,
            channel_id = %channel.id,
            "Agent resources in place"
        );

        Ok(ProvisionedAgent { identity, channel })
    }

    async fn ensure_identity(
        &self,
        workspace_id: Uuid,
        agent: &AgentConfig,
    ) -> StoreResult<AgentIdentity> {
        if let Some(identity) = self.resources.find_agent_identity(agent.id, workspace_id).await? {
            return Ok(identity);
        }

        let input = NewAgentIdentity {
            agent_id: agent.id,
            workspace_id,
            address: identity_address(&agent.slug, workspace_id, &self.identity_domain),
            display_name: agent.name.clone(),
        };
        match self.resources.insert_agent_identity(input).await {
            Ok(identity) => Ok(identity),
            Err(e) if e.is_unique_violation() => self
                .resources
                .find_agent_identity(agent.id, workspace_id)
                .await?
                .ok_or_else(|| {
                    StoreError::NotFound(format!("agent identity for {} after conflict", agent.slug))
                }),
            Err(e) => Err(e),
        }
    }

    async fn ensure_workspace_member(&self, workspace_id: Uuid, member_id: Uuid) -> StoreResult<()> {
        if self.resources.is_workspace_member(workspace_id, member_id).await? {
            return Ok(());
        }
        match self
            .resources
            .add_workspace_member(workspace_id, member_id, MemberKind::Agent)
            .await
        {
            Err(e) if !e.is_unique_violation() => Err(e),
            _ => Ok(()),
        }
    }

    async fn ensure_channel(&self, workspace_id: Uuid, agent: &AgentConfig) -> StoreResult<Channel> {
        let name = channel_name(&agent.slug);
        if let Some(channel) = self.resources.find_channel(workspace_id, &name).await? {
            return Ok(channel);
        }

        let input = NewChannel {
            workspace_id,
            name: name.clone(),
            agent_id: Some(agent.id),
        };
        match self.resources.insert_channel(input).await {
            Ok(channel) => Ok(channel),
            Err(e) if e.is_unique_violation() => self
                .resources
                .find_channel(workspace_id, &name)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("channel {name} after conflict"))),
            Err(e) => Err(e),
        }
    }

    async fn ensure_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<()> {
        if self.resources.is_channel_member(channel_id, member_id).await? {
            return Ok(());
        }
        match self.resources.add_channel_member(channel_id, member_id).await {
            Err(e) if !e.is_unique_violation() => Err(e),
            _ => Ok(()),
        }
    }
}
