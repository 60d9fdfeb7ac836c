// Resource provisioner and verifier tests

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{agent_config, template_schedule, Fixture};
use teamdeploy_control_plane::services::{ProvisioningVerifier, ResourceProvisioner};
use teamdeploy_control_plane::DeployConfig;
use teamdeploy_core::{
    AgentIdentity, Channel, MemberKind, NewAgentIdentity, NewChannel, ResourceStore, StoreError,
    StoreResult,
};
use teamdeploy_storage::InMemoryDatabase;
use uuid::Uuid;

/// Resource store with scripted faults
struct ScriptedResources {
    inner: Arc<InMemoryDatabase>,
    /// Next identity lookup reports nothing, as if another writer had not committed yet
    hide_next_identity: AtomicBool,
    /// Number of channel inserts to fail before delegating
    failing_channel_inserts: AtomicUsize,
}

impl ScriptedResources {
    fn new(inner: Arc<InMemoryDatabase>) -> Self {
        Self {
            inner,
            hide_next_identity: AtomicBool::new(false),
            failing_channel_inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ResourceStore for ScriptedResources {
    async fn find_agent_identity(
        &self,
        agent_id: Uuid,
        workspace_id: Uuid,
    ) -> StoreResult<Option<AgentIdentity>> {
        if self.hide_next_identity.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_agent_identity(agent_id, workspace_id).await
    }

    async fn insert_agent_identity(&self, input: NewAgentIdentity) -> StoreResult<AgentIdentity> {
        self.inner.insert_agent_identity(input).await
    }

    async fn is_workspace_member(&self, workspace_id: Uuid, member_id: Uuid) -> StoreResult<bool> {
        self.inner.is_workspace_member(workspace_id, member_id).await
    }

    async fn add_workspace_member(
        &self,
        workspace_id: Uuid,
        member_id: Uuid,
        kind: MemberKind,
    ) -> StoreResult<()> {
        self.inner.add_workspace_member(workspace_id, member_id, kind).await
    }

    async fn find_channel(&self, workspace_id: Uuid, name: &str) -> StoreResult<Option<Channel>> {
        self.inner.find_channel(workspace_id, name).await
    }

    async fn insert_channel(&self, input: NewChannel) -> StoreResult<Channel> {
        let remaining = self.failing_channel_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_channel_inserts
                .store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::database("statement timeout"));
        }
        self.inner.insert_channel(input).await
    }

    async fn is_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<bool> {
        self.inner.is_channel_member(channel_id, member_id).await
    }

    async fn add_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<()> {
        self.inner.add_channel_member(channel_id, member_id).await
    }

    async fn count_agent_identities(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        self.inner.count_agent_identities(workspace_id, agent_ids).await
    }

    async fn count_channels(&self, workspace_id: Uuid, agent_ids: &[Uuid]) -> StoreResult<u64> {
        self.inner.count_channels(workspace_id, agent_ids).await
    }
}

fn provisioner(resources: Arc<dyn ResourceStore>) -> ResourceProvisioner {
    ResourceProvisioner::new(resources, &DeployConfig::default())
}

#[tokio::test]
async fn test_provision_agent_creates_resources() {
    let fx = Fixture::new();
    let agent = agent_config("researcher");
    let creator = Uuid::now_v7();

    let provisioned = provisioner(fx.stores.resources.clone())
        .provision_agent(fx.workspace_id, &agent, Some(creator))
        .await
        .unwrap();

    let prefix = &fx.workspace_id.simple().to_string()[..8];
    assert_eq!(
        provisioned.identity.address,
        format!("researcher.{prefix}@agents.teamdeploy.internal")
    );
    assert_eq!(provisioned.identity.display_name, agent.name);
    assert_eq!(provisioned.channel.name, "agent-researcher");
    assert_eq!(provisioned.channel.agent_id, Some(agent.id));

    let members = fx.db.channel_member_ids(provisioned.channel.id);
    assert_eq!(members.len(), 2);
    assert!(members.contains(&provisioned.identity.id));
    assert!(members.contains(&creator));
    assert_eq!(
        fx.db.workspace_member_ids(fx.workspace_id),
        vec![provisioned.identity.id]
    );
}

#[tokio::test]
async fn test_provision_agent_is_idempotent() {
    let fx = Fixture::new();
    let agent = agent_config("researcher");
    let provisioner = provisioner(fx.stores.resources.clone());

    let first = provisioner
        .provision_agent(fx.workspace_id, &agent, None)
        .await
        .unwrap();
    let second = provisioner
        .provision_agent(fx.workspace_id, &agent, None)
        .await
        .unwrap();

    assert_eq!(first.identity.id, second.identity.id);
    assert_eq!(first.channel.id, second.channel.id);
    assert_eq!(fx.db.workspace_identities(fx.workspace_id).len(), 1);
    assert_eq!(fx.db.workspace_channels(fx.workspace_id).len(), 1);
}

#[tokio::test]
async fn test_lost_identity_race_rereads_row() {
    let fx = Fixture::new();
    let agent = agent_config("researcher");
    let existing = provisioner(fx.stores.resources.clone())
        .provision_agent(fx.workspace_id, &agent, None)
        .await
        .unwrap();

    let racing = Arc::new(ScriptedResources::new(fx.db.clone()));
    racing.hide_next_identity.store(true, Ordering::SeqCst);

    let provisioned = provisioner(racing)
        .provision_agent(fx.workspace_id, &agent, None)
        .await
        .unwrap();

    assert_eq!(provisioned.identity.id, existing.identity.id);
    assert_eq!(fx.db.workspace_identities(fx.workspace_id).len(), 1);
}

#[tokio::test]
async fn test_provision_all_continues_past_failures() {
    let fx = Fixture::new();
    let flaky = Arc::new(ScriptedResources::new(fx.db.clone()));
    flaky.failing_channel_inserts.store(1, Ordering::SeqCst);
    let agents = vec![agent_config("researcher"), agent_config("writer")];

    let summary = provisioner(flaky)
        .provision_all(fx.workspace_id, &agents, None)
        .await;

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(summary.outcomes[0].slug, "researcher");
    assert!(summary.outcomes[0].error.is_some());
    assert!(summary.outcomes[1].error.is_none());
    assert_eq!(fx.db.workspace_identities(fx.workspace_id).len(), 2);
    assert_eq!(fx.db.workspace_channels(fx.workspace_id).len(), 1);
}

#[tokio::test]
async fn test_verifier_retries_transient_failure() {
    let fx = Fixture::new();
    let agent = agent_config("researcher");
    fx.db
        .insert_template_schedule(template_schedule(agent.id, "Daily Summary", "0 9 * * *"));

    let flaky = Arc::new(ScriptedResources::new(fx.db.clone()));
    flaky.failing_channel_inserts.store(1, Ordering::SeqCst);
    let stores = fx.stores.clone().with_resources(flaky);

    let report = ProvisioningVerifier::new(&stores, &DeployConfig::default())
        .provision_and_verify(fx.workspace_id, &[agent], None)
        .await;

    assert!(report.complete);
    assert_eq!(report.attempts, 2);
    assert!(report.issues.is_empty());
    assert!(fx.db.audit_entries(fx.workspace_id).is_empty());
}

#[tokio::test]
async fn test_verifier_without_agents_is_complete() {
    let fx = Fixture::new();

    let report = ProvisioningVerifier::new(&fx.stores, &DeployConfig::default())
        .provision_and_verify(fx.workspace_id, &[], None)
        .await;

    assert!(report.complete);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.expected_agents, 0);
}

#[tokio::test]
async fn test_verifier_respects_retry_budget() {
    let fx = Fixture::new();
    let agent = agent_config("researcher");
    let config = DeployConfig {
        verify_retries: 0,
        ..Default::default()
    };

    let report = ProvisioningVerifier::new(&fx.stores, &config)
        .provision_and_verify(fx.workspace_id, &[agent], None)
        .await;

    assert!(!report.complete);
    assert_eq!(report.attempts, 1);
    assert_eq!(fx.db.audit_entries(fx.workspace_id).len(), 1);
}
