// Core traits for pluggable storage backends
//
// These traits keep the deployment services independent of the database:
// - PostgreSQL implementations for production
// - In-memory implementations for dev mode and tests
// - Thin wrappers in tests for fault injection
//
// Every method takes the workspace id explicitly; there is no ambient tenant.
// None of the traits offer multi-row transactions. The only conditional write
// is `BillingStore::claim_pending_tier`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::NewAuditEntry;
use crate::billing::{DeployStatus, NewBillingAlert, PendingTier, WorkspaceBilling};
use crate::config::TeamConfig;
use crate::customizations::Customizations;
use crate::deployment::{Deployment, DeploymentStatus, NewDeployment};
use crate::error::StoreResult;
use crate::resources::{AgentIdentity, Channel, MemberKind, NewAgentIdentity, NewChannel};
use crate::schedule::{NewSchedule, Schedule};
use crate::template::{AgentTemplate, DelegationTemplate, KnowledgeItem, Plan, TeamAgentLink, TeamTemplate};

// ============================================================================
// TemplateStore - Read-only template and plan catalog
// ============================================================================

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, template_id: Uuid) -> StoreResult<Option<TeamTemplate>>;

    /// Team-agent links ordered by position
    async fn list_team_agent_links(&self, template_id: Uuid) -> StoreResult<Vec<TeamAgentLink>>;

    /// Agent templates for the given ids; unknown ids are omitted
    async fn get_agent_templates(&self, agent_ids: &[Uuid]) -> StoreResult<Vec<AgentTemplate>>;

    /// Delegations in template order
    async fn list_delegations(&self, template_id: Uuid) -> StoreResult<Vec<DelegationTemplate>>;

    /// Shared team knowledge in template order
    async fn list_shared_knowledge(&self, template_id: Uuid) -> StoreResult<Vec<KnowledgeItem>>;

    async fn get_plan(&self, tier: &str) -> StoreResult<Option<Plan>>;
}

// ============================================================================
// DeploymentStore - Deployment rows
// ============================================================================

#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Most recently created active deployment of the workspace
    async fn get_active_deployment(&self, workspace_id: Uuid) -> StoreResult<Option<Deployment>>;

    async fn get_deployment(&self, deployment_id: Uuid) -> StoreResult<Option<Deployment>>;

    /// Insert a new deployment with status `pending`
    async fn insert_deployment(&self, input: NewDeployment) -> StoreResult<Deployment>;

    /// Returns false when the row does not exist
    async fn set_deployment_status(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
    ) -> StoreResult<bool>;

    async fn update_customizations(
        &self,
        deployment_id: Uuid,
        customizations: &Customizations,
        active_config: &TeamConfig,
    ) -> StoreResult<bool>;
}

// ============================================================================
// ScheduleStore - Template and tenant schedules
// ============================================================================

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Template rows for the given agents, oldest first
    async fn list_template_schedules(&self, agent_ids: &[Uuid]) -> StoreResult<Vec<Schedule>>;

    /// Tenant clones in the workspace for the given agents
    async fn list_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<Vec<Schedule>>;

    /// Insert all rows or none; a uniqueness conflict on any row rejects the batch
    async fn insert_schedules(&self, rows: &[NewSchedule]) -> StoreResult<u64>;

    async fn insert_schedule(&self, row: &NewSchedule) -> StoreResult<Schedule>;

    /// Delete tenant clones of the given agents; template rows are never touched
    async fn delete_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64>;

    /// Tenant clones in the workspace owned by the given agents
    async fn count_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64>;
}

// ============================================================================
// ResourceStore - Identities, memberships, channels
// ============================================================================

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn find_agent_identity(
        &self,
        agent_id: Uuid,
        workspace_id: Uuid,
    ) -> StoreResult<Option<AgentIdentity>>;

    async fn insert_agent_identity(&self, input: NewAgentIdentity) -> StoreResult<AgentIdentity>;

    async fn is_workspace_member(&self, workspace_id: Uuid, member_id: Uuid) -> StoreResult<bool>;

    async fn add_workspace_member(
        &self,
        workspace_id: Uuid,
        member_id: Uuid,
        kind: MemberKind,
    ) -> StoreResult<()>;

    async fn find_channel(&self, workspace_id: Uuid, name: &str) -> StoreResult<Option<Channel>>;

    async fn insert_channel(&self, input: NewChannel) -> StoreResult<Channel>;

    async fn is_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<bool>;

    async fn add_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<()>;

    /// Identities in the workspace belonging to the given agents
    async fn count_agent_identities(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64>;

    /// Agent channels in the workspace bound to the given agents
    async fn count_channels(&self, workspace_id: Uuid, agent_ids: &[Uuid]) -> StoreResult<u64>;
}

// ============================================================================
// BillingStore - Pending tier CAS and deploy status
// ============================================================================

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn get_billing(&self, workspace_id: Uuid) -> StoreResult<Option<WorkspaceBilling>>;

    /// Workspaces whose pending tier is effective at or before `now`
    async fn list_due_pending_tiers(&self, now: DateTime<Utc>) -> StoreResult<Vec<PendingTier>>;

    /// Commit `expected_pending` as the tier and clear the pending fields,
    /// only if the stored pending tier still equals `expected_pending`.
    /// Returns false when another caller consumed it first.
    async fn claim_pending_tier(
        &self,
        workspace_id: Uuid,
        expected_pending: &str,
    ) -> StoreResult<bool>;

    async fn set_deploy_status(&self, workspace_id: Uuid, status: DeployStatus) -> StoreResult<()>;

    async fn record_alert(&self, alert: NewBillingAlert) -> StoreResult<()>;
}

// ============================================================================
// AuditStore - Operational audit trail
// ============================================================================

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> StoreResult<()>;
}

// ============================================================================
// Stores - Bundle handed to services
// ============================================================================

/// Trait objects for every store, cheap to clone
#[derive(Clone)]
pub struct Stores {
    pub templates: Arc<dyn TemplateStore>,
    pub deployments: Arc<dyn DeploymentStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub billing: Arc<dyn BillingStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    /// Use one backend for every store
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TemplateStore
            + DeploymentStore
            + ScheduleStore
            + ResourceStore
            + BillingStore
            + AuditStore
            + 'static,
    {
        Self {
            templates: backend.clone(),
            deployments: backend.clone(),
            schedules: backend.clone(),
            resources: backend.clone(),
            billing: backend.clone(),
            audit: backend,
        }
    }

    pub fn with_schedules(mut self, schedules: Arc<dyn ScheduleStore>) -> Self {
        self.schedules = schedules;
        self
    }

    pub fn with_resources(mut self, resources: Arc<dyn ResourceStore>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_billing(mut self, billing: Arc<dyn BillingStore>) -> Self {
        self.billing = billing;
        self
    }
}
