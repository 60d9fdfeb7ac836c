// In-memory storage implementation for dev mode and tests
// Decision: Use parking_lot for thread-safe access
// Decision: UUIDs generated via uuid v7 (time-ordered)
//
// Enforces the same uniqueness keys as the PostgreSQL schema, and batch
// schedule inserts are all-or-nothing, so race-handling code paths behave the
// same against either backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use teamdeploy_core::{
    AgentIdentity, AgentTemplate, AuditEntry, AuditStore, BillingAlert,
    BillingStore, Channel, Customizations, DelegationTemplate, DeployStatus, Deployment,
    DeploymentStatus, DeploymentStore, KnowledgeItem, MemberKind, NewAgentIdentity,
    NewAuditEntry, NewBillingAlert, NewChannel, NewDeployment, NewSchedule, PendingTier, Plan,
    ResourceStore, Schedule, ScheduleStore, StoreError, StoreResult, TeamAgentLink, TeamConfig,
    TeamTemplate, TemplateStore, WorkspaceBilling,
};

use crate::models::UpsertWorkspaceBilling;

/// In-memory database for dev mode
/// All data is stored in memory and lost on restart
#[derive(Default)]
pub struct InMemoryDatabase {
    templates: RwLock<HashMap<Uuid, TeamTemplate>>,
    agent_templates: RwLock<HashMap<Uuid, AgentTemplate>>,
    team_agents: RwLock<Vec<TeamAgentLink>>,
    delegations: RwLock<Vec<DelegationTemplate>>,
    shared_knowledge: RwLock<Vec<(Uuid, KnowledgeItem)>>,
    plans: RwLock<HashMap<String, Plan>>,
    deployments: RwLock<HashMap<Uuid, Deployment>>,
    // Insertion order doubles as creation order
    schedules: RwLock<Vec<Schedule>>,
    identities: RwLock<Vec<AgentIdentity>>,
    workspace_members: RwLock<HashMap<(Uuid, Uuid), MemberKind>>,
    channels: RwLock<Vec<Channel>>,
    channel_members: RwLock<HashSet<(Uuid, Uuid)>>,
    billing: RwLock<HashMap<Uuid, WorkspaceBilling>>,
    alerts: RwLock<Vec<BillingAlert>>,
    audit_log: RwLock<Vec<AuditEntry>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule_from(input: &NewSchedule) -> Schedule {
        Schedule {
            id: Uuid::now_v7(),
            agent_id: input.agent_id,
            workspace_id: input.workspace_id,
            name: input.name.clone(),
            prompt: input.prompt.clone(),
            cron_expression: input.cron_expression.clone(),
            timezone: input.timezone.clone(),
            is_template: input.is_template,
            is_enabled: input.is_enabled,
            next_run_at: input.next_run_at,
            created_by: input.created_by,
            created_at: Self::now(),
        }
    }

    fn tenant_key(row: &NewSchedule) -> Option<(Uuid, Uuid, String)> {
        if row.is_template {
            return None;
        }
        row.workspace_id
            .map(|workspace_id| (row.agent_id, workspace_id, row.name.clone()))
    }

    fn tenant_key_taken(schedules: &[Schedule], key: &(Uuid, Uuid, String)) -> bool {
        schedules.iter().any(|s| {
            !s.is_template
                && s.agent_id == key.0
                && s.workspace_id == Some(key.1)
                && s.name == key.2
        })
    }

    // ============================================
    // Catalog seeding (dev mode and tests)
    // ============================================

    pub fn insert_team_template(&self, template: TeamTemplate) {
        self.templates.write().insert(template.id, template);
    }

    pub fn insert_agent_template(&self, agent: AgentTemplate) {
        self.agent_templates.write().insert(agent.id, agent);
    }

    pub fn link_team_agent(&self, template_id: Uuid, agent_id: Uuid, position: i32) {
        self.team_agents.write().push(TeamAgentLink {
            template_id,
            agent_id,
            position,
        });
    }

    pub fn insert_delegation(&self, delegation: DelegationTemplate) {
        self.delegations.write().push(delegation);
    }

    pub fn add_shared_knowledge(&self, template_id: Uuid, item: KnowledgeItem) {
        self.shared_knowledge.write().push((template_id, item));
    }

    pub fn upsert_plan(&self, plan: &Plan) {
        self.plans.write().insert(plan.tier.clone(), plan.clone());
    }

    /// Insert a template schedule; template rows carry no uniqueness key
    pub fn insert_template_schedule(&self, input: NewSchedule) -> Schedule {
        let row = Self::schedule_from(&NewSchedule {
            workspace_id: None,
            is_template: true,
            ..input
        });
        self.schedules.write().push(row.clone());
        row
    }

    pub fn upsert_workspace_billing(&self, input: UpsertWorkspaceBilling) {
        let mut billing = self.billing.write();
        let deploy_status = billing
            .get(&input.workspace_id)
            .and_then(|b| b.agent_deploy_status);
        billing.insert(
            input.workspace_id,
            WorkspaceBilling {
                workspace_id: input.workspace_id,
                agent_tier: input.agent_tier,
                agent_tier_pending: input.agent_tier_pending,
                agent_tier_pending_effective_at: input.agent_tier_pending_effective_at,
                agent_status: input.agent_status,
                agent_deploy_status: deploy_status,
                updated_at: Self::now(),
            },
        );
    }

    // ============================================
    // Inspection (dev mode and tests)
    // ============================================

    pub fn list_deployments(&self, workspace_id: Uuid) -> Vec<Deployment> {
        let mut rows: Vec<_> = self
            .deployments
            .read()
            .values()
            .filter(|d| d.workspace_id == workspace_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        rows
    }

    pub fn workspace_schedules(&self, workspace_id: Uuid) -> Vec<Schedule> {
        self.schedules
            .read()
            .iter()
            .filter(|s| !s.is_template && s.workspace_id == Some(workspace_id))
            .cloned()
            .collect()
    }

    pub fn workspace_identities(&self, workspace_id: Uuid) -> Vec<AgentIdentity> {
        self.identities
            .read()
            .iter()
            .filter(|i| i.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    pub fn workspace_channels(&self, workspace_id: Uuid) -> Vec<Channel> {
        self.channels
            .read()
            .iter()
            .filter(|c| c.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    pub fn channel_member_ids(&self, channel_id: Uuid) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .channel_members
            .read()
            .iter()
            .filter(|(c, _)| *c == channel_id)
            .map(|(_, m)| *m)
            .collect();
        ids.sort();
        ids
    }

    pub fn workspace_member_ids(&self, workspace_id: Uuid) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .workspace_members
            .read()
            .keys()
            .filter(|(w, _)| *w == workspace_id)
            .map(|(_, m)| *m)
            .collect();
        ids.sort();
        ids
    }

    pub fn audit_entries(&self, workspace_id: Uuid) -> Vec<AuditEntry> {
        self.audit_log
            .read()
            .iter()
            .filter(|e| e.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    pub fn billing_alerts(&self, workspace_id: Uuid) -> Vec<BillingAlert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| a.workspace_id == workspace_id)
            .cloned()
            .collect()
    }
}

// ============================================
// Template catalog
// ============================================

#[async_trait]
impl TemplateStore for InMemoryDatabase {
    async fn get_template(&self, template_id: Uuid) -> StoreResult<Option<TeamTemplate>> {
        Ok(self.templates.read().get(&template_id).cloned())
    }

    async fn list_team_agent_links(&self, template_id: Uuid) -> StoreResult<Vec<TeamAgentLink>> {
        let mut links: Vec<_> = self
            .team_agents
            .read()
            .iter()
            .filter(|l| l.template_id == template_id)
            .copied()
            .collect();
        links.sort_by_key(|l| (l.position, l.agent_id));
        Ok(links)
    }

    async fn get_agent_templates(&self, agent_ids: &[Uuid]) -> StoreResult<Vec<AgentTemplate>> {
        let agents = self.agent_templates.read();
        Ok(agent_ids
            .iter()
            .filter_map(|id| agents.get(id).cloned())
            .collect())
    }

    async fn list_delegations(&self, template_id: Uuid) -> StoreResult<Vec<DelegationTemplate>> {
        Ok(self
            .delegations
            .read()
            .iter()
            .filter(|d| d.template_id == template_id)
            .cloned()
            .collect())
    }

    async fn list_shared_knowledge(&self, template_id: Uuid) -> StoreResult<Vec<KnowledgeItem>> {
        Ok(self
            .shared_knowledge
            .read()
            .iter()
            .filter(|(t, _)| *t == template_id)
            .map(|(_, k)| k.clone())
            .collect())
    }

    async fn get_plan(&self, tier: &str) -> StoreResult<Option<Plan>> {
        Ok(self.plans.read().get(tier).cloned())
    }
}

// ============================================
// Deployments
// ============================================

#[async_trait]
impl DeploymentStore for InMemoryDatabase {
    async fn get_active_deployment(&self, workspace_id: Uuid) -> StoreResult<Option<Deployment>> {
        Ok(self
            .deployments
            .read()
            .values()
            .filter(|d| d.workspace_id == workspace_id && d.status == DeploymentStatus::Active)
            .max_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)))
            .cloned())
    }

    async fn get_deployment(&self, deployment_id: Uuid) -> StoreResult<Option<Deployment>> {
        Ok(self.deployments.read().get(&deployment_id).cloned())
    }

    async fn insert_deployment(&self, input: NewDeployment) -> StoreResult<Deployment> {
        let now = Self::now();
        let row = Deployment {
            id: Uuid::now_v7(),
            workspace_id: input.workspace_id,
            source_template_id: input.source_template_id,
            source_version: input.source_version,
            base_config: input.base_config,
            customizations: input.customizations,
            active_config: input.active_config,
            status: DeploymentStatus::Pending,
            previous_deployment_id: input.previous_deployment_id,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };
        self.deployments.write().insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_deployment_status(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
    ) -> StoreResult<bool> {
        let mut deployments = self.deployments.write();
        match deployments.get_mut(&deployment_id) {
            Some(deployment) => {
                deployment.status = status;
                deployment.updated_at = Self::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_customizations(
        &self,
        deployment_id: Uuid,
        customizations: &Customizations,
        active_config: &TeamConfig,
    ) -> StoreResult<bool> {
        let mut deployments = self.deployments.write();
        match deployments.get_mut(&deployment_id) {
            Some(deployment) => {
                deployment.customizations = customizations.clone();
                deployment.active_config = active_config.clone();
                deployment.updated_at = Self::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================
// Schedules
// ============================================

#[async_trait]
impl ScheduleStore for InMemoryDatabase {
    async fn list_template_schedules(&self, agent_ids: &[Uuid]) -> StoreResult<Vec<Schedule>> {
        Ok(self
            .schedules
            .read()
            .iter()
            .filter(|s| s.is_template && agent_ids.contains(&s.agent_id))
            .cloned()
            .collect())
    }

    async fn list_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<Vec<Schedule>> {
        Ok(self
            .schedules
            .read()
            .iter()
            .filter(|s| {
                !s.is_template
                    && s.workspace_id == Some(workspace_id)
                    && agent_ids.contains(&s.agent_id)
            })
            .cloned()
            .collect())
    }

    async fn insert_schedules(&self, rows: &[NewSchedule]) -> StoreResult<u64> {
        let mut schedules = self.schedules.write();

        let mut batch_keys = HashSet::new();
        for row in rows {
            if let Some(key) = Self::tenant_key(row) {
                if Self::tenant_key_taken(&schedules, &key) || !batch_keys.insert(key) {
                    return Err(StoreError::unique("idx_schedules_tenant_key"));
                }
            }
        }

        schedules.extend(rows.iter().map(Self::schedule_from));
        Ok(rows.len() as u64)
    }

    async fn insert_schedule(&self, row: &NewSchedule) -> StoreResult<Schedule> {
        let mut schedules = self.schedules.write();
        if let Some(key) = Self::tenant_key(row) {
            if Self::tenant_key_taken(&schedules, &key) {
                return Err(StoreError::unique("idx_schedules_tenant_key"));
            }
        }
        let inserted = Self::schedule_from(row);
        schedules.push(inserted.clone());
        Ok(inserted)
    }

    async fn delete_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        let mut schedules = self.schedules.write();
        let before = schedules.len();
        schedules.retain(|s| {
            s.is_template
                || s.workspace_id != Some(workspace_id)
                || !agent_ids.contains(&s.agent_id)
        });
        Ok((before - schedules.len()) as u64)
    }

    async fn count_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        Ok(self
            .schedules
            .read()
            .iter()
            .filter(|s| {
                !s.is_template
                    && s.workspace_id == Some(workspace_id)
                    && agent_ids.contains(&s.agent_id)
            })
            .count() as u64)
    }
}

// ============================================
// Workspace resources
// ============================================

#[async_trait]
impl ResourceStore for InMemoryDatabase {
    async fn find_agent_identity(
        &self,
        agent_id: Uuid,
        workspace_id: Uuid,
    ) -> StoreResult<Option<AgentIdentity>> {
        Ok(self
            .identities
            .read()
            .iter()
            .find(|i| i.agent_id == agent_id && i.workspace_id == workspace_id)
            .cloned())
    }

    async fn insert_agent_identity(&self, input: NewAgentIdentity) -> StoreResult<AgentIdentity> {
        let mut identities = self.identities.write();
        if identities
            .iter()
            .any(|i| i.agent_id == input.agent_id && i.workspace_id == input.workspace_id)
        {
            return Err(StoreError::unique("agent_identities_agent_id_workspace_id_key"));
        }
        let row = AgentIdentity {
            id: Uuid::now_v7(),
            agent_id: input.agent_id,
            workspace_id: input.workspace_id,
            address: input.address,
            display_name: input.display_name,
            created_at: Self::now(),
        };
        identities.push(row.clone());
        Ok(row)
    }

    async fn is_workspace_member(&self, workspace_id: Uuid, member_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .workspace_members
            .read()
            .contains_key(&(workspace_id, member_id)))
    }

    async fn add_workspace_member(
        &self,
        workspace_id: Uuid,
        member_id: Uuid,
        kind: MemberKind,
    ) -> StoreResult<()> {
        let mut members = self.workspace_members.write();
        if members.contains_key(&(workspace_id, member_id)) {
            return Err(StoreError::unique("workspace_members_pkey"));
        }
        members.insert((workspace_id, member_id), kind);
        Ok(())
    }

    async fn find_channel(&self, workspace_id: Uuid, name: &str) -> StoreResult<Option<Channel>> {
        Ok(self
            .channels
            .read()
            .iter()
            .find(|c| c.workspace_id == workspace_id && c.name == name)
            .cloned())
    }

    async fn insert_channel(&self, input: NewChannel) -> StoreResult<Channel> {
        let mut channels = self.channels.write();
        if channels
            .iter()
            .any(|c| c.workspace_id == input.workspace_id && c.name == input.name)
        {
            return Err(StoreError::unique("channels_workspace_id_name_key"));
        }
        let row = Channel {
            id: Uuid::now_v7(),
            workspace_id: input.workspace_id,
            name: input.name,
            agent_id: input.agent_id,
            created_at: Self::now(),
        };
        channels.push(row.clone());
        Ok(row)
    }

    async fn is_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .channel_members
            .read()
            .contains(&(channel_id, member_id)))
    }

    async fn add_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<()> {
        if !self.channel_members.write().insert((channel_id, member_id)) {
            return Err(StoreError::unique("channel_members_pkey"));
        }
        Ok(())
    }

    async fn count_agent_identities(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        Ok(self
            .identities
            .read()
            .iter()
            .filter(|i| i.workspace_id == workspace_id && agent_ids.contains(&i.agent_id))
            .count() as u64)
    }

    async fn count_channels(&self, workspace_id: Uuid, agent_ids: &[Uuid]) -> StoreResult<u64> {
        Ok(self
            .channels
            .read()
            .iter()
            .filter(|c| {
                c.workspace_id == workspace_id
                    && c.agent_id.is_some_and(|agent_id| agent_ids.contains(&agent_id))
            })
            .count() as u64)
    }
}

// ============================================
// Billing
// ============================================

#[async_trait]
impl BillingStore for InMemoryDatabase {
    async fn get_billing(&self, workspace_id: Uuid) -> StoreResult<Option<WorkspaceBilling>> {
        Ok(self.billing.read().get(&workspace_id).cloned())
    }

    async fn list_due_pending_tiers(&self, now: DateTime<Utc>) -> StoreResult<Vec<PendingTier>> {
        let mut due: Vec<PendingTier> = self
            .billing
            .read()
            .values()
            .filter_map(|b| {
                let tier = b.agent_tier_pending.clone()?;
                match b.agent_tier_pending_effective_at {
                    Some(at) if at > now => None,
                    effective_at => Some(PendingTier {
                        workspace_id: b.workspace_id,
                        tier,
                        effective_at,
                    }),
                }
            })
            .collect();
        due.sort_by_key(|p| (p.effective_at, p.workspace_id));
        Ok(due)
    }

    async fn claim_pending_tier(
        &self,
        workspace_id: Uuid,
        expected_pending: &str,
    ) -> StoreResult<bool> {
        let mut billing = self.billing.write();
        match billing.get_mut(&workspace_id) {
            Some(row) if row.agent_tier_pending.as_deref() == Some(expected_pending) => {
                row.agent_tier = Some(expected_pending.to_string());
                row.agent_tier_pending = None;
                row.agent_tier_pending_effective_at = None;
                row.updated_at = Self::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_deploy_status(&self, workspace_id: Uuid, status: DeployStatus) -> StoreResult<()> {
        if let Some(row) = self.billing.write().get_mut(&workspace_id) {
            row.agent_deploy_status = Some(status);
            row.updated_at = Self::now();
        }
        Ok(())
    }

    async fn record_alert(&self, alert: NewBillingAlert) -> StoreResult<()> {
        self.alerts.write().push(BillingAlert {
            id: Uuid::now_v7(),
            workspace_id: alert.workspace_id,
            kind: alert.kind.as_str().to_string(),
            message: alert.message,
            metadata: alert.metadata,
            created_at: Self::now(),
        });
        Ok(())
    }
}

// ============================================
// Audit log
// ============================================

#[async_trait]
impl AuditStore for InMemoryDatabase {
    async fn record(&self, entry: NewAuditEntry) -> StoreResult<()> {
        self.audit_log.write().push(AuditEntry {
            id: Uuid::now_v7(),
            workspace_id: entry.workspace_id,
            action: entry.action,
            metadata: entry.metadata,
            created_at: Self::now(),
        });
        Ok(())
    }
}
