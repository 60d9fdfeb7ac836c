// PostgreSQL repository
//
// Implements every core store trait on top of a PgPool. No method opens a
// multi-statement transaction: batch inserts are a single statement and the
// pending-tier claim is a single conditional UPDATE.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use teamdeploy_core::{
    AgentIdentity, AgentTemplate, AuditStore, BillingStore, Channel, Customizations,
    DelegationTemplate, DeployStatus, Deployment, DeploymentStatus, DeploymentStore,
    KnowledgeItem, MemberKind, NewAgentIdentity, NewAuditEntry, NewBillingAlert, NewChannel,
    NewDeployment, NewSchedule, PendingTier, Plan, ResourceStore, Schedule, ScheduleStore,
    StoreError, StoreResult, TeamAgentLink, TeamConfig, TeamTemplate, TemplateStore,
    WorkspaceBilling,
};

use crate::models::*;

const DEPLOYMENT_COLUMNS: &str = "id, workspace_id, source_template_id, source_version, base_config, \
     customizations, active_config, status, previous_deployment_id, created_by, created_at, updated_at";

const SCHEDULE_COLUMNS: &str = "id, agent_id, workspace_id, name, prompt, cron_expression, timezone, \
     is_template, is_enabled, next_run_at, created_by, created_at";

/// Map sqlx errors, keeping uniqueness conflicts distinguishable
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::unique(db_err.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::database(err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Billing inputs (written by the payment integration)
    // ============================================

    pub async fn upsert_workspace_billing(&self, input: UpsertWorkspaceBilling) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workspace_billing
                (workspace_id, agent_tier, agent_tier_pending, agent_tier_pending_effective_at, agent_status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (workspace_id) DO UPDATE SET
                agent_tier = EXCLUDED.agent_tier,
                agent_tier_pending = EXCLUDED.agent_tier_pending,
                agent_tier_pending_effective_at = EXCLUDED.agent_tier_pending_effective_at,
                agent_status = EXCLUDED.agent_status,
                updated_at = NOW()
            "#,
        )
        .bind(input.workspace_id)
        .bind(&input.agent_tier)
        .bind(&input.agent_tier_pending)
        .bind(input.agent_tier_pending_effective_at)
        .bind(input.agent_status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert_plan(&self, plan: &Plan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plans (tier, template_id)
            VALUES ($1, $2)
            ON CONFLICT (tier) DO UPDATE SET template_id = EXCLUDED.template_id
            "#,
        )
        .bind(&plan.tier)
        .bind(plan.template_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================
// Template catalog
// ============================================

#[async_trait]
impl TemplateStore for Database {
    async fn get_template(&self, template_id: Uuid) -> StoreResult<Option<TeamTemplate>> {
        let row = sqlx::query_as::<_, TeamTemplateRow>(
            r#"
            SELECT id, name, slug, head_agent_id, current_version
            FROM team_templates
            WHERE id = $1
            "#,
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(Into::into))
    }

    async fn list_team_agent_links(&self, template_id: Uuid) -> StoreResult<Vec<TeamAgentLink>> {
        let rows: Vec<(Uuid, Uuid, i32)> = sqlx::query_as(
            r#"
            SELECT template_id, agent_id, position
            FROM team_template_agents
            WHERE template_id = $1
            ORDER BY position ASC, agent_id ASC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(template_id, agent_id, position)| TeamAgentLink {
                template_id,
                agent_id,
                position,
            })
            .collect())
    }

    async fn get_agent_templates(&self, agent_ids: &[Uuid]) -> StoreResult<Vec<AgentTemplate>> {
        let rows = sqlx::query_as::<_, AgentTemplateRow>(
            r#"
            SELECT id, slug, name, description, avatar_ref, system_prompt, model, provider,
                   tools, skills, knowledge, rules
            FROM agent_templates
            WHERE id = ANY($1)
            "#,
        )
        .bind(agent_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_delegations(&self, template_id: Uuid) -> StoreResult<Vec<DelegationTemplate>> {
        let rows = sqlx::query_as::<_, DelegationTemplateRow>(
            r#"
            SELECT id, template_id, from_agent_id, to_agent_id, condition, context_template
            FROM delegation_templates
            WHERE template_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_shared_knowledge(&self, template_id: Uuid) -> StoreResult<Vec<KnowledgeItem>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT title, content
            FROM team_template_knowledge
            WHERE template_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(title, content)| KnowledgeItem { title, content })
            .collect())
    }

    async fn get_plan(&self, tier: &str) -> StoreResult<Option<Plan>> {
        let row: Option<(String, Option<Uuid>)> =
            sqlx::query_as("SELECT tier, template_id FROM plans WHERE tier = $1")
                .bind(tier)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;

        Ok(row.map(|(tier, template_id)| Plan { tier, template_id }))
    }
}

// ============================================
// Deployments
// ============================================

#[async_trait]
impl DeploymentStore for Database {
    async fn get_active_deployment(&self, workspace_id: Uuid) -> StoreResult<Option<Deployment>> {
        let sql = format!(
            "SELECT {DEPLOYMENT_COLUMNS} FROM deployments \
             WHERE workspace_id = $1 AND status = 'active' \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, DeploymentRow>(&sql)
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(Deployment::try_from).transpose()
    }

    async fn get_deployment(&self, deployment_id: Uuid) -> StoreResult<Option<Deployment>> {
        let sql = format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE id = $1");
        let row = sqlx::query_as::<_, DeploymentRow>(&sql)
            .bind(deployment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(Deployment::try_from).transpose()
    }

    async fn insert_deployment(&self, input: NewDeployment) -> StoreResult<Deployment> {
        let sql = format!(
            "INSERT INTO deployments \
             (id, workspace_id, source_template_id, source_version, base_config, customizations, \
              active_config, status, previous_deployment_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {DEPLOYMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DeploymentRow>(&sql)
            .bind(Uuid::now_v7())
            .bind(input.workspace_id)
            .bind(input.source_template_id)
            .bind(input.source_version)
            .bind(to_json(&input.base_config)?)
            .bind(to_json(&input.customizations)?)
            .bind(to_json(&input.active_config)?)
            .bind(DeploymentStatus::Pending.as_str())
            .bind(input.previous_deployment_id)
            .bind(input.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Deployment::try_from(row)
    }

    async fn set_deployment_status(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deployments
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(deployment_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_customizations(
        &self,
        deployment_id: Uuid,
        customizations: &Customizations,
        active_config: &TeamConfig,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deployments
            SET customizations = $2, active_config = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(deployment_id)
        .bind(to_json(customizations)?)
        .bind(to_json(active_config)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

// ============================================
// Schedules
// ============================================

#[async_trait]
impl ScheduleStore for Database {
    async fn list_template_schedules(&self, agent_ids: &[Uuid]) -> StoreResult<Vec<Schedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules \
             WHERE is_template = TRUE AND agent_id = ANY($1) \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(agent_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<Vec<Schedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules \
             WHERE is_template = FALSE AND workspace_id = $1 AND agent_id = ANY($2) \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(workspace_id)
            .bind(agent_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_schedules(&self, rows: &[NewSchedule]) -> StoreResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO schedules (id, agent_id, workspace_id, name, prompt, cron_expression, \
             timezone, is_template, is_enabled, next_run_at, created_by) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(Uuid::now_v7())
                .push_bind(row.agent_id)
                .push_bind(row.workspace_id)
                .push_bind(&row.name)
                .push_bind(&row.prompt)
                .push_bind(&row.cron_expression)
                .push_bind(&row.timezone)
                .push_bind(row.is_template)
                .push_bind(row.is_enabled)
                .push_bind(row.next_run_at)
                .push_bind(row.created_by);
        });

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected())
    }

    async fn insert_schedule(&self, row: &NewSchedule) -> StoreResult<Schedule> {
        let sql = format!(
            "INSERT INTO schedules (id, agent_id, workspace_id, name, prompt, cron_expression, \
             timezone, is_template, is_enabled, next_run_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {SCHEDULE_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(Uuid::now_v7())
            .bind(row.agent_id)
            .bind(row.workspace_id)
            .bind(&row.name)
            .bind(&row.prompt)
            .bind(&row.cron_expression)
            .bind(&row.timezone)
            .bind(row.is_template)
            .bind(row.is_enabled)
            .bind(row.next_run_at)
            .bind(row.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(inserted.into())
    }

    async fn delete_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM schedules
            WHERE is_template = FALSE AND workspace_id = $1 AND agent_id = ANY($2)
            "#,
        )
        .bind(workspace_id)
        .bind(agent_ids)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected())
    }

    async fn count_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM schedules
            WHERE is_template = FALSE AND workspace_id = $1 AND agent_id = ANY($2)
            "#,
        )
        .bind(workspace_id)
        .bind(agent_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(count as u64)
    }
}

// ============================================
// Workspace resources
// ============================================

#[async_trait]
impl ResourceStore for Database {
    async fn find_agent_identity(
        &self,
        agent_id: Uuid,
        workspace_id: Uuid,
    ) -> StoreResult<Option<AgentIdentity>> {
        let row = sqlx::query_as::<_, AgentIdentityRow>(
            r#"
            SELECT id, agent_id, workspace_id, address, display_name, created_at
            FROM agent_identities
            WHERE agent_id = $1 AND workspace_id = $2
            "#,
        )
        .bind(agent_id)
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(Into::into))
    }

    async fn insert_agent_identity(&self, input: NewAgentIdentity) -> StoreResult<AgentIdentity> {
        let row = sqlx::query_as::<_, AgentIdentityRow>(
            r#"
            INSERT INTO agent_identities (id, agent_id, workspace_id, address, display_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, agent_id, workspace_id, address, display_name, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.agent_id)
        .bind(input.workspace_id)
        .bind(&input.address)
        .bind(&input.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn is_workspace_member(&self, workspace_id: Uuid, member_id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM workspace_members WHERE workspace_id = $1 AND member_id = $2)",
        )
        .bind(workspace_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(exists)
    }

    async fn add_workspace_member(
        &self,
        workspace_id: Uuid,
        member_id: Uuid,
        kind: MemberKind,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, member_id, member_kind) VALUES ($1, $2, $3)",
        )
        .bind(workspace_id)
        .bind(member_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn find_channel(&self, workspace_id: Uuid, name: &str) -> StoreResult<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, workspace_id, name, agent_id, created_at
            FROM channels
            WHERE workspace_id = $1 AND name = $2
            "#,
        )
        .bind(workspace_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(Into::into))
    }

    async fn insert_channel(&self, input: NewChannel) -> StoreResult<Channel> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            INSERT INTO channels (id, workspace_id, name, agent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, workspace_id, name, agent_id, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.workspace_id)
        .bind(&input.name)
        .bind(input.agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn is_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM channel_members WHERE channel_id = $1 AND member_id = $2)",
        )
        .bind(channel_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(exists)
    }

    async fn add_channel_member(&self, channel_id: Uuid, member_id: Uuid) -> StoreResult<()> {
        sqlx::query("INSERT INTO channel_members (channel_id, member_id) VALUES ($1, $2)")
            .bind(channel_id)
            .bind(member_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }

    async fn count_agent_identities(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM agent_identities WHERE workspace_id = $1 AND agent_id = ANY($2)",
        )
        .bind(workspace_id)
        .bind(agent_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(count as u64)
    }

    async fn count_channels(&self, workspace_id: Uuid, agent_ids: &[Uuid]) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM channels WHERE workspace_id = $1 AND agent_id = ANY($2)",
        )
        .bind(workspace_id)
        .bind(agent_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(count as u64)
    }
}

// ============================================
// Billing
// ============================================

#[async_trait]
impl BillingStore for Database {
    async fn get_billing(&self, workspace_id: Uuid) -> StoreResult<Option<WorkspaceBilling>> {
        let row = sqlx::query_as::<_, WorkspaceBillingRow>(
            r#"
            SELECT workspace_id, agent_tier, agent_tier_pending, agent_tier_pending_effective_at,
                   agent_status, agent_deploy_status, updated_at
            FROM workspace_billing
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(Into::into))
    }

    async fn list_due_pending_tiers(&self, now: DateTime<Utc>) -> StoreResult<Vec<PendingTier>> {
        let rows: Vec<(Uuid, String, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT workspace_id, agent_tier_pending, agent_tier_pending_effective_at
            FROM workspace_billing
            WHERE agent_tier_pending IS NOT NULL
              AND (agent_tier_pending_effective_at IS NULL OR agent_tier_pending_effective_at <= $1)
            ORDER BY agent_tier_pending_effective_at ASC NULLS FIRST
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(workspace_id, tier, effective_at)| PendingTier {
                workspace_id,
                tier,
                effective_at,
            })
            .collect())
    }

    async fn claim_pending_tier(
        &self,
        workspace_id: Uuid,
        expected_pending: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspace_billing
            SET agent_tier = $2,
                agent_tier_pending = NULL,
                agent_tier_pending_effective_at = NULL,
                updated_at = NOW()
            WHERE workspace_id = $1 AND agent_tier_pending = $2
            "#,
        )
        .bind(workspace_id)
        .bind(expected_pending)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_deploy_status(&self, workspace_id: Uuid, status: DeployStatus) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE workspace_billing
            SET agent_deploy_status = $2, updated_at = NOW()
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn record_alert(&self, alert: NewBillingAlert) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO billing_alerts (id, workspace_id, kind, message, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(alert.workspace_id)
        .bind(alert.kind.as_str())
        .bind(&alert.message)
        .bind(&alert.metadata)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}

// ============================================
// Audit log
// ============================================

#[async_trait]
impl AuditStore for Database {
    async fn record(&self, entry: NewAuditEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, workspace_id, action, metadata)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(entry.workspace_id)
        .bind(&entry.action)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}
