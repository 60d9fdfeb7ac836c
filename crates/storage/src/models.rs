// Database models (internal, may differ from core entities)
//
// Rows map 1:1 to table columns. JSON columns are decoded into core types in
// the `TryFrom` conversions below.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use teamdeploy_core::{
    AgentIdentity, AgentStatus, AgentTemplate, Channel, Customizations, DelegationTemplate,
    DeployStatus, Deployment, DeploymentStatus, KnowledgeItem, Schedule, StoreError, TeamConfig,
    TeamTemplate, WorkspaceBilling,
};

// ============================================
// Template catalog
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct TeamTemplateRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub head_agent_id: Option<Uuid>,
    pub current_version: i32,
}

impl From<TeamTemplateRow> for TeamTemplate {
    fn from(row: TeamTemplateRow) -> Self {
        TeamTemplate {
            id: row.id,
            name: row.name,
            slug: row.slug,
            head_agent_id: row.head_agent_id,
            current_version: row.current_version,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AgentTemplateRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_ref: Option<String>,
    pub system_prompt: String,
    pub model: String,
    pub provider: String,
    pub tools: Json<Vec<String>>,
    pub skills: Json<Vec<String>>,
    pub knowledge: Json<Vec<KnowledgeItem>>,
    pub rules: Json<Vec<String>>,
}

impl From<AgentTemplateRow> for AgentTemplate {
    fn from(row: AgentTemplateRow) -> Self {
        AgentTemplate {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            avatar_ref: row.avatar_ref,
            system_prompt: row.system_prompt,
            model: row.model,
            provider: row.provider,
            tools: row.tools.0,
            skills: row.skills.0,
            knowledge: row.knowledge.0,
            rules: row.rules.0,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DelegationTemplateRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub from_agent_id: Uuid,
    pub to_agent_id: Uuid,
    pub condition: Option<String>,
    pub context_template: Option<String>,
}

impl From<DelegationTemplateRow> for DelegationTemplate {
    fn from(row: DelegationTemplateRow) -> Self {
        DelegationTemplate {
            id: row.id,
            template_id: row.template_id,
            from_agent_id: row.from_agent_id,
            to_agent_id: row.to_agent_id,
            condition: row.condition,
            context_template: row.context_template,
        }
    }
}

// ============================================
// Deployments
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct DeploymentRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub source_template_id: Uuid,
    pub source_version: i32,
    pub base_config: Json<TeamConfig>,
    pub customizations: Json<Customizations>,
    pub active_config: Json<TeamConfig>,
    pub status: String,
    pub previous_deployment_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DeploymentRow> for Deployment {
    type Error = StoreError;

    fn try_from(row: DeploymentRow) -> Result<Self, Self::Error> {
        let status: DeploymentStatus = row.status.parse().map_err(StoreError::Serialization)?;
        Ok(Deployment {
            id: row.id,
            workspace_id: row.workspace_id,
            source_template_id: row.source_template_id,
            source_version: row.source_version,
            base_config: row.base_config.0,
            customizations: row.customizations.0,
            active_config: row.active_config.0,
            status,
            previous_deployment_id: row.previous_deployment_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================
// Schedules
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub prompt: String,
    pub cron_expression: String,
    pub timezone: Option<String>,
    pub is_template: bool,
    pub is_enabled: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Schedule {
            id: row.id,
            agent_id: row.agent_id,
            workspace_id: row.workspace_id,
            name: row.name,
            prompt: row.prompt,
            cron_expression: row.cron_expression,
            timezone: row.timezone,
            is_template: row.is_template,
            is_enabled: row.is_enabled,
            next_run_at: row.next_run_at,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

// ============================================
// Workspace resources
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct AgentIdentityRow {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub workspace_id: Uuid,
    pub address: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<AgentIdentityRow> for AgentIdentity {
    fn from(row: AgentIdentityRow) -> Self {
        AgentIdentity {
            id: row.id,
            agent_id: row.agent_id,
            workspace_id: row.workspace_id,
            address: row.address,
            display_name: row.display_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.id,
            workspace_id: row.workspace_id,
            name: row.name,
            agent_id: row.agent_id,
            created_at: row.created_at,
        }
    }
}

// ============================================
// Billing
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct WorkspaceBillingRow {
    pub workspace_id: Uuid,
    pub agent_tier: Option<String>,
    pub agent_tier_pending: Option<String>,
    pub agent_tier_pending_effective_at: Option<DateTime<Utc>>,
    pub agent_status: String,
    pub agent_deploy_status: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkspaceBillingRow> for WorkspaceBilling {
    fn from(row: WorkspaceBillingRow) -> Self {
        WorkspaceBilling {
            workspace_id: row.workspace_id,
            agent_tier: row.agent_tier,
            agent_tier_pending: row.agent_tier_pending,
            agent_tier_pending_effective_at: row.agent_tier_pending_effective_at,
            agent_status: AgentStatus::from(row.agent_status.as_str()),
            agent_deploy_status: row.agent_deploy_status.as_deref().and_then(DeployStatus::parse),
            updated_at: row.updated_at,
        }
    }
}

/// Billing fields written by the payment integration
#[derive(Debug, Clone)]
pub struct UpsertWorkspaceBilling {
    pub workspace_id: Uuid,
    pub agent_tier: Option<String>,
    pub agent_tier_pending: Option<String>,
    pub agent_tier_pending_effective_at: Option<DateTime<Utc>>,
    pub agent_status: AgentStatus,
}
