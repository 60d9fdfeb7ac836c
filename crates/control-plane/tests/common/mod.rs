// Shared fixtures for control-plane integration tests
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use teamdeploy_control_plane::{DeployConfig, DeploymentService, PendingTierService};
use teamdeploy_core::{
    AgentConfig, AgentStatus, AgentTemplate, DelegationTemplate, KnowledgeItem, NewSchedule, Plan,
    Stores, TeamTemplate,
};
use teamdeploy_storage::{InMemoryDatabase, UpsertWorkspaceBilling};
use uuid::Uuid;

pub struct Fixture {
    pub db: Arc<InMemoryDatabase>,
    pub stores: Stores,
    pub workspace_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        let stores = Stores::from_backend(db.clone());
        Self {
            db,
            stores,
            workspace_id: Uuid::now_v7(),
        }
    }

    pub fn deployments(&self) -> DeploymentService {
        DeploymentService::new(self.stores.clone(), DeployConfig::default())
    }

    pub fn deployments_with(&self, stores: Stores) -> DeploymentService {
        DeploymentService::new(stores, DeployConfig::default())
    }

    pub fn tiers(&self) -> PendingTierService {
        PendingTierService::new(self.stores.billing.clone(), self.deployments())
    }

    pub fn link_plan(&self, tier: &str, template_id: Option<Uuid>) {
        self.db.upsert_plan(&Plan {
            tier: tier.to_string(),
            template_id,
        });
    }

    pub fn set_billing(
        &self,
        workspace_id: Uuid,
        pending: Option<&str>,
        effective_at: Option<DateTime<Utc>>,
        status: AgentStatus,
    ) {
        self.db.upsert_workspace_billing(UpsertWorkspaceBilling {
            workspace_id,
            agent_tier: Some("starter".to_string()),
            agent_tier_pending: pending.map(str::to_string),
            agent_tier_pending_effective_at: effective_at,
            agent_status: status,
        });
    }
}

/// A seeded team template
pub struct Team {
    pub template_id: Uuid,
    pub agents: Vec<AgentTemplate>,
}

impl Team {
    pub fn agent(&self, slug: &str) -> &AgentTemplate {
        self.agents
            .iter()
            .find(|a| a.slug == slug)
            .unwrap_or_else(|| panic!("no agent {slug}"))
    }

    pub fn agent_id(&self, slug: &str) -> Uuid {
        self.agent(slug).id
    }
}

pub fn agent_template(slug: &str) -> AgentTemplate {
    AgentTemplate {
        id: Uuid::now_v7(),
        slug: slug.to_string(),
        name: format!("{} agent", slug),
        description: Some(format!("Handles {slug} work")),
        avatar_ref: None,
        system_prompt: format!("You are the {slug}."),
        model: "claude-sonnet".to_string(),
        provider: "anthropic".to_string(),
        tools: vec!["web_search".to_string()],
        skills: vec![],
        knowledge: vec![KnowledgeItem::new("Style", "Be brief.")],
        rules: vec![],
    }
}

pub fn agent_config(slug: &str) -> AgentConfig {
    AgentConfig::from(agent_template(slug))
}

pub fn template_schedule(agent_id: Uuid, name: &str, cron: &str) -> NewSchedule {
    NewSchedule {
        agent_id,
        workspace_id: None,
        name: name.to_string(),
        prompt: format!("Run {name}"),
        cron_expression: cron.to_string(),
        timezone: None,
        is_template: true,
        is_enabled: true,
        next_run_at: None,
        created_by: None,
    }
}

pub fn tenant_schedule(agent_id: Uuid, workspace_id: Uuid, name: &str, cron: &str) -> NewSchedule {
    NewSchedule {
        workspace_id: Some(workspace_id),
        is_template: false,
        ..template_schedule(agent_id, name, cron)
    }
}

/// Seed a team whose agents each own one "Daily Summary" template schedule
pub fn seed_team(db: &InMemoryDatabase, slug: &str, agent_slugs: &[&str]) -> Team {
    let team = seed_team_without_schedules(db, slug, agent_slugs);
    for agent in &team.agents {
        db.insert_template_schedule(template_schedule(agent.id, "Daily Summary", "0 9 * * *"));
    }
    team
}

pub fn seed_team_without_schedules(db: &InMemoryDatabase, slug: &str, agent_slugs: &[&str]) -> Team {
    let template_id = Uuid::now_v7();
    let agents: Vec<AgentTemplate> = agent_slugs.iter().map(|s| agent_template(s)).collect();

    db.insert_team_template(TeamTemplate {
        id: template_id,
        name: format!("{slug} team"),
        slug: slug.to_string(),
        head_agent_id: agents.first().map(|a| a.id),
        current_version: 1,
    });
    for (position, agent) in agents.iter().enumerate() {
        db.insert_agent_template(agent.clone());
        db.link_team_agent(template_id, agent.id, position as i32);
    }
    if let [first, second, ..] = agents.as_slice() {
        db.insert_delegation(DelegationTemplate {
            id: Uuid::now_v7(),
            template_id,
            from_agent_id: first.id,
            to_agent_id: second.id,
            condition: Some("needs a draft".to_string()),
            context_template: None,
        });
    }
    db.add_shared_knowledge(template_id, KnowledgeItem::new("Company", "Acme builds rockets."));

    Team {
        template_id,
        agents,
    }
}
