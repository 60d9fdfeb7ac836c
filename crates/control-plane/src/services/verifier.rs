// Provisioning verifier
//
// Runs the provisioner and cloner, counts what the deploying agents ended up
// with, and retries the whole pass when something is missing. A workspace that is
// still incomplete after the retries gets one audit record; the result is
// returned as data.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use teamdeploy_core::audit::actions;
use teamdeploy_core::{
    provisioning_issues, AgentConfig, AuditStore, NewAuditEntry, ProvisioningIssue,
    ResourceCounts, ResourceStore, ScheduleStore, StoreResult, Stores,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::cloner::{CloneReport, ScheduleCloner};
use super::provisioner::{ProvisionSummary, ResourceProvisioner};
use crate::config::DeployConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub complete: bool,
    /// Provisioning passes run, including the first
    pub attempts: u32,
    pub expected_agents: u64,
    pub counts: ResourceCounts,
    pub issues: Vec<ProvisioningIssue>,
    /// Slugs of enabled agents with no schedule template at all
    pub agents_without_templates: Vec<String>,
    /// Cloner result of the last pass
    pub schedules: CloneReport,
    /// Slugs whose provisioning failed in the last pass
    pub failed_agents: Vec<String>,
}

#[derive(Clone)]
pub struct ProvisioningVerifier {
    provisioner: ResourceProvisioner,
    cloner: ScheduleCloner,
    resources: Arc<dyn ResourceStore>,
    schedules: Arc<dyn ScheduleStore>,
    audit: Arc<dyn AuditStore>,
    retries: u32,
}

impl ProvisioningVerifier {
    pub fn new(stores: &Stores, config: &DeployConfig) -> Self {
        Self {
            provisioner: ResourceProvisioner::new(stores.resources.clone(), config),
            cloner: ScheduleCloner::new(stores.schedules.clone(), config.clone()),
            resources: stores.resources.clone(),
            schedules: stores.schedules.clone(),
            audit: stores.audit.clone(),
            retries: config.verify_retries,
        }
    }

    /// Provision `agents` in `workspace_id` and check the result
    pub async fn provision_and_verify(
        &self,
        workspace_id: Uuid,
        agents: &[AgentConfig],
        created_by: Option<Uuid>,
    ) -> VerificationReport {
        let expected_agents = agents.len() as u64;
        let agent_ids: Vec<Uuid> = agents.iter().map(|a| a.id).collect();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let (summary, schedules) = self
                .run_pass(workspace_id, agents, &agent_ids, created_by)
                .await;
            let counts = self.count(workspace_id, &agent_ids).await;
            let issues = provisioning_issues(expected_agents, &counts);

            let failed_agents: Vec<String> = summary.failed().map(|o| o.slug.clone()).collect();
            let mut report = VerificationReport {
                complete: issues.is_empty(),
                attempts,
                expected_agents,
                counts,
                issues,
                agents_without_templates: Vec::new(),
                schedules,
                failed_agents,
            };

            if report.complete {
                return report;
            }
            if attempts > self.retries {
                report.agents_without_templates = self.agents_without_templates(agents).await;
                self.record_incomplete(workspace_id, &report).await;
                return report;
            }

            info!(
                workspace_id = %workspace_id,
                attempt = attempts,
                issues = ?report.issues,
                "Provisioning incomplete, retrying"
            );
        }
    }

    async fn run_pass(
        &self,
        workspace_id: Uuid,
        agents: &[AgentConfig],
        agent_ids: &[Uuid],
        created_by: Option<Uuid>,
    ) -> (ProvisionSummary, CloneReport) {
        let summary = self.provisioner.provision_all(workspace_id, agents, created_by).await;
        let schedules = match self.cloner.clone_templates(workspace_id, agent_ids, created_by).await {
            Ok(report) => report,
            Err(e) => {
                warn!(workspace_id = %workspace_id, error = %e, "Schedule cloning failed");
                CloneReport::default()
            }
        };
        (summary, schedules)
    }

    /// Counts restricted to `agent_ids`, so leftovers of a previous team never
    /// stand in for agents of this one. A failed count reads as zero.
    async fn count(&self, workspace_id: Uuid, agent_ids: &[Uuid]) -> ResourceCounts {
        let profiles = self
            .resources
            .count_agent_identities(workspace_id, agent_ids)
            .await;
        let channels = self.resources.count_channels(workspace_id, agent_ids).await;
        let schedules = self
            .schedules
            .count_tenant_schedules(workspace_id, agent_ids)
            .await;

        ResourceCounts {
            profiles: or_zero(workspace_id, "profiles", profiles),
            channels: or_zero(workspace_id, "channels", channels),
            schedules: or_zero(workspace_id, "schedules", schedules),
        }
    }

    async fn agents_without_templates(&self, agents: &[AgentConfig]) -> Vec<String> {
        let agent_ids: Vec<Uuid> = agents.iter().map(|a| a.id).collect();
        match self.schedules.list_template_schedules(&agent_ids).await {
            Ok(templates) => {
                let covered: HashSet<Uuid> = templates.iter().map(|t| t.agent_id).collect();
                agents
                    .iter()
                    .filter(|a| !covered.contains(&a.id))
                    .map(|a| a.slug.clone())
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "Could not list schedule templates");
                Vec::new()
            }
        }
    }

    async fn record_incomplete(&self, workspace_id: Uuid, report: &VerificationReport) {
        warn!(
            workspace_id = %workspace_id,
            expected = report.expected_agents,
            profiles = report.counts.profiles,
            channels = report.counts.channels,
            schedules = report.counts.schedules,
            issues = ?report.issues,
            "Provisioning still incomplete after retries"
        );

        let entry = NewAuditEntry {
            workspace_id,
            action: actions::PROVISIONING_INCOMPLETE.to_string(),
            metadata: json!({
                "expected": {
                    "profiles": report.expected_agents,
                    "channels": report.expected_agents,
                },
                "actual": report.counts,
                "issues": report.issues,
                "agents_without_templates": report.agents_without_templates,
                "failed_agents": report.failed_agents,
                "attempts": report.attempts,
            }),
        };
        if let Err(e) = self.audit.record(entry).await {
            warn!(workspace_id = %workspace_id, error = %e, "Failed to write audit entry");
        }
    }
}

fn or_zero(workspace_id: Uuid, what: &str, result: StoreResult<u64>) -> u64 {
    result.unwrap_or_else(|e| {
        warn!(workspace_id = %workspace_id, count = what, error = %e, "Count failed");
        0
    })
}
