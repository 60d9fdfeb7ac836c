// Deployment lifecycle manager
//
// Keeps exactly one active deployment per workspace without transactions:
// 1. Insert the new deployment as `pending`
// 2. Provision and verify its enabled agents
// 3. Incomplete: mark it `failed`, the previous deployment stays active
// 4. Complete: mark it `active`, then mark the previous one `replaced`
//
// Step 4 activates before it replaces, so a crash in between leaves two
// active rows (the newest wins on read) and never zero.
//
// Public entry points never return errors; failures are reported through
// DeployResult with a stable error code.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use teamdeploy_core::{
    apply_customizations, AgentConfig, Customizations, DeployError, Deployment,
    DeploymentStatus, NewDeployment, Stores, TeamConfig,
};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::snapshot::SnapshotBuilder;
use super::verifier::{ProvisioningVerifier, VerificationReport};
use crate::config::DeployConfig;

/// Error code for a deployment whose resources are still incomplete
pub const PROVISIONING_INCOMPLETE: &str = "provisioning_incomplete";

/// Outcome of a deploy or customization request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    pub deployed: bool,
    pub already_deployed: bool,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub deployment_id: Option<Uuid>,
    pub verification: Option<VerificationReport>,
}

impl DeployResult {
    fn verified(deployment_id: Uuid, already_deployed: bool, report: VerificationReport) -> Self {
        if report.complete {
            return Self {
                deployed: true,
                already_deployed,
                error_code: None,
                message: None,
                deployment_id: Some(deployment_id),
                verification: Some(report),
            };
        }

        Self {
            deployed: false,
            already_deployed,
            error_code: Some(PROVISIONING_INCOMPLETE.to_string()),
            message: Some(format!(
                "provisioning incomplete: {}",
                report
                    .issues
                    .iter()
                    .map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            deployment_id: Some(deployment_id),
            verification: Some(report),
        }
    }

    fn from_error(err: &DeployError) -> Self {
        Self {
            deployed: false,
            already_deployed: false,
            error_code: Some(err.code().to_string()),
            message: Some(err.to_string()),
            deployment_id: None,
            verification: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code.is_none()
    }
}

#[derive(Clone)]
pub struct DeploymentService {
    stores: Stores,
    snapshots: SnapshotBuilder,
    verifier: ProvisioningVerifier,
}

impl DeploymentService {
    pub fn new(stores: Stores, config: DeployConfig) -> Self {
        Self {
            snapshots: SnapshotBuilder::new(stores.templates.clone()),
            verifier: ProvisioningVerifier::new(&stores, &config),
            stores,
        }
    }

    /// Deploy the team template linked to `tier` onto the workspace
    pub async fn deploy_for_tier(
        &self,
        workspace_id: Uuid,
        tier: &str,
        created_by: Option<Uuid>,
    ) -> DeployResult {
        let span = tracing::info_span!(
            "deploy_for_tier",
            workspace_id = %workspace_id,
            tier = %tier,
            deployment_id = tracing::field::Empty,
        );

        async {
            let result = match self.resolve_tier(tier).await {
                Ok(template_id) => {
                    self.deploy_template_inner(workspace_id, template_id, created_by)
                        .await
                }
                Err(e) => Err(e),
            };
            Self::finish(workspace_id, result)
        }
        .instrument(span)
        .await
    }

    /// Deploy `template_id` onto the workspace
    pub async fn deploy_template(
        &self,
        workspace_id: Uuid,
        template_id: Uuid,
        created_by: Option<Uuid>,
    ) -> DeployResult {
        let span = tracing::info_span!(
            "deploy_template",
            workspace_id = %workspace_id,
            template_id = %template_id,
            deployment_id = tracing::field::Empty,
        );

        async {
            let result = self
                .deploy_template_inner(workspace_id, template_id, created_by)
                .await;
            Self::finish(workspace_id, result)
        }
        .instrument(span)
        .await
    }

    /// Store new customizations on the active deployment and provision the
    /// agents they enable
    ///
    /// Resources of agents that become disabled stay in place.
    pub async fn apply_customizations(
        &self,
        workspace_id: Uuid,
        customizations: Customizations,
        created_by: Option<Uuid>,
    ) -> DeployResult {
        let span = tracing::info_span!(
            "apply_customizations",
            workspace_id = %workspace_id,
            deployment_id = tracing::field::Empty,
        );

        async {
            let result = self
                .apply_customizations_inner(workspace_id, customizations, created_by)
                .await;
            Self::finish(workspace_id, result)
        }
        .instrument(span)
        .await
    }

    /// Active deployment of the workspace, if any
    pub async fn active_deployment(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<Deployment>, DeployError> {
        Ok(self
            .stores
            .deployments
            .get_active_deployment(workspace_id)
            .await?)
    }

    fn finish(workspace_id: Uuid, result: Result<DeployResult, DeployError>) -> DeployResult {
        match result {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    workspace_id = %workspace_id,
                    code = e.code(),
                    error = %e,
                    "Deployment failed"
                );
                DeployResult::from_error(&e)
            }
        }
    }

    async fn resolve_tier(&self, tier: &str) -> Result<Uuid, DeployError> {
        self.stores
            .templates
            .get_plan(tier)
            .await?
            .and_then(|plan| plan.template_id)
            .ok_or_else(|| DeployError::DeployTargetMissing(tier.to_string()))
    }

    async fn deploy_template_inner(
        &self,
        workspace_id: Uuid,
        template_id: Uuid,
        created_by: Option<Uuid>,
    ) -> Result<DeployResult, DeployError> {
        let span = tracing::Span::current();
        let previous = self
            .stores
            .deployments
            .get_active_deployment(workspace_id)
            .await?;

        if let Some(active) = previous.as_ref().filter(|d| d.source_template_id == template_id) {
            span.record("deployment_id", active.id.to_string().as_str());
            info!(workspace_id = %workspace_id, "Template already deployed, re-verifying");

            let agents = enabled_agents(&active.active_config);
            let report = self
                .verifier
                .provision_and_verify(workspace_id, &agents, created_by)
                .await;
            return Ok(DeployResult::verified(active.id, true, report));
        }

        let base_config = self.snapshots.build(template_id).await?;
        let customizations = Customizations::default();
        let active_config = apply_customizations(&base_config, &customizations).config;

        let deployment = self
            .stores
            .deployments
            .insert_deployment(NewDeployment {
                workspace_id,
                source_template_id: template_id,
                source_version: base_config.version,
                base_config,
                customizations,
                active_config,
                previous_deployment_id: previous.as_ref().map(|d| d.id),
                created_by,
            })
            .await?;
        span.record("deployment_id", deployment.id.to_string().as_str());

        let agents = enabled_agents(&deployment.active_config);
        let report = self
            .verifier
            .provision_and_verify(workspace_id, &agents, created_by)
            .await;

        if !report.complete {
            if let Err(e) = self
                .stores
                .deployments
                .set_deployment_status(deployment.id, DeploymentStatus::Failed)
                .await
            {
                warn!(deployment_id = %deployment.id, error = %e, "Failed to mark deployment failed");
            }
            return Ok(DeployResult::verified(deployment.id, false, report));
        }

        self.stores
            .deployments
            .set_deployment_status(deployment.id, DeploymentStatus::Active)
            .await?;

        if let Some(previous) = previous {
            self.supersede(workspace_id, &previous, &deployment).await;
        }

        info!(
            workspace_id = %workspace_id,
            deployment_id = %deployment.id,
            template_id = %template_id,
            agents = agents.len(),
            "Deployment active"
        );

        Ok(DeployResult::verified(deployment.id, false, report))
    }

    /// Retire the previous deployment after its replacement went active
    async fn supersede(&self, workspace_id: Uuid, previous: &Deployment, current: &Deployment) {
        if let Err(e) = self
            .stores
            .deployments
            .set_deployment_status(previous.id, DeploymentStatus::Replaced)
            .await
        {
            warn!(
                deployment_id = %previous.id,
                error = %e,
                "Failed to mark previous deployment replaced"
            );
        }

        let still_enabled: HashSet<Uuid> = current
            .active_config
            .enabled_agents()
            .map(|a| a.id)
            .collect();
        let superseded: Vec<Uuid> = previous
            .active_config
            .enabled_agents()
            .map(|a| a.id)
            .filter(|id| !still_enabled.contains(id))
            .collect();
        if superseded.is_empty() {
            return;
        }

        match self
            .stores
            .schedules
            .delete_tenant_schedules(workspace_id, &superseded)
            .await
        {
            Ok(deleted) => info!(
                workspace_id = %workspace_id,
                agents = superseded.len(),
                deleted,
                "Removed schedules of superseded agents"
            ),
            Err(e) => warn!(
                workspace_id = %workspace_id,
                error = %e,
                "Failed to remove schedules of superseded agents"
            ),
        }
    }

    async fn apply_customizations_inner(
        &self,
        workspace_id: Uuid,
        customizations: Customizations,
        created_by: Option<Uuid>,
    ) -> Result<DeployResult, DeployError> {
        let deployment = self
            .stores
            .deployments
            .get_active_deployment(workspace_id)
            .await?
            .ok_or(DeployError::DeploymentNotFound(workspace_id))?;
        tracing::Span::current().record("deployment_id", deployment.id.to_string().as_str());

        let outcome = apply_customizations(&deployment.base_config, &customizations);
        for reference in &outcome.ignored {
            warn!(
                workspace_id = %workspace_id,
                reference = ?reference,
                "Customization references nothing in the deployment"
            );
        }

        let updated = self
            .stores
            .deployments
            .update_customizations(deployment.id, &customizations, &outcome.config)
            .await?;
        if !updated {
            return Err(DeployError::DeploymentNotFound(workspace_id));
        }

        let agents = enabled_agents(&outcome.config);
        let report = self
            .verifier
            .provision_and_verify(workspace_id, &agents, created_by)
            .await;

        info!(
            workspace_id = %workspace_id,
            deployment_id = %deployment.id,
            enabled_agents = agents.len(),
            complete = report.complete,
            "Customizations applied"
        );

        Ok(DeployResult::verified(deployment.id, false, report))
    }
}

fn enabled_agents(config: &TeamConfig) -> Vec<AgentConfig> {
    config.enabled_agents().cloned().collect()
}
