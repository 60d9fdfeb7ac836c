// Pending-tier applier
//
// A billing cron job and an inbound webhook may both try to apply the same
// queued tier change. The only guard is one conditional update:
//   UPDATE ... SET agent_tier = $pending, pending = NULL
//   WHERE agent_tier_pending = $pending
// Whoever affects the row owns the change and triggers the deployment; the
// other caller gets `cas_conflict`. The tier stays committed even when the
// deployment fails afterwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use teamdeploy_core::{
    AgentStatus, BillingAlertKind, BillingStore, DeployStatus, NewBillingAlert, StoreError,
    StoreResult,
};
use thiserror::Error;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::lifecycle::{DeployResult, DeploymentService};

/// Reasons a pending tier was not applied
#[derive(Debug, Error)]
pub enum TierError {
    #[error("workspace {0} has no billing record")]
    WorkspaceNotFound(Uuid),

    #[error("no pending tier change")]
    NoPendingTier,

    #[error("pending tier is '{actual}', expected '{expected}'")]
    PendingMismatch { expected: String, actual: String },

    #[error("agent subscription is {0}")]
    AgentInactive(String),

    #[error("pending tier '{0}' was already applied by another caller")]
    CasConflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TierError {
    pub fn code(&self) -> &'static str {
        match self {
            TierError::WorkspaceNotFound(_) => "workspace_not_found",
            TierError::NoPendingTier => "no_pending_tier",
            TierError::PendingMismatch { .. } => "pending_mismatch",
            TierError::AgentInactive(_) => "agent_inactive",
            TierError::CasConflict(_) => "cas_conflict",
            TierError::Store(_) => "store_error",
        }
    }
}

/// Outcome of one apply attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyTierResult {
    pub workspace_id: Uuid,
    /// The pending tier was committed by this call
    pub applied: bool,
    pub tier: Option<String>,
    pub error_code: Option<String>,
    pub message: Option<String>,
    /// Deployment triggered after a successful claim
    pub deploy: Option<DeployResult>,
    /// Set when the tier was committed but its deployment failed
    pub deploy_error: Option<String>,
}

impl ApplyTierResult {
    fn rejected(workspace_id: Uuid, err: &TierError) -> Self {
        Self {
            workspace_id,
            applied: false,
            tier: None,
            error_code: Some(err.code().to_string()),
            message: Some(err.to_string()),
            deploy: None,
            deploy_error: None,
        }
    }
}

/// Totals of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub due: usize,
    pub applied: usize,
    pub deploy_failures: usize,
    pub conflicts: usize,
    pub rejected: usize,
    pub results: Vec<ApplyTierResult>,
}

#[derive(Clone)]
pub struct PendingTierService {
    billing: Arc<dyn BillingStore>,
    deployments: DeploymentService,
}

impl PendingTierService {
    pub fn new(billing: Arc<dyn BillingStore>, deployments: DeploymentService) -> Self {
        Self {
            billing,
            deployments,
        }
    }

    /// Claim the workspace's pending tier and deploy it
    ///
    /// With `expected` set, the call only proceeds when the pending tier
    /// still equals it.
    pub async fn apply_pending_tier(
        &self,
        workspace_id: Uuid,
        expected: Option<&str>,
    ) -> ApplyTierResult {
        let span = tracing::info_span!(
            "apply_pending_tier",
            workspace_id = %workspace_id,
            expected = expected.unwrap_or(""),
        );

        async {
            let tier = match self.claim(workspace_id, expected).await {
                Ok(tier) => tier,
                Err(e) => {
                    info!(
                        workspace_id = %workspace_id,
                        code = e.code(),
                        "Pending tier not applied"
                    );
                    return ApplyTierResult::rejected(workspace_id, &e);
                }
            };

            info!(workspace_id = %workspace_id, tier = %tier, "Pending tier committed");
            self.deploy(workspace_id, tier).await
        }
        .instrument(span)
        .await
    }

    /// Apply every pending tier whose effective time has passed
    pub async fn reconcile_due(&self, now: DateTime<Utc>) -> StoreResult<ReconcileReport> {
        let due = self.billing.list_due_pending_tiers(now).await?;
        let mut report = ReconcileReport {
            due: due.len(),
            ..Default::default()
        };

        for pending in due {
            let result = self
                .apply_pending_tier(pending.workspace_id, Some(&pending.tier))
                .await;

            if result.applied {
                report.applied += 1;
                if result.deploy_error.is_some() {
                    report.deploy_failures += 1;
                }
            } else if result.error_code.as_deref() == Some("cas_conflict") {
                report.conflicts += 1;
            } else {
                report.rejected += 1;
            }
            report.results.push(result);
        }

        if report.due > 0 {
            info!(
                due = report.due,
                applied = report.applied,
                deploy_failures = report.deploy_failures,
                conflicts = report.conflicts,
                rejected = report.rejected,
                "Tier reconciliation pass finished"
            );
        }

        Ok(report)
    }

    async fn claim(&self, workspace_id: Uuid, expected: Option<&str>) -> Result<String, TierError> {
        let billing = self
            .billing
            .get_billing(workspace_id)
            .await?
            .ok_or(TierError::WorkspaceNotFound(workspace_id))?;

        let pending = billing.agent_tier_pending.ok_or(TierError::NoPendingTier)?;
        if let Some(expected) = expected {
            if expected != pending {
                return Err(TierError::PendingMismatch {
                    expected: expected.to_string(),
                    actual: pending,
                });
            }
        }
        if billing.agent_status != AgentStatus::Active {
            return Err(TierError::AgentInactive(
                billing.agent_status.as_str().to_string(),
            ));
        }

        if !self.billing.claim_pending_tier(workspace_id, &pending).await? {
            return Err(TierError::CasConflict(pending));
        }
        Ok(pending)
    }

    async fn deploy(&self, workspace_id: Uuid, tier: String) -> ApplyTierResult {
        self.set_deploy_status(workspace_id, DeployStatus::Deploying).await;

        let deploy = self
            .deployments
            .deploy_for_tier(workspace_id, &tier, None)
            .await;

        let deploy_error = if deploy.is_success() {
            self.set_deploy_status(workspace_id, DeployStatus::Deployed).await;
            None
        } else {
            self.set_deploy_status(workspace_id, DeployStatus::Failed).await;
            let detail = deploy
                .message
                .clone()
                .or_else(|| deploy.error_code.clone())
                .unwrap_or_else(|| "deployment failed".to_string());
            self.raise_alert(workspace_id, &tier, &deploy, &detail).await;
            Some(detail)
        };

        ApplyTierResult {
            workspace_id,
            applied: true,
            tier: Some(tier),
            error_code: None,
            message: None,
            deploy: Some(deploy),
            deploy_error,
        }
    }

    async fn set_deploy_status(&self, workspace_id: Uuid, status: DeployStatus) {
        if let Err(e) = self.billing.set_deploy_status(workspace_id, status).await {
            warn!(
                workspace_id = %workspace_id,
                status = status.as_str(),
                error = %e,
                "Failed to update deploy status"
            );
        }
    }

    async fn raise_alert(
        &self,
        workspace_id: Uuid,
        tier: &str,
        deploy: &DeployResult,
        detail: &str,
    ) {
        warn!(
            workspace_id = %workspace_id,
            tier = %tier,
            code = deploy.error_code.as_deref().unwrap_or(""),
            "Deployment after tier change failed"
        );

        let alert = NewBillingAlert {
            workspace_id,
            kind: BillingAlertKind::DeployFailed,
            message: format!("Deployment for tier '{tier}' failed: {detail}"),
            metadata: json!({
                "tier": tier,
                "error_code": deploy.error_code,
                "deployment_id": deploy.deployment_id,
            }),
        };
        if let Err(e) = self.billing.record_alert(alert).await {
            warn!(workspace_id = %workspace_id, error = %e, "Failed to record billing alert");
        }
    }
}
