// Pending-tier CAS and reconciliation tests

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{seed_team, Fixture};
use teamdeploy_control_plane::PendingTierService;
use teamdeploy_core::{
    AgentStatus, BillingStore, DeployStatus, DeploymentStore, NewBillingAlert, PendingTier,
    StoreResult, WorkspaceBilling,
};
use teamdeploy_storage::InMemoryDatabase;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Billing store that holds every reader until two have read, so both
/// callers see the same pending tier before either can claim it
struct LockstepReads {
    inner: Arc<InMemoryDatabase>,
    barrier: Barrier,
}

#[async_trait]
impl BillingStore for LockstepReads {
    async fn get_billing(&self, workspace_id: Uuid) -> StoreResult<Option<WorkspaceBilling>> {
        let billing = self.inner.get_billing(workspace_id).await;
        self.barrier.wait().await;
        billing
    }

    async fn list_due_pending_tiers(&self, now: DateTime<Utc>) -> StoreResult<Vec<PendingTier>> {
        self.inner.list_due_pending_tiers(now).await
    }

    async fn claim_pending_tier(
        &self,
        workspace_id: Uuid,
        expected_pending: &str,
    ) -> StoreResult<bool> {
        self.inner
            .claim_pending_tier(workspace_id, expected_pending)
            .await
    }

    async fn set_deploy_status(&self, workspace_id: Uuid, status: DeployStatus) -> StoreResult<()> {
        self.inner.set_deploy_status(workspace_id, status).await
    }

    async fn record_alert(&self, alert: NewBillingAlert) -> StoreResult<()> {
        self.inner.record_alert(alert).await
    }
}

#[tokio::test]
async fn test_concurrent_apply_commits_once() {
    let fx = Fixture::new();
    let team = seed_team(&fx.db, "teams", &["researcher", "writer"]);
    fx.link_plan("teams", Some(team.template_id));
    fx.set_billing(fx.workspace_id, Some("teams"), None, AgentStatus::Active);

    let billing = Arc::new(LockstepReads {
        inner: fx.db.clone(),
        barrier: Barrier::new(2),
    });
    let tiers = PendingTierService::new(billing, fx.deployments());

    let (a, b) = tokio::join!(
        tiers.apply_pending_tier(fx.workspace_id, None),
        tiers.apply_pending_tier(fx.workspace_id, Some("teams")),
    );

    let results = [a, b];
    let applied: Vec<_> = results.iter().filter(|r| r.applied).collect();
    let conflicted: Vec<_> = results
        .iter()
        .filter(|r| r.error_code.as_deref() == Some("cas_conflict"))
        .collect();
    assert_eq!(applied.len(), 1, "results: {results:?}");
    assert_eq!(conflicted.len(), 1, "results: {results:?}");
    assert_eq!(applied[0].tier.as_deref(), Some("teams"));
    assert!(applied[0].deploy_error.is_none());

    let stored = fx.db.get_billing(fx.workspace_id).await.unwrap().unwrap();
    assert_eq!(stored.agent_tier.as_deref(), Some("teams"));
    assert!(stored.agent_tier_pending.is_none());
    assert_eq!(stored.agent_deploy_status, Some(DeployStatus::Deployed));
    assert_eq!(fx.db.list_deployments(fx.workspace_id).len(), 1);
}

#[tokio::test]
async fn test_apply_deploys_and_marks_deployed() {
    let fx = Fixture::new();
    let team = seed_team(&fx.db, "teams", &["researcher"]);
    fx.link_plan("teams", Some(team.template_id));
    fx.set_billing(fx.workspace_id, Some("teams"), None, AgentStatus::Active);

    let result = fx.tiers().apply_pending_tier(fx.workspace_id, None).await;

    assert!(result.applied);
    let deploy = result.deploy.unwrap();
    assert!(deploy.deployed);
    let active = fx
        .db
        .get_active_deployment(fx.workspace_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deploy.deployment_id, Some(active.id));
    assert!(fx.db.billing_alerts(fx.workspace_id).is_empty());
}

#[tokio::test]
async fn test_deploy_failure_keeps_tier_and_raises_alert() {
    let fx = Fixture::new();
    fx.link_plan("teams", None);
    fx.set_billing(fx.workspace_id, Some("teams"), None, AgentStatus::Active);

    let result = fx.tiers().apply_pending_tier(fx.workspace_id, None).await;

    assert!(result.applied);
    assert!(result.deploy_error.is_some());
    assert_eq!(
        result.deploy.unwrap().error_code.as_deref(),
        Some("deploy_target_missing")
    );

    let stored = fx.db.get_billing(fx.workspace_id).await.unwrap().unwrap();
    assert_eq!(stored.agent_tier.as_deref(), Some("teams"));
    assert!(stored.agent_tier_pending.is_none());
    assert_eq!(stored.agent_deploy_status, Some(DeployStatus::Failed));

    let alerts = fx.db.billing_alerts(fx.workspace_id);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, "deploy_failed");
    assert_eq!(alerts[0].metadata["error_code"], "deploy_target_missing");
}

#[tokio::test]
async fn test_apply_rejections() {
    let fx = Fixture::new();
    let tiers = fx.tiers();

    let unknown = tiers.apply_pending_tier(Uuid::now_v7(), None).await;
    assert!(!unknown.applied);
    assert_eq!(unknown.error_code.as_deref(), Some("workspace_not_found"));

    fx.set_billing(fx.workspace_id, None, None, AgentStatus::Active);
    let nothing = tiers.apply_pending_tier(fx.workspace_id, None).await;
    assert_eq!(nothing.error_code.as_deref(), Some("no_pending_tier"));

    fx.set_billing(fx.workspace_id, Some("teams"), None, AgentStatus::Active);
    let mismatch = tiers
        .apply_pending_tier(fx.workspace_id, Some("enterprise"))
        .await;
    assert_eq!(mismatch.error_code.as_deref(), Some("pending_mismatch"));

    fx.set_billing(fx.workspace_id, Some("teams"), None, AgentStatus::PastDue);
    let inactive = tiers.apply_pending_tier(fx.workspace_id, None).await;
    assert_eq!(inactive.error_code.as_deref(), Some("agent_inactive"));

    // None of the rejections consumed the pending tier
    let stored = fx.db.get_billing(fx.workspace_id).await.unwrap().unwrap();
    assert_eq!(stored.agent_tier_pending.as_deref(), Some("teams"));
    assert_eq!(stored.agent_tier.as_deref(), Some("starter"));
    assert!(stored.agent_deploy_status.is_none());
}

#[tokio::test]
async fn test_reconcile_applies_only_due_changes() {
    let fx = Fixture::new();
    let team = seed_team(&fx.db, "teams", &["researcher"]);
    fx.link_plan("teams", Some(team.template_id));

    let now = Utc::now();
    let due = Uuid::now_v7();
    let immediate = Uuid::now_v7();
    let later = Uuid::now_v7();
    fx.set_billing(due, Some("teams"), Some(now - Duration::hours(1)), AgentStatus::Active);
    fx.set_billing(immediate, Some("teams"), None, AgentStatus::Active);
    fx.set_billing(later, Some("teams"), Some(now + Duration::days(3)), AgentStatus::Active);

    let report = fx.tiers().reconcile_due(now).await.unwrap();

    assert_eq!(report.due, 2);
    assert_eq!(report.applied, 2);
    assert_eq!(report.deploy_failures, 0);
    assert_eq!(report.conflicts, 0);

    for workspace_id in [due, immediate] {
        let stored = fx.db.get_billing(workspace_id).await.unwrap().unwrap();
        assert_eq!(stored.agent_tier.as_deref(), Some("teams"));
        assert!(fx
            .db
            .get_active_deployment(workspace_id)
            .await
            .unwrap()
            .is_some());
    }

    let untouched = fx.db.get_billing(later).await.unwrap().unwrap();
    assert_eq!(untouched.agent_tier_pending.as_deref(), Some("teams"));
}

#[tokio::test]
async fn test_reconcile_continues_after_rejection() {
    let fx = Fixture::new();
    let team = seed_team(&fx.db, "teams", &["researcher"]);
    fx.link_plan("teams", Some(team.template_id));

    let canceled = Uuid::now_v7();
    let active = Uuid::now_v7();
    fx.set_billing(canceled, Some("teams"), None, AgentStatus::Canceled);
    fx.set_billing(active, Some("teams"), None, AgentStatus::Active);

    let report = fx.tiers().reconcile_due(Utc::now()).await.unwrap();

    assert_eq!(report.due, 2);
    assert_eq!(report.applied, 1);
    assert_eq!(report.rejected, 1);
    let rejected = report
        .results
        .iter()
        .find(|r| r.workspace_id == canceled)
        .unwrap();
    assert_eq!(rejected.error_code.as_deref(), Some("agent_inactive"));
}
