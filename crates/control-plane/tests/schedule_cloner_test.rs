// Schedule cloner tests against the in-memory backend

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{template_schedule, tenant_schedule, Fixture};
use teamdeploy_control_plane::services::ScheduleCloner;
use teamdeploy_control_plane::DeployConfig;
use teamdeploy_core::{NewSchedule, Schedule, ScheduleStore, StoreResult};
use teamdeploy_storage::InMemoryDatabase;
use uuid::Uuid;

/// Schedule store whose tenant listing is always empty, like a read that
/// raced a concurrent clone
struct StaleTenantReads {
    inner: Arc<InMemoryDatabase>,
}

#[async_trait]
impl ScheduleStore for StaleTenantReads {
    async fn list_template_schedules(&self, agent_ids: &[Uuid]) -> StoreResult<Vec<Schedule>> {
        self.inner.list_template_schedules(agent_ids).await
    }

    async fn list_tenant_schedules(
        &self,
        _workspace_id: Uuid,
        _agent_ids: &[Uuid],
    ) -> StoreResult<Vec<Schedule>> {
        Ok(Vec::new())
    }

    async fn insert_schedules(&self, rows: &[NewSchedule]) -> StoreResult<u64> {
        self.inner.insert_schedules(rows).await
    }

    async fn insert_schedule(&self, row: &NewSchedule) -> StoreResult<Schedule> {
        self.inner.insert_schedule(row).await
    }

    async fn delete_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        self.inner.delete_tenant_schedules(workspace_id, agent_ids).await
    }

    async fn count_tenant_schedules(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
    ) -> StoreResult<u64> {
        self.inner
            .count_tenant_schedules(workspace_id, agent_ids)
            .await
    }
}

fn cloner(fx: &Fixture) -> ScheduleCloner {
    ScheduleCloner::new(fx.stores.schedules.clone(), DeployConfig::default())
}

#[tokio::test]
async fn test_duplicate_templates_clone_once() {
    let fx = Fixture::new();
    let a1 = Uuid::now_v7();
    fx.db
        .insert_template_schedule(template_schedule(a1, "Daily Summary", "0 9 * * *"));
    fx.db
        .insert_template_schedule(template_schedule(a1, "Daily Summary", "0 17 * * *"));

    let report = cloner(&fx)
        .clone_templates(fx.workspace_id, &[a1], None)
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    let rows = fx.db.workspace_schedules(fx.workspace_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cron_expression, "0 9 * * *");
    assert!(!rows[0].is_template);
    assert!(rows[0].next_run_at.is_some());
}

#[tokio::test]
async fn test_second_pass_creates_nothing() {
    let fx = Fixture::new();
    let a1 = Uuid::now_v7();
    let a2 = Uuid::now_v7();
    fx.db
        .insert_template_schedule(template_schedule(a1, "Daily Summary", "0 9 * * *"));
    fx.db
        .insert_template_schedule(template_schedule(a2, "Weekly Review", "0 9 * * 1"));
    let cloner = cloner(&fx);

    let first = cloner
        .clone_templates(fx.workspace_id, &[a1, a2], None)
        .await
        .unwrap();
    let second = cloner
        .clone_templates(fx.workspace_id, &[a1, a2], None)
        .await
        .unwrap();

    assert_eq!(first.created, 2);
    assert_eq!(second.created, 0);
    assert_eq!(second.already_present, 2);
    assert_eq!(fx.db.workspace_schedules(fx.workspace_id).len(), 2);
}

#[tokio::test]
async fn test_batch_conflict_falls_back_to_row_inserts() {
    let fx = Fixture::new();
    let a1 = Uuid::now_v7();
    fx.db
        .insert_template_schedule(template_schedule(a1, "Daily Summary", "0 9 * * *"));
    fx.db
        .insert_template_schedule(template_schedule(a1, "Inbox Sweep", "*/15 * * * *"));

    // A concurrent clone already inserted one of the two rows
    fx.db
        .insert_schedule(&tenant_schedule(a1, fx.workspace_id, "Daily Summary", "0 9 * * *"))
        .await
        .unwrap();

    let stale = ScheduleCloner::new(
        Arc::new(StaleTenantReads {
            inner: fx.db.clone(),
        }),
        DeployConfig::default(),
    );
    let report = stale
        .clone_templates(fx.workspace_id, &[a1], None)
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.failed, 0);

    let mut names: Vec<String> = fx
        .db
        .workspace_schedules(fx.workspace_id)
        .into_iter()
        .map(|s| s.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Daily Summary", "Inbox Sweep"]);
}

#[tokio::test]
async fn test_unparsable_cron_leaves_next_run_unset() {
    let fx = Fixture::new();
    let a1 = Uuid::now_v7();
    fx.db
        .insert_template_schedule(template_schedule(a1, "Broken", "every morning"));

    let report = cloner(&fx)
        .clone_templates(fx.workspace_id, &[a1], None)
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    let rows = fx.db.workspace_schedules(fx.workspace_id);
    assert!(rows[0].next_run_at.is_none());
}

#[tokio::test]
async fn test_template_timezone_is_kept() {
    let fx = Fixture::new();
    let a1 = Uuid::now_v7();
    fx.db.insert_template_schedule(NewSchedule {
        timezone: Some("America/New_York".to_string()),
        ..template_schedule(a1, "Standup Notes", "30 8 * * 1-5")
    });
    let creator = Uuid::now_v7();

    cloner(&fx)
        .clone_templates(fx.workspace_id, &[a1], Some(creator))
        .await
        .unwrap();

    let rows = fx.db.workspace_schedules(fx.workspace_id);
    assert_eq!(rows[0].timezone.as_deref(), Some("America/New_York"));
    assert_eq!(rows[0].created_by, Some(creator));
    assert!(rows[0].next_run_at.is_some());
}

#[tokio::test]
async fn test_clone_stores_default_timezone() {
    let fx = Fixture::new();
    let a1 = Uuid::now_v7();
    fx.db
        .insert_template_schedule(template_schedule(a1, "Daily Summary", "0 9 * * *"));
    let config = DeployConfig {
        default_timezone: "Europe/Berlin".to_string(),
        ..Default::default()
    };

    ScheduleCloner::new(fx.stores.schedules.clone(), config)
        .clone_templates(fx.workspace_id, &[a1], None)
        .await
        .unwrap();

    let rows = fx.db.workspace_schedules(fx.workspace_id);
    assert_eq!(rows[0].timezone.as_deref(), Some("Europe/Berlin"));
    assert!(rows[0].next_run_at.is_some());

    // The template row itself is left as it was
    let templates = fx.db.list_template_schedules(&[a1]).await.unwrap();
    assert!(templates[0].timezone.is_none());
}

#[tokio::test]
async fn test_small_batches_insert_everything() {
    let fx = Fixture::new();
    let agents: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();
    for agent_id in &agents {
        fx.db
            .insert_template_schedule(template_schedule(*agent_id, "Daily Summary", "0 9 * * *"));
    }
    let config = DeployConfig {
        schedule_batch_size: 1,
        ..Default::default()
    };

    let report = ScheduleCloner::new(fx.stores.schedules.clone(), config)
        .clone_templates(fx.workspace_id, &agents, None)
        .await
        .unwrap();

    assert_eq!(report.created, 3);
    assert_eq!(
        fx.db
            .count_tenant_schedules(fx.workspace_id, &agents)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_other_workspaces_are_independent() {
    let fx = Fixture::new();
    let other_workspace = Uuid::now_v7();
    let a1 = Uuid::now_v7();
    fx.db
        .insert_template_schedule(template_schedule(a1, "Daily Summary", "0 9 * * *"));
    let cloner = cloner(&fx);

    cloner
        .clone_templates(fx.workspace_id, &[a1], None)
        .await
        .unwrap();
    let report = cloner
        .clone_templates(other_workspace, &[a1], None)
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(fx.db.workspace_schedules(other_workspace).len(), 1);
}
