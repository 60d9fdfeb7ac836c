// Schedule template cloner
//
// Copies template schedules into tenant-owned rows. Safe to run repeatedly
// and concurrently: existing keys are skipped up front, and a batch rejected
// by the (agent_id, workspace_id, name) uniqueness key is retried row by row
// so that a lost race only drops the duplicate rows.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamdeploy_core::{
    cron, dedupe_templates, NewSchedule, Schedule, ScheduleKey, ScheduleStore, StoreResult,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DeployConfig;

/// Outcome of one cloning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneReport {
    /// Rows inserted by this pass
    pub created: u64,
    /// Template keys already cloned before this pass started
    pub already_present: u64,
    /// Rows another writer inserted first
    pub conflicts: u64,
    /// Rows that failed for any other reason
    pub failed: u64,
}

#[derive(Clone)]
pub struct ScheduleCloner {
    schedules: Arc<dyn ScheduleStore>,
    config: DeployConfig,
}

impl ScheduleCloner {
    pub fn new(schedules: Arc<dyn ScheduleStore>, config: DeployConfig) -> Self {
        Self {
            schedules,
            config: config.normalized(),
        }
    }

    /// Clone the template schedules of `agent_ids` into `workspace_id`
    pub async fn clone_templates(
        &self,
        workspace_id: Uuid,
        agent_ids: &[Uuid],
        created_by: Option<Uuid>,
    ) -> StoreResult<CloneReport> {
        let mut report = CloneReport::default();
        if agent_ids.is_empty() {
            return Ok(report);
        }

        let templates = dedupe_templates(self.schedules.list_template_schedules(agent_ids).await?);
        let existing: HashSet<ScheduleKey> = self
            .schedules
            .list_tenant_schedules(workspace_id, agent_ids)
            .await?
            .iter()
            .map(Schedule::key)
            .collect();

        let now = Utc::now();
        let to_create: Vec<NewSchedule> = templates
            .iter()
            .filter(|template| !existing.contains(&template.key()))
            .map(|template| {
                let timezone = self.resolve_timezone(template);
                let next_run_at = self.next_run_at(template, timezone, now);
                NewSchedule {
                    timezone: Some(timezone.to_string()),
                    ..NewSchedule::clone_for_workspace(
                        template,
                        workspace_id,
                        next_run_at,
                        created_by,
                    )
                }
            })
            .collect();
        report.already_present = (templates.len() - to_create.len()) as u64;

        for batch in to_create.chunks(self.config.schedule_batch_size) {
            match self.schedules.insert_schedules(batch).await {
                Ok(inserted) => report.created += inserted,
                Err(e) if e.is_unique_violation() => {
                    debug!(
                        workspace_id = %workspace_id,
                        rows = batch.len(),
                        "Batch hit uniqueness conflict, inserting row by row"
                    );
                    self.insert_rows(workspace_id, batch, &mut report).await;
                }
                Err(e) => {
                    warn!(
                        workspace_id = %workspace_id,
                        rows = batch.len(),
                        error = %e,
                        "Schedule batch insert failed"
                    );
                    report.failed += batch.len() as u64;
                }
            }
        }

        if report.created > 0 || report.failed > 0 {
            info!(
                workspace_id = %workspace_id,
                created = report.created,
                already_present = report.already_present,
                conflicts = report.conflicts,
                failed = report.failed,
                "Cloned schedule templates"
            );
        }

        Ok(report)
    }

    async fn insert_rows(&self, workspace_id: Uuid, rows: &[NewSchedule], report: &mut CloneReport) {
        for row in rows {
            match self.schedules.insert_schedule(row).await {
                Ok(_) => report.created += 1,
                Err(e) if e.is_unique_violation() => report.conflicts += 1,
                Err(e) => {
                    warn!(
                        workspace_id = %workspace_id,
                        agent_id = %row.agent_id,
                        schedule = %row.name,
                        error = %e,
                        "Schedule insert failed"
                    );
                    report.failed += 1;
                }
            }
        }
    }

    /// Template timezone, or the configured default when the template has none.
    /// Clones store the resolved value.
    fn resolve_timezone<'a>(&'a self, template: &'a Schedule) -> &'a str {
        template
            .timezone
            .as_deref()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or(&self.config.default_timezone)
    }

    fn next_run_at(
        &self,
        template: &Schedule,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match cron::next_run_at(&template.cron_expression, timezone, now) {
            Ok(next) => Some(next),
            Err(e) => {
                warn!(
                    agent_id = %template.agent_id,
                    schedule = %template.name,
                    error = %e,
                    "Could not compute next run, leaving it unset"
                );
                None
            }
        }
    }
}
