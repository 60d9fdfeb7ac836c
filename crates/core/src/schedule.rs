// Recurring task schedules
//
// Template rows (`is_template = true`, no workspace) and tenant clones share
// one table. A tenant clone is unique per (agent_id, workspace_id, name).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a schedule within one workspace
pub type ScheduleKey = (Uuid, String);

/// Persisted schedule row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
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

impl Schedule {
    pub fn key(&self) -> ScheduleKey {
        (self.agent_id, self.name.clone())
    }
}

/// Input for inserting a schedule
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchedule {
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
}

impl NewSchedule {
    pub fn key(&self) -> ScheduleKey {
        (self.agent_id, self.name.clone())
    }

    /// Tenant-owned clone of a template row
    pub fn clone_for_workspace(
        template: &Schedule,
        workspace_id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
        created_by: Option<Uuid>,
    ) -> Self {
        Self {
            agent_id: template.agent_id,
            workspace_id: Some(workspace_id),
            name: template.name.clone(),
            prompt: template.prompt.clone(),
            cron_expression: template.cron_expression.clone(),
            timezone: template.timezone.clone(),
            is_template: false,
            is_enabled: template.is_enabled,
            next_run_at,
            created_by,
        }
    }
}

/// Drop template rows that repeat an (agent_id, name) pair, keeping the first
pub fn dedupe_templates(rows: Vec<Schedule>) -> Vec<Schedule> {
    let mut seen: HashSet<ScheduleKey> = HashSet::with_capacity(rows.len());
    rows.into_iter().filter(|row| seen.insert(row.key())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(agent_id: Uuid, name: &str, cron: &str) -> Schedule {
        Schedule {
            id: Uuid::now_v7(),
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
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let a1 = Uuid::now_v7();
        let rows = vec![
            template(a1, "Daily Summary", "0 9 * * *"),
            template(a1, "Daily Summary", "0 17 * * *"),
        ];

        let deduped = dedupe_templates(rows);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].cron_expression, "0 9 * * *");
    }

    #[test]
    fn test_dedupe_distinguishes_agents_and_names() {
        let a1 = Uuid::now_v7();
        let a2 = Uuid::now_v7();
        let rows = vec![
            template(a1, "Daily Summary", "0 9 * * *"),
            template(a2, "Daily Summary", "0 9 * * *"),
            template(a1, "Weekly Review", "0 9 * * 1"),
        ];
        assert_eq!(dedupe_templates(rows).len(), 3);
    }

    #[test]
    fn test_clone_for_workspace_drops_template_flag() {
        let workspace_id = Uuid::now_v7();
        let source = template(Uuid::now_v7(), "Inbox Sweep", "*/15 * * * *");
        let clone = NewSchedule::clone_for_workspace(&source, workspace_id, None, None);

        assert!(!clone.is_template);
        assert_eq!(clone.workspace_id, Some(workspace_id));
        assert_eq!(clone.key(), source.key());
    }
}
