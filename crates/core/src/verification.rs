// Provisioning completeness predicate

use serde::{Deserialize, Serialize};

use crate::resources::ResourceCounts;

/// Reasons a workspace is under-provisioned, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningIssue {
    ProfilesMissing,
    ChannelsMissing,
    NoSchedules,
}

impl ProvisioningIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfilesMissing => "profiles_missing",
            Self::ChannelsMissing => "channels_missing",
            Self::NoSchedules => "no_schedules",
        }
    }
}

impl std::fmt::Display for ProvisioningIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues for `expected_agents` enabled agents given the observed counts
///
/// Complete means profiles >= N, channels >= N and, when N > 0, at least one
/// tenant schedule.
pub fn provisioning_issues(expected_agents: u64, counts: &ResourceCounts) -> Vec<ProvisioningIssue> {
    let mut issues = Vec::new();
    if counts.profiles < expected_agents {
        issues.push(ProvisioningIssue::ProfilesMissing);
    }
    if counts.channels < expected_agents {
        issues.push(ProvisioningIssue::ChannelsMissing);
    }
    if expected_agents > 0 && counts.schedules == 0 {
        issues.push(ProvisioningIssue::NoSchedules);
    }
    issues
}
