// Team Deployment Core
//
// This crate provides the DB-agnostic building blocks for deploying team
// templates onto tenant workspaces.
//
// Key design decisions:
// - Store traits (TemplateStore, DeploymentStore, ...) for pluggable backends
// - Pure functions for everything that can be pure: overlay, dedup, cron, completeness
// - Workspace id passed explicitly on every operation
// - Ordered collections in persisted JSON so snapshots serialize deterministically

// Telemetry (tracing-subscriber setup)
pub mod telemetry;

// Domain entity types
pub mod audit;
pub mod billing;
pub mod config;
pub mod customizations;
pub mod deployment;
pub mod resources;
pub mod schedule;
pub mod template;

// Pure functions
pub mod cron;
pub mod overlay;
pub mod verification;

pub mod error;
pub mod traits;

// Re-exports for convenience
pub use audit::{AuditEntry, NewAuditEntry};
pub use billing::{
    AgentStatus, BillingAlert, BillingAlertKind, DeployStatus, NewBillingAlert, PendingTier,
    WorkspaceBilling,
};
pub use config::{AgentConfig, DelegationConfig, TeamConfig};
pub use customizations::{AgentOverride, Customizations};
pub use deployment::{Deployment, DeploymentStatus, NewDeployment};
pub use error::{DeployError, StoreError, StoreResult};
pub use overlay::{apply_customizations, IgnoredReference, OverlayOutcome};
pub use resources::{
    AgentIdentity, Channel, MemberKind, NewAgentIdentity, NewChannel, ResourceCounts,
};
pub use schedule::{dedupe_templates, NewSchedule, Schedule, ScheduleKey};
pub use template::{
    AgentTemplate, DelegationTemplate, KnowledgeItem, Plan, TeamAgentLink, TeamTemplate,
};
pub use traits::{
    AuditStore, BillingStore, DeploymentStore, ResourceStore, ScheduleStore, Stores,
    TemplateStore,
};
pub use verification::{provisioning_issues, ProvisioningIssue};
