// Services layer for team deployment
// Services own the business logic and talk to storage through the store traits

pub mod cloner;
pub mod lifecycle;
pub mod provisioner;
pub mod snapshot;
pub mod tier;
pub mod verifier;

pub use cloner::{CloneReport, ScheduleCloner};
pub use lifecycle::{DeployResult, DeploymentService, PROVISIONING_INCOMPLETE};
pub use provisioner::{
    AgentProvisionOutcome, ProvisionSummary, ProvisionedAgent, ResourceProvisioner,
};
pub use snapshot::SnapshotBuilder;
pub use tier::{ApplyTierResult, PendingTierService, ReconcileReport, TierError};
pub use verifier::{ProvisioningVerifier, VerificationReport};
