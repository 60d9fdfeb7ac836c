// Teamdeploy Control Plane Library
// Decision: Shared library for the worker binary and integration tests

// Configuration from environment
pub mod config;
pub use config::{DeployConfig, WorkerConfig};

// Services layer
pub mod services;
pub use services::{DeploymentService, PendingTierService};

// Periodic tier reconciliation
pub mod worker;
pub use worker::ReconcileWorker;
