// Service configuration from environment variables
//
// Decision: plain env vars with defaults, same shape as the worker config.
// The binary loads `.env` through dotenvy before calling `from_env`.

use std::time::Duration;

use teamdeploy_core::cron::DEFAULT_TIMEZONE;

/// Upper bound for one multi-row schedule insert
pub const MAX_SCHEDULE_BATCH_SIZE: usize = 500;

/// Settings for deployment, cloning and verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    /// Rows per cloner batch insert (1..=500)
    pub schedule_batch_size: usize,
    /// Extra verification passes when the workspace is under-provisioned
    pub verify_retries: u32,
    /// Timezone for schedules that do not name one
    pub default_timezone: String,
    /// Domain of synthetic agent identity addresses
    pub identity_domain: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            schedule_batch_size: MAX_SCHEDULE_BATCH_SIZE,
            verify_retries: 1,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            identity_domain: "agents.teamdeploy.internal".to_string(),
        }
    }
}

impl DeployConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SCHEDULE_BATCH_SIZE`: cloner batch size (default: 500, clamped to 1..=500)
    /// - `PROVISIONING_VERIFY_RETRIES`: verifier retries (default: 1)
    /// - `DEFAULT_SCHEDULE_TIMEZONE`: fallback timezone (default: "UTC")
    /// - `AGENT_IDENTITY_DOMAIN`: identity address domain
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let schedule_batch_size = std::env::var("SCHEDULE_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.schedule_batch_size);

        let verify_retries = std::env::var("PROVISIONING_VERIFY_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.verify_retries);

        let default_timezone = std::env::var("DEFAULT_SCHEDULE_TIMEZONE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.default_timezone);

        let identity_domain = std::env::var("AGENT_IDENTITY_DOMAIN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.identity_domain);

        Self {
            schedule_batch_size,
            verify_retries,
            default_timezone,
            identity_domain,
        }
        .normalized()
    }

    /// Clamp values into their supported ranges
    pub fn normalized(mut self) -> Self {
        self.schedule_batch_size = self.schedule_batch_size.clamp(1, MAX_SCHEDULE_BATCH_SIZE);
        self
    }
}

/// Settings for the tier reconciliation worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL URL; `None` runs against the in-memory backend
    pub database_url: Option<String>,
    /// Time between reconciliation passes
    pub reconcile_interval: Duration,
    pub deploy: DeployConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            reconcile_interval: Duration::from_secs(300),
            deploy: DeployConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let reconcile_interval = std::env::var("TIER_RECONCILE_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let defaults = Self::default();
        Self {
            database_url,
            reconcile_interval: reconcile_interval.unwrap_or(defaults.reconcile_interval),
            deploy: DeployConfig::from_env(),
        }
    }
}
