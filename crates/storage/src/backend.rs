// Storage backend abstraction
// Decision: Use enum dispatch for selecting the backend, trait objects for services
//
// This module provides a unified StorageBackend enum that can work with
// either PostgreSQL (production) or in-memory (dev mode) storage. Services
// never see the enum; they receive a `Stores` bundle.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use teamdeploy_core::{Plan, Stores};

use super::memory::InMemoryDatabase;
use super::models::UpsertWorkspaceBilling;
use super::repositories::Database;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(Database),
    /// In-memory database (dev mode)
    InMemory(Arc<InMemoryDatabase>),
}

impl StorageBackend {
    /// Connect to PostgreSQL and apply pending migrations
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let db = Database::from_url(database_url).await?;
        db.migrate().await?;
        Ok(Self::Postgres(db))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryDatabase::new()))
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    /// Get the PostgreSQL pool if using PostgreSQL backend
    /// Returns None for in-memory backend
    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Self::Postgres(db) => Some(db.pool()),
            Self::InMemory(_) => None,
        }
    }

    /// Store bundle backed by this backend
    pub fn stores(&self) -> Stores {
        match self {
            Self::Postgres(db) => Stores::from_backend(Arc::new(db.clone())),
            Self::InMemory(db) => Stores::from_backend(db.clone()),
        }
    }

    // ============================================
    // Billing inputs
    // ============================================

    pub async fn upsert_workspace_billing(&self, input: UpsertWorkspaceBilling) -> Result<()> {
        match self {
            Self::Postgres(db) => db.upsert_workspace_billing(input).await,
            Self::InMemory(db) => {
                db.upsert_workspace_billing(input);
                Ok(())
            }
        }
    }

    pub async fn upsert_plan(&self, plan: &Plan) -> Result<()> {
        match self {
            Self::Postgres(db) => db.upsert_plan(plan).await,
            Self::InMemory(db) => {
                db.upsert_plan(plan);
                Ok(())
            }
        }
    }
}
