// Storage layer with sqlx
//
// This crate provides database implementations for the core store traits:
// - Database: PostgreSQL (production)
// - InMemoryDatabase: parking_lot tables (dev mode and tests)
// - StorageBackend: selects one and hands out a `Stores` bundle

pub mod backend;
pub mod memory;
pub mod models;
pub mod repositories;

pub use backend::StorageBackend;
pub use memory::InMemoryDatabase;
pub use models::*;
pub use repositories::*;
