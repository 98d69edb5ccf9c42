//! Service trait for generic record storage

use crate::core::Data;
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Service trait for managing data entities
///
/// Implementations provide CRUD operations for a specific entity type.
/// Ledger and attendance rows have dedicated stores with atomic operations;
/// everything else goes through this trait.
#[async_trait]
pub trait DataService<T: Data>: Send + Sync {
    /// Insert a new entity
    async fn create(&self, entity: T) -> Result<T>;

    /// Get an entity by ID
    async fn get(&self, id: &Uuid) -> Result<Option<T>>;

    /// List all entities, oldest first
    async fn list(&self) -> Result<Vec<T>>;

    /// Replace an existing entity
    async fn update(&self, id: &Uuid, entity: T) -> Result<T>;

    /// Delete an entity, returning the removed row if it existed
    async fn delete(&self, id: &Uuid) -> Result<Option<T>>;

    /// Find entities whose `field` (snake_case) equals `value`
    async fn search(&self, field: &str, value: &str) -> Result<Vec<T>>;
}
