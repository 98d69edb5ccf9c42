//! Type-erased entity lookup used for foreign-key checks

use crate::core::{Data, DataService};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Trait for fetching entities without knowing their concrete type
///
/// Resource handlers use this to verify that a referenced row (a class, a
/// parent, an academic year...) exists before inserting.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    /// Fetch an entity by ID and return it as JSON, `None` if absent
    async fn fetch_as_json(&self, entity_id: &Uuid) -> Result<Option<serde_json::Value>>;

    /// Check whether an entity exists
    async fn exists(&self, entity_id: &Uuid) -> Result<bool> {
        Ok(self.fetch_as_json(entity_id).await?.is_some())
    }
}

/// Adapter exposing any `DataService<T>` as an `EntityFetcher`
pub struct ServiceFetcher<T: Data> {
    service: Arc<dyn DataService<T>>,
}

impl<T: Data> ServiceFetcher<T> {
    pub fn new(service: Arc<dyn DataService<T>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<T: Data + Serialize> EntityFetcher for ServiceFetcher<T> {
    async fn fetch_as_json(&self, entity_id: &Uuid) -> Result<Option<serde_json::Value>> {
        match self.service.get(entity_id).await? {
            Some(entity) => Ok(Some(serde_json::to_value(entity)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDataService;

    crate::impl_data_entity!(Room, "room", ["label"], {
        label: String,
    });

    #[tokio::test]
    async fn test_service_fetcher_exists() {
        let service = Arc::new(InMemoryDataService::<Room>::new());
        let room = service.create(Room::new("Lab 1".to_string())).await.unwrap();

        let fetcher = ServiceFetcher::new(service as Arc<dyn DataService<Room>>);
        assert!(fetcher.exists(&room.id).await.unwrap());
        assert!(!fetcher.exists(&Uuid::new_v4()).await.unwrap());

        let json = fetcher.fetch_as_json(&room.id).await.unwrap().unwrap();
        assert_eq!(json["label"], "Lab 1");
        assert_eq!(json["type"], "room");
    }
}
