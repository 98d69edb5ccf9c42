//! Registry of the directory entities served under `/api/{plural}`
//!
//! Mounting a resource does two things: it makes the resource resolvable by
//! the foreign-key checks of every other resource, and it queues the CRUD
//! routes. Routes are built only once every resource is mounted, so each one
//! sees the complete fetcher map.

use crate::core::{DataService, EntityFetcher, ServiceFetcher};
use crate::resources::{Resource, ResourceDescriptor};
use axum::Router;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Type-erased lookups keyed by singular entity type
pub type FetcherMap = Arc<HashMap<String, Arc<dyn EntityFetcher>>>;

type RouteFactory = Box<dyn Fn(FetcherMap) -> Router + Send + Sync>;

/// Directory entities and the lookups their foreign keys resolve against
#[derive(Default)]
pub struct EntityRegistry {
    fetchers: FetcherMap,
    routes: BTreeMap<&'static str, RouteFactory>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `T` under `/api/{plural}`. Mounting the same type again
    /// replaces the earlier service.
    pub fn mount<T: Resource>(&mut self, service: Arc<dyn DataService<T>>) -> &mut Self {
        let entity_type = T::resource_name_singular();
        Arc::make_mut(&mut self.fetchers).insert(
            entity_type.to_string(),
            Arc::new(ServiceFetcher::new(service.clone())),
        );
        self.routes.insert(
            entity_type,
            Box::new(move |fetchers| ResourceDescriptor::new(service.clone(), fetchers).routes()),
        );
        self
    }

    /// Lookups for every mounted entity
    pub fn fetchers(&self) -> FetcherMap {
        self.fetchers.clone()
    }

    /// Mounted entity types, sorted
    pub fn entity_types(&self) -> Vec<&str> {
        self.routes.keys().copied().collect()
    }

    /// CRUD routes of every mounted entity
    pub fn build_routes(&self) -> Router {
        self.routes
            .values()
            .fold(Router::new(), |router, factory| {
                router.merge(factory(self.fetchers.clone()))
            })
    }
}
