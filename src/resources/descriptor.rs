//! Route set of one `Resource` under `/api/{plural}`

use super::Resource;
use super::handlers::{
    ResourceState, create_resource, delete_resource, get_resource, list_resources,
    update_resource,
};
use crate::core::{DataService, Pluralizer};
use crate::server::entity_registry::FetcherMap;
use axum::{Router, routing::get};
use std::sync::Arc;

/// Descriptor producing the `/api/{plural}` routes of one resource type
pub struct ResourceDescriptor<T: Resource> {
    state: ResourceState<T>,
}

impl<T: Resource> ResourceDescriptor<T> {
    pub fn new(service: Arc<dyn DataService<T>>, fetchers: FetcherMap) -> Self {
        Self {
            state: ResourceState { service, fetchers },
        }
    }

    /// Collection path, e.g. `/api/academic-years`
    pub fn base_path() -> String {
        format!("/api/{}", Pluralizer::snake_to_kebab(T::resource_name()))
    }

    /// List/create on the collection, get/update/delete on `{id}`
    pub fn routes(&self) -> Router {
        let base = Self::base_path();
        Router::new()
            .route(&base, get(list_resources::<T>).post(create_resource::<T>))
            .route(
                &format!("{}/{{id}}", base),
                get(get_resource::<T>)
                    .put(update_resource::<T>)
                    .patch(update_resource::<T>)
                    .delete(delete_resource::<T>),
            )
            .with_state(self.state.clone())
    }
}
