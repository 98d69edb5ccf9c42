//! Generic HTTP handlers shared by every directory resource

use super::Resource;
use crate::core::error::{CampusResult, EntityError};
use crate::core::query::{ListParams, PaginatedResponse, filter_items};
use crate::core::{DataService, Pluralizer, ValidatedJson, parse_id};
use crate::server::entity_registry::FetcherMap;
use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Resource-specific state
pub struct ResourceState<T: Resource> {
    pub service: Arc<dyn DataService<T>>,
    pub fetchers: FetcherMap,
}

impl<T: Resource> Clone for ResourceState<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            fetchers: self.fetchers.clone(),
        }
    }
}

impl<T: Resource> ResourceState<T> {
    async fn load(&self, raw_id: &str) -> CampusResult<T> {
        let id = parse_id("id", raw_id)?;
        self.service
            .get(&id)
            .await?
            .ok_or_else(|| EntityError::not_found(T::resource_name_singular(), id).into())
    }

    /// Record rules, foreign keys, then unique fields
    async fn check_integrity(&self, entity: &T) -> CampusResult<()> {
        entity.check()?;

        for reference in entity.references() {
            let fetcher = self.fetchers.get(reference.entity_type).ok_or_else(|| {
                anyhow!("no fetcher registered for '{}'", reference.entity_type)
            })?;
            if !fetcher.exists(&reference.id).await? {
                return Err(EntityError::InvalidReference {
                    entity_type: reference.entity_type.to_string(),
                    id: reference.id,
                }
                .into());
            }
        }

        for field in T::unique_fields() {
            let Some(value) = entity
                .field_value(field)
                .and_then(|value| value.to_query_string())
            else {
                continue;
            };
            let clash = self
                .service
                .search(field, &value)
                .await?
                .iter()
                .any(|other| other.id() != entity.id());
            if clash {
                return Err(EntityError::DuplicateCode {
                    entity_type: T::resource_name_singular().to_string(),
                    field: Pluralizer::snake_to_camel(field),
                    value,
                }
                .into());
            }
        }

        Ok(())
    }
}

/// `GET /api/{plural}` with camelCase equality filters, `limit` and `offset`
pub async fn list_resources<T: Resource>(
    State(state): State<ResourceState<T>>,
    Query(query): Query<HashMap<String, String>>,
) -> CampusResult<Json<PaginatedResponse<T>>> {
    let (params, filters) = ListParams::from_query(query)?;
    let items = filter_items(state.service.list().await?, &filters)?;
    Ok(Json(params.paginate(items)))
}

pub async fn get_resource<T: Resource>(
    State(state): State<ResourceState<T>>,
    Path(id): Path<String>,
) -> CampusResult<Json<T>> {
    Ok(Json(state.load(&id).await?))
}

pub async fn create_resource<T: Resource>(
    State(state): State<ResourceState<T>>,
    ValidatedJson(input): ValidatedJson<T::Create>,
) -> CampusResult<(StatusCode, Json<T>)> {
    let entity = T::from_create(input);
    state.check_integrity(&entity).await?;

    let created = state.service.create(entity).await?;
    tracing::info!(
        entity_type = T::resource_name_singular(),
        id = %created.id(),
        "Created resource"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT`/`PATCH /api/{plural}/{id}`; both apply a partial update
pub async fn update_resource<T: Resource>(
    State(state): State<ResourceState<T>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<T::Update>,
) -> CampusResult<Json<T>> {
    let mut entity = state.load(&id).await?;
    entity.apply_update(input);
    entity.touch();
    state.check_integrity(&entity).await?;

    let id = entity.id();
    let updated = state.service.update(&id, entity).await?;
    tracing::info!(entity_type = T::resource_name_singular(), id = %id, "Updated resource");
    Ok(Json(updated))
}

/// `DELETE /api/{plural}/{id}` returns the deleted row
pub async fn delete_resource<T: Resource>(
    State(state): State<ResourceState<T>>,
    Path(id): Path<String>,
) -> CampusResult<Json<T>> {
    let id = parse_id("id", &id)?;
    let deleted = state
        .service
        .delete(&id)
        .await?
        .ok_or_else(|| EntityError::not_found(T::resource_name_singular(), id))?;
    tracing::info!(entity_type = T::resource_name_singular(), id = %id, "Deleted resource");
    Ok(Json(deleted))
}
