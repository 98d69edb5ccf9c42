//! Query parameters and pagination utilities

use crate::core::entity::Data;
use crate::core::error::ValidationError;
use crate::core::pluralize::Pluralizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default page size
pub const DEFAULT_LIMIT: usize = 20;

/// Hard cap on page size
pub const MAX_LIMIT: usize = 100;

/// Offset pagination parameters
///
/// Extracted from `?limit=&offset=`. Limit defaults to 20 and is capped at 100.
///
/// # Example
/// ```text
/// GET /api/students?limit=50&offset=100
/// GET /api/students?classId=...&limit=500   (served as limit=100)
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListParams {
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self { limit, offset }
    }

    /// Get limit, ensuring it stays within 1..=100
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    /// Split a raw query map into pagination and equality filters.
    ///
    /// Filter keys are converted from camelCase to the snake_case field names
    /// `Data::field_value` understands. Non-numeric `limit`/`offset` values are
    /// rejected.
    pub fn from_query(
        mut query: HashMap<String, String>,
    ) -> Result<(Self, Vec<(String, String)>), ValidationError> {
        let limit = take_usize(&mut query, "limit")?;
        let offset = take_usize(&mut query, "offset")?;

        let mut filters: Vec<(String, String)> = query
            .into_iter()
            .map(|(k, v)| (Pluralizer::camel_to_snake(&k), v))
            .collect();
        filters.sort();

        Ok((Self { limit, offset }, filters))
    }

    /// Apply offset/limit to an already filtered collection
    pub fn paginate<T>(&self, items: Vec<T>) -> PaginatedResponse<T> {
        let total = items.len();
        let data: Vec<T> = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit())
            .collect();
        PaginatedResponse {
            data,
            pagination: PaginationMeta::new(self.limit(), self.offset(), total),
        }
    }
}

fn take_usize(
    query: &mut HashMap<String, String>,
    key: &str,
) -> Result<Option<usize>, ValidationError> {
    match query.remove(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ValidationError::field(key, "must be a non-negative integer")),
    }
}

/// Keep the items whose fields equal every filter value.
///
/// Filters name snake_case fields; a field the entity does not have is
/// rejected with `INVALID_FILTER`.
pub fn filter_items<T: Data>(
    items: Vec<T>,
    filters: &[(String, String)],
) -> Result<Vec<T>, ValidationError> {
    if let Some((field, _)) = filters
        .iter()
        .find(|(field, _)| !T::field_names().contains(&field.as_str()))
    {
        return Err(ValidationError::InvalidFilter {
            field: Pluralizer::snake_to_camel(field),
        });
    }

    Ok(items
        .into_iter()
        .filter(|item| {
            filters.iter().all(|(field, raw)| {
                item.field_value(field)
                    .is_some_and(|value| value.matches_query(raw))
            })
        })
        .collect())
}

/// Paginated response structure
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// The page of data
    pub data: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub limit: usize,
    pub offset: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Whether there is a next page
    pub has_more: bool,
}

impl PaginationMeta {
    pub fn new(limit: usize, offset: usize, total: usize) -> Self {
        Self {
            limit,
            offset,
            total,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}
