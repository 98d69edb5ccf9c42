//! Entity traits defining the core abstraction for stored records

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Base trait for every record the service persists through a `DataService`.
///
/// All entities have:
/// - id: Unique identifier
/// - type: Entity type name (e.g., "student", "class")
/// - created_at: Creation timestamp
/// - updated_at: Last modification timestamp
///
/// Rows are hard-deleted; there is no soft-delete column.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The plural resource name (e.g., "students", "academic_years")
    fn resource_name() -> &'static str;

    /// The singular resource name (e.g., "student", "academic_year")
    fn resource_name_singular() -> &'static str;

    /// Get the unique identifier for this entity instance
    fn id(&self) -> Uuid;

    /// Get the entity type name
    fn entity_type(&self) -> &str;

    /// Get the creation timestamp
    fn created_at(&self) -> DateTime<Utc>;

    /// Get the last update timestamp
    fn updated_at(&self) -> DateTime<Utc>;

    /// Set the last update timestamp to now
    fn touch(&mut self);
}

/// Trait for entities that expose their fields for filtering and lookups.
///
/// `field_value` takes the Rust (snake_case) field name. Callers holding a
/// camelCase query key convert it first with `Pluralizer::camel_to_snake`.
pub trait Data: Entity {
    /// Fields that are expected to be queried often (used for indexes)
    fn indexed_fields() -> &'static [&'static str];

    /// Every field `field_value` answers for, snake_case
    fn field_names() -> &'static [&'static str];

    /// Get the value of a specific field by name
    fn field_value(&self, field: &str) -> Option<crate::core::field::FieldValue>;
}
