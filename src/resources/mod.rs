//! Generic resource endpoints for the school directory
//!
//! Every entity here gets the same five routes under `/api/{plural}`:
//! filtered list, get, create, partial update (PUT and PATCH) and delete.
//! What differs per entity (payload shapes, foreign keys, unique fields and
//! record-level checks) is described by the [`Resource`] trait.

pub mod descriptor;
pub mod handlers;
pub mod model;

pub use descriptor::ResourceDescriptor;
pub use model::{
    AcademicYear, MessageTemplate, Parent, SchoolClass, Section, Staff, Student, Subject,
};

use crate::core::error::ValidationError;
use crate::core::{Data, DataService};
use crate::server::entity_registry::EntityRegistry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// A foreign key held by a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Singular type name of the referenced entity
    pub entity_type: &'static str,
    pub id: Uuid,
}

impl Reference {
    pub fn new(entity_type: &'static str, id: Uuid) -> Self {
        Self { entity_type, id }
    }

    /// Zero or one reference for a nullable foreign key
    pub fn optional(entity_type: &'static str, id: Option<Uuid>) -> Vec<Self> {
        id.map(|id| Self::new(entity_type, id)).into_iter().collect()
    }
}

/// An entity exposed through the generic resource endpoints
pub trait Resource: Data + Serialize + DeserializeOwned {
    /// Body accepted by `POST`
    type Create: DeserializeOwned + Validate + Send + 'static;

    /// Body accepted by `PUT`/`PATCH`; absent fields are left unchanged
    type Update: DeserializeOwned + Validate + Send + 'static;

    fn from_create(input: Self::Create) -> Self;

    fn apply_update(&mut self, input: Self::Update);

    /// Foreign keys that must point at existing rows
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Fields (snake_case) whose non-null values must be unique
    fn unique_fields() -> &'static [&'static str] {
        &[]
    }

    /// Record-level rules that span several fields
    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Storage handles for every directory entity
#[derive(Clone)]
pub struct ResourceServices {
    pub academic_years: Arc<dyn DataService<AcademicYear>>,
    pub classes: Arc<dyn DataService<SchoolClass>>,
    pub sections: Arc<dyn DataService<Section>>,
    pub subjects: Arc<dyn DataService<Subject>>,
    pub parents: Arc<dyn DataService<Parent>>,
    pub students: Arc<dyn DataService<Student>>,
    pub staff: Arc<dyn DataService<Staff>>,
    pub templates: Arc<dyn DataService<MessageTemplate>>,
}

impl ResourceServices {
    /// Mount every directory entity on the registry
    pub fn mount_all(&self, registry: &mut EntityRegistry) {
        registry
            .mount(self.academic_years.clone())
            .mount(self.classes.clone())
            .mount(self.sections.clone())
            .mount(self.subjects.clone())
            .mount(self.parents.clone())
            .mount(self.students.clone())
            .mount(self.staff.clone())
            .mount(self.templates.clone());
    }

    /// Find the student enrolled with a biometric id
    pub async fn student_by_biometric(&self, biometric_id: &str) -> anyhow::Result<Option<Student>> {
        Ok(self
            .students
            .search("biometric_id", biometric_id)
            .await?
            .into_iter()
            .next())
    }

    /// Find the staff member enrolled with a biometric id
    pub async fn staff_by_biometric(&self, biometric_id: &str) -> anyhow::Result<Option<Staff>> {
        Ok(self
            .staff
            .search("biometric_id", biometric_id)
            .await?
            .into_iter()
            .next())
    }
}
