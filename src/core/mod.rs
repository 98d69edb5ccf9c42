//! Core module containing the fundamental traits and types shared by every
//! domain module

pub mod entity;
pub mod error;
pub mod fetcher;
pub mod field;
pub mod pluralize;
pub mod query;
pub mod service;
pub mod validation;

pub use entity::{Data, Entity};
pub use error::{CampusError, CampusResult};
pub use fetcher::{EntityFetcher, ServiceFetcher};
pub use field::{FieldFormat, FieldValue, IntoFieldValue};
pub use pluralize::Pluralizer;
pub use query::{ListParams, PaginatedResponse};
pub use service::DataService;
pub use validation::{ValidatedJson, parse_id};
