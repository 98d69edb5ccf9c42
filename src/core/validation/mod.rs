//! Request validation
//!
//! Payload structs derive `validator::Validate`; the [`ValidatedJson`]
//! extractor runs those rules before a handler sees the body and turns
//! failures into `VALIDATION_ERROR` responses.

pub mod extractor;

pub use extractor::{ValidatedJson, parse_id};
