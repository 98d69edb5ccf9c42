//! Axum extractors for validated payloads and path ids

use crate::core::error::{CampusError, ValidationError};
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

/// Axum extractor that deserializes a JSON body and runs its `Validate` rules
///
/// # Usage
///
/// ```rust,ignore
/// pub async fn create_invoice(
///     State(host): State<AppState>,
///     ValidatedJson(payload): ValidatedJson<CreateInvoiceRequest>,
/// ) -> CampusResult<impl IntoResponse> {
///     // payload is already validated
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = CampusError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload): Json<T> =
            Json::from_request(req, state)
                .await
                .map_err(|rejection| match rejection {
                    // Well-formed JSON with missing or mistyped fields
                    JsonRejection::JsonDataError(e) => ValidationError::InvalidPayload {
                        message: e.body_text(),
                    },
                    other => ValidationError::InvalidJson {
                        message: other.body_text(),
                    },
                })?;

        payload.validate().map_err(ValidationError::from)?;

        Ok(ValidatedJson(payload))
    }
}

/// Parse a path or body id, reporting `INVALID_ID` for the named field
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidId {
        field: field.to_string(),
        value: raw.to_string(),
    })
}
