//! Typed error handling for the campus API
//!
//! Every failure a handler can surface is one of the categories below. Each
//! maps to an HTTP status and a machine-readable `code`, and serializes as
//! `{ "error": <message>, "code": <CODE> }`.
//!
//! # Error Categories
//!
//! - [`EntityError`]: generic resource lookups, references, unique codes
//! - [`LedgerError`]: invoice / installment business rules
//! - [`PaymentError`]: gateway bridge failures (signatures, capture state)
//! - [`ValidationError`]: malformed or missing input
//! - [`StorageError`]: backend failures
//! - [`RequestError`]: transport-level problems (headers, bodies)
//!
//! Services and stores return `anyhow::Result`. Typed errors travel inside
//! the `anyhow::Error` and are recovered by `From<anyhow::Error>`, so a
//! `LedgerError` raised under a store lock still reaches the client with its
//! own status and code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

/// The main error type for the campus API
#[derive(Debug, thiserror::Error)]
pub enum CampusError {
    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// Unclassified failure; the message is returned to the client verbatim
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used by handlers
pub type CampusResult<T> = Result<T, CampusError>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Error code for programmatic handling
    pub code: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CampusError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CampusError::Entity(e) => e.status_code(),
            CampusError::Ledger(e) => e.status_code(),
            CampusError::Payment(e) => e.status_code(),
            CampusError::Validation(_) => StatusCode::BAD_REQUEST,
            CampusError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CampusError::Request(_) => StatusCode::BAD_REQUEST,
            CampusError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CampusError::Entity(e) => e.error_code(),
            CampusError::Ledger(e) => e.error_code(),
            CampusError::Payment(e) => e.error_code(),
            CampusError::Validation(e) => e.error_code(),
            CampusError::Storage(_) => "STORAGE_ERROR",
            CampusError::Request(e) => e.error_code(),
            CampusError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CampusError::Entity(EntityError::NotFound { entity_type, id }) => {
                Some(serde_json::json!({ "entityType": entity_type, "id": id }))
            }
            CampusError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for CampusError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        } else {
            tracing::debug!(code = self.error_code(), "{}", self);
        }
        (status, Json(self.to_response())).into_response()
    }
}

impl From<anyhow::Error> for CampusError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<CampusError>() {
            Ok(e) => return e,
            Err(err) => err,
        };
        let err = match err.downcast::<LedgerError>() {
            Ok(e) => return CampusError::Ledger(e),
            Err(err) => err,
        };
        let err = match err.downcast::<EntityError>() {
            Ok(e) => return CampusError::Entity(e),
            Err(err) => err,
        };
        let err = match err.downcast::<PaymentError>() {
            Ok(e) => return CampusError::Payment(e),
            Err(err) => err,
        };
        let err = match err.downcast::<ValidationError>() {
            Ok(e) => return CampusError::Validation(e),
            Err(err) => err,
        };
        let err = match err.downcast::<StorageError>() {
            Ok(e) => return CampusError::Storage(e),
            Err(err) => err,
        };
        let err = match err.downcast::<RequestError>() {
            Ok(e) => return CampusError::Request(e),
            Err(err) => err,
        };
        CampusError::Internal(format!("{:#}", err))
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors raised by the generic resource endpoints
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("{entity_type} with id '{id}' not found")]
    NotFound { entity_type: String, id: Uuid },

    #[error("{entity_type} with {field} '{value}' already exists")]
    DuplicateCode {
        entity_type: String,
        field: String,
        value: String,
    },

    #[error("referenced {entity_type} '{id}' does not exist")]
    InvalidReference { entity_type: String, id: Uuid },

    #[error("no {entity_type} is registered with biometric id '{biometric_id}'")]
    UnknownBiometricId {
        entity_type: String,
        biometric_id: String,
    },
}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
            EntityError::DuplicateCode { .. } => StatusCode::BAD_REQUEST,
            EntityError::InvalidReference { .. } => StatusCode::BAD_REQUEST,
            EntityError::UnknownBiometricId { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "NOT_FOUND",
            EntityError::DuplicateCode { .. } => "DUPLICATE_CODE",
            EntityError::InvalidReference { .. } => "INVALID_REFERENCE",
            EntityError::UnknownBiometricId { .. } => "UNKNOWN_BIOMETRIC_ID",
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: Uuid) -> Self {
        EntityError::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }
}

// =============================================================================
// Ledger Errors
// =============================================================================

/// Business-rule violations on invoices and installments
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invoice '{id}' not found")]
    InvoiceNotFound { id: Uuid },

    #[error("invoice '{id}' is already fully paid")]
    InvoiceAlreadyPaid { id: Uuid },

    #[error("an EMI plan already exists for invoice '{id}'")]
    EmiAlreadyExists { id: Uuid },

    #[error("EMI is not available for invoice '{id}': {reason}")]
    EmiNotAllowed { id: Uuid, reason: String },

    #[error("invoice '{id}' has no pending installments")]
    NoPendingInstallments { id: Uuid },

    #[error("invoice number '{number}' already exists")]
    DuplicateInvoiceNumber { number: String },

    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount { amount: f64, reason: String },
}

impl LedgerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::InvoiceNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvoiceNotFound { .. } => "INVOICE_NOT_FOUND",
            LedgerError::InvoiceAlreadyPaid { .. } => "INVOICE_ALREADY_PAID",
            LedgerError::EmiAlreadyExists { .. } => "EMI_ALREADY_EXISTS",
            LedgerError::EmiNotAllowed { .. } => "EMI_NOT_ALLOWED",
            LedgerError::NoPendingInstallments { .. } => "NO_PENDING_INSTALLMENTS",
            LedgerError::DuplicateInvoiceNumber { .. } => "DUPLICATE_INVOICE_NUMBER",
            LedgerError::InvalidAmount { .. } => "INVALID_AMOUNT",
        }
    }
}

// =============================================================================
// Payment Errors
// =============================================================================

/// Failures of the payment gateway bridge
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment signature verification failed")]
    InvalidSignature,

    #[error("payment '{payment_id}' is not captured (status: {status})")]
    NotCaptured { payment_id: String, status: String },

    #[error("gateway metadata is missing '{field}'")]
    MissingNotes { field: String },

    #[error("payment gateway error: {message}")]
    Gateway { message: String },
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PaymentError::InvalidSignature => "INVALID_SIGNATURE",
            PaymentError::NotCaptured { .. } => "PAYMENT_NOT_CAPTURED",
            PaymentError::MissingNotes { .. } => "MISSING_PAYMENT_METADATA",
            PaymentError::Gateway { .. } => "GATEWAY_ERROR",
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Input validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}': {message}")]
    FieldError { field: String, message: String },

    #[error("Validation failed: {}", format_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),

    #[error("'{field}' is required")]
    MissingField { field: String },

    #[error("'{field}' is not a valid id: '{value}'")]
    InvalidId { field: String, value: String },

    #[error("unknown filter '{field}'")]
    InvalidFilter { field: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::MissingField { .. } => "MISSING_FIELD",
            ValidationError::InvalidId { .. } => "INVALID_ID",
            ValidationError::InvalidFilter { .. } => "INVALID_FILTER",
            ValidationError::InvalidJson { .. } => "INVALID_JSON",
            _ => "VALIDATION_ERROR",
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

fn format_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::FieldErrors(fields)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors from storage backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to connect to {backend}: {message}")]
    ConnectionError { backend: String, message: String },

    #[error("{backend} query failed: {message}")]
    QueryError { backend: String, message: String },

    #[error("Transaction failed: {message}")]
    TransactionError { message: String },
}

// =============================================================================
// Request Errors
// =============================================================================

/// Transport-level request errors
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Missing required header: {header}")]
    MissingHeader { header: String },

    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },
}

impl RequestError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::MissingHeader { .. } => "MISSING_HEADER",
            RequestError::InvalidBody { .. } => "INVALID_BODY",
        }
    }
}
