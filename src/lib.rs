//! # Campus
//!
//! REST backend for running a school: the student directory, a fee ledger
//! with two-part EMI plans, a Razorpay payment bridge, attendance marks that
//! notify guardians over WhatsApp, and in-app notifications.
//!
//! ## Features
//!
//! - **Directory CRUD**: academic years, classes, sections, subjects,
//!   parents, students, staff and message templates under `/api/{plural}`
//! - **Fee ledger**: invoices, installments and payments updated atomically,
//!   amounts kept exact in paise
//! - **Payment bridge**: orders, UPI QR codes, checkout verification and
//!   idempotent webhooks, all signed with HMAC-SHA256
//! - **Attendance pipeline**: one mark per person per day, templated guardian
//!   messages rendered with Tera
//! - **Pluggable storage**: in-memory or PostgreSQL (`postgres` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use campus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load()?;
//!     let addr = config.bind_address();
//!
//!     ServerBuilder::new()
//!         .with_config(config)
//!         .with_storage(Storage::in_memory())
//!         .with_gateway(InMemoryGateway::new("rzp_test_key"))
//!         .serve(&addr)
//!         .await
//! }
//! ```

pub mod attendance;
pub mod config;
pub mod core;
pub mod entities;
pub mod ledger;
pub mod notifications;
pub mod payments;
pub mod resources;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        entity::{Data, Entity},
        error::{CampusError, CampusResult},
        field::{FieldFormat, FieldValue},
        pluralize::Pluralizer,
        query::{ListParams, PaginatedResponse},
        service::DataService,
    };

    // === Macros ===
    pub use crate::{impl_data_entity, impl_field_enum};

    // === Domain ===
    pub use crate::attendance::{Attendance, AttendanceStatus, AttendanceStore, StaffAttendance};
    pub use crate::ledger::{FeeInvoice, FeePayment, LedgerStore, PaymentInstallment, PaymentType};
    pub use crate::notifications::{Notification, WhatsAppMessage};
    pub use crate::payments::{InMemoryGateway, PaymentGateway};
    #[cfg(feature = "razorpay")]
    pub use crate::payments::RazorpayGateway;
    pub use crate::resources::{
        AcademicYear, MessageTemplate, Parent, SchoolClass, Section, Staff, Student, Subject,
    };

    // === Storage ===
    pub use crate::storage::Storage;

    // === Config ===
    pub use crate::config::AppConfig;

    // === Server ===
    pub use crate::server::{EntityRegistry, ServerBuilder, ServerHost};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, NaiveDate, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;

    // === Axum ===
    pub use axum::{
        Router,
        extract::{Path, State},
        routing::{delete, get, post, put},
    };
}
