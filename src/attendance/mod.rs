//! Attendance marks and the guardian message pipeline
//!
//! A new student mark (manual or from a biometric device) renders the
//! `attendance_<status>` template and records the outgoing WhatsApp message.
//! Repeated marks for the same day return the first one unchanged.

pub mod handlers;
pub mod model;
pub mod store;
pub mod template;

pub use model::{Attendance, AttendanceSource, AttendanceStatus, MarkOutcome, StaffAttendance};
pub use store::AttendanceStore;

use crate::server::host::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/attendance",
            get(handlers::list_attendance).post(handlers::create_attendance),
        )
        .route(
            "/api/attendance/biometric",
            post(handlers::biometric_attendance),
        )
        .route(
            "/api/staff-attendance",
            get(handlers::list_staff_attendance).post(handlers::create_staff_attendance),
        )
        .route(
            "/api/staff-attendance/biometric",
            post(handlers::biometric_staff_attendance),
        )
        .route("/api/whatsapp-messages", get(handlers::list_messages))
}
