//! Storage trait for attendance marks

use super::model::{Attendance, MarkOutcome, StaffAttendance};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence for attendance rows
///
/// There is at most one row per (student, date) and per (staff, date). The
/// existence check and the insert happen atomically, so two concurrent marks
/// for the same key produce one `Created` and one `Existing`.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn mark_student(&self, record: Attendance) -> Result<MarkOutcome<Attendance>>;

    async fn mark_staff(&self, record: StaffAttendance) -> Result<MarkOutcome<StaffAttendance>>;

    /// All student rows, newest date first
    async fn list_student(&self) -> Result<Vec<Attendance>>;

    /// All staff rows, newest date first
    async fn list_staff(&self) -> Result<Vec<StaffAttendance>>;
}
