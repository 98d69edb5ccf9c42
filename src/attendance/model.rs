//! Attendance records for students and staff

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

crate::impl_field_enum!(
    AttendanceStatus {
        Present => "present",
        Absent => "absent",
        Late => "late",
        Excused => "excused",
    }
);

crate::impl_field_enum!(
    /// How the mark was captured
    AttendanceSource {
        Manual => "manual",
        Biometric => "biometric",
    }
);

crate::impl_data_entity!(
    Attendance,
    "attendance",
    ["student_id", "date"],
    {
        student_id: Uuid,
        date: NaiveDate,
        status: AttendanceStatus,
        #[serde(default)]
        subject_id: Option<Uuid>,
        source: AttendanceSource,
        #[serde(default)]
        marked_by: Option<Uuid>,
        #[serde(default)]
        check_in_at: Option<DateTime<Utc>>,
        #[serde(default)]
        device_id: Option<String>,
    }
);

crate::impl_data_entity!(
    StaffAttendance,
    "staff_attendance",
    ["staff_id", "date"],
    {
        staff_id: Uuid,
        date: NaiveDate,
        status: AttendanceStatus,
        source: AttendanceSource,
        #[serde(default)]
        check_in_at: Option<DateTime<Utc>>,
        #[serde(default)]
        device_id: Option<String>,
    }
);

/// Result of an idempotent mark
#[derive(Debug, Clone)]
pub enum MarkOutcome<T> {
    /// No row existed for the key; this one was inserted
    Created(T),
    /// A row already existed and was left unchanged
    Existing(T),
}

impl<T> MarkOutcome<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, MarkOutcome::Created(_))
    }

    pub fn record(&self) -> &T {
        match self {
            MarkOutcome::Created(r) | MarkOutcome::Existing(r) => r,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            MarkOutcome::Created(r) | MarkOutcome::Existing(r) => r,
        }
    }
}
