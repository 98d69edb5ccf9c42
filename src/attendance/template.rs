//! WhatsApp message bodies for attendance marks
//!
//! Templates are stored as `MessageTemplate` rows named
//! `attendance_<status>` and use Tera syntax with the placeholders
//! `studentName`, `parentName`, `date`, `status` and `schoolName`.

use super::model::AttendanceStatus;
use crate::core::error::ValidationError;
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use tera::{Context, Tera};

/// Name of the stored template used for a status
pub fn template_name(status: AttendanceStatus) -> String {
    format!("attendance_{}", status)
}

/// Body used when no stored template exists for the status
pub fn fallback_body(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Present => {
            "Dear {{ parentName }}, {{ studentName }} is present at {{ schoolName }} today ({{ date }})."
        }
        AttendanceStatus::Absent => {
            "Dear {{ parentName }}, {{ studentName }} is absent from {{ schoolName }} today ({{ date }}). Please contact the school if this is unexpected."
        }
        AttendanceStatus::Late => {
            "Dear {{ parentName }}, {{ studentName }} arrived late at {{ schoolName }} today ({{ date }})."
        }
        AttendanceStatus::Excused => {
            "Dear {{ parentName }}, {{ studentName }} has been marked excused at {{ schoolName }} for {{ date }}."
        }
    }
}

/// Values substituted into a template
#[derive(Debug, Clone)]
pub struct MessageContext<'a> {
    pub student_name: &'a str,
    pub parent_name: &'a str,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub school_name: &'a str,
}

impl MessageContext<'_> {
    fn to_tera(&self) -> Context {
        let mut context = Context::new();
        context.insert("studentName", self.student_name);
        context.insert("parentName", self.parent_name);
        context.insert("date", &self.date.format("%d-%m-%Y").to_string());
        context.insert("status", self.status.as_str());
        context.insert("schoolName", self.school_name);
        context
    }
}

/// Render a template body; autoescape is off since the output is plain text
pub fn render(body: &str, ctx: &MessageContext<'_>) -> Result<String> {
    Tera::one_off(body, &ctx.to_tera(), false)
        .map_err(|e| anyhow!("Failed to render message template: {}", e))
}

/// Reject template bodies Tera cannot parse
pub fn check_syntax(name: &str, body: &str) -> Result<(), ValidationError> {
    Tera::default()
        .add_raw_template(name, body)
        .map_err(|e| ValidationError::field("body", format!("invalid template: {}", e)))
}
