//! HTTP handlers for attendance marks and the guardian message log

use super::model::{
    Attendance, AttendanceSource, AttendanceStatus, MarkOutcome, StaffAttendance,
};
use super::template::{MessageContext, fallback_body, render, template_name};
use crate::core::error::{CampusResult, EntityError, ValidationError};
use crate::core::query::{ListParams, PaginatedResponse, filter_items};
use crate::core::{ValidatedJson, parse_id};
use crate::notifications::model::WhatsAppMessage;
use crate::server::host::{AppState, ServerHost};
use anyhow::Result;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

/// A mark plus whether this request created it
#[derive(Debug, Serialize)]
pub struct MarkResponse<T> {
    #[serde(flatten)]
    pub record: T,
    pub created: bool,
}

fn respond<T>(outcome: MarkOutcome<T>) -> (StatusCode, Json<MarkResponse<T>>) {
    let created = outcome.is_created();
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(MarkResponse {
            record: outcome.into_record(),
            created,
        }),
    )
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    pub student_id: Uuid,
    /// Defaults to today at the school
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
    pub subject_id: Option<Uuid>,
    pub marked_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BiometricRequest {
    #[validate(length(min = 1, max = 64))]
    pub biometric_id: String,
    #[validate(length(max = 64))]
    pub device_id: Option<String>,
    /// Device clock reading; defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

/// Render and record the guardian message for a new student mark
async fn notify_guardian(host: &ServerHost, record: &Attendance) -> Result<Option<WhatsAppMessage>> {
    let Some(student) = host.resources.students.get(&record.student_id).await? else {
        return Ok(None);
    };
    let parent = match student.parent_id {
        Some(parent_id) => host.resources.parents.get(&parent_id).await?,
        None => None,
    };
    let Some(parent) = parent.filter(|p| !p.phone.trim().is_empty()) else {
        tracing::info!(student_id = %student.id, "No guardian phone on file, skipping message");
        return Ok(None);
    };

    let name = template_name(record.status);
    let stored = host
        .resources
        .templates
        .search("name", &name)
        .await?
        .into_iter()
        .next();
    let template_body = stored
        .as_ref()
        .map(|t| t.body.as_str())
        .unwrap_or_else(|| fallback_body(record.status));

    let body = render(
        template_body,
        &MessageContext {
            student_name: &student.name,
            parent_name: &parent.name,
            date: record.date,
            status: record.status,
            school_name: &host.config.school.name,
        },
    )?;

    let message = host
        .messages
        .create(WhatsAppMessage::sent(
            parent.phone.clone(),
            Some(student.id),
            name,
            body,
        ))
        .await?;
    tracing::info!(
        student_id = %student.id,
        message_id = %message.id,
        template = %message.template_name,
        "Recorded guardian message"
    );
    Ok(Some(message))
}

async fn mark_student(host: &ServerHost, record: Attendance) -> CampusResult<MarkOutcome<Attendance>> {
    let outcome = host.attendance.mark_student(record).await?;

    if let MarkOutcome::Created(record) = &outcome {
        tracing::info!(
            student_id = %record.student_id,
            date = %record.date,
            status = %record.status,
            source = %record.source,
            "Marked attendance"
        );
        // The mark stands even when the message cannot be produced
        if let Err(e) = notify_guardian(host, record).await {
            tracing::warn!(student_id = %record.student_id, error = %e, "Guardian message failed");
        }
    }
    Ok(outcome)
}

/// `POST /api/attendance`
pub async fn create_attendance(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<MarkAttendanceRequest>,
) -> CampusResult<(StatusCode, Json<MarkResponse<Attendance>>)> {
    if host.resources.students.get(&request.student_id).await?.is_none() {
        return Err(EntityError::not_found("student", request.student_id).into());
    }

    let record = Attendance::new(
        request.student_id,
        request.date.unwrap_or_else(|| host.today()),
        request.status,
        request.subject_id,
        AttendanceSource::Manual,
        request.marked_by,
        None,
        None,
    );
    Ok(respond(mark_student(&host, record).await?))
}

/// School-local date of a device timestamp
fn school_date(host: &ServerHost, at: DateTime<Utc>) -> CampusResult<NaiveDate> {
    host.config.school.local_date(at).ok_or_else(|| {
        ValidationError::field("timestamp", format!("{} is out of range", at)).into()
    })
}

/// `POST /api/attendance/biometric`
pub async fn biometric_attendance(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<BiometricRequest>,
) -> CampusResult<(StatusCode, Json<MarkResponse<Attendance>>)> {
    let student = host
        .resources
        .student_by_biometric(&request.biometric_id)
        .await?
        .ok_or_else(|| EntityError::UnknownBiometricId {
            entity_type: "student".to_string(),
            biometric_id: request.biometric_id.clone(),
        })?;

    let at = request.timestamp.unwrap_or_else(Utc::now);
    let record = Attendance::new(
        student.id,
        school_date(&host, at)?,
        AttendanceStatus::Present,
        None,
        AttendanceSource::Biometric,
        None,
        Some(at),
        request.device_id,
    );
    Ok(respond(mark_student(&host, record).await?))
}

/// `GET /api/attendance?studentId=&date=&classId=&limit=&offset=`
pub async fn list_attendance(
    State(host): State<AppState>,
    Query(mut query): Query<HashMap<String, String>>,
) -> CampusResult<Json<PaginatedResponse<Attendance>>> {
    let class_students = match query.remove("classId") {
        Some(raw) => {
            let class_id = parse_id("classId", &raw)?;
            let ids: HashSet<Uuid> = host
                .resources
                .students
                .search("class_id", &class_id.to_string())
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect();
            Some(ids)
        }
        None => None,
    };
    let (params, filters) = ListParams::from_query(query)?;

    let mut items = filter_items(host.attendance.list_student().await?, &filters)?;
    if let Some(ids) = class_students {
        items.retain(|a| ids.contains(&a.student_id));
    }
    Ok(Json(params.paginate(items)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkStaffRequest {
    pub staff_id: Uuid,
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
}

async fn mark_staff(
    host: &ServerHost,
    record: StaffAttendance,
) -> CampusResult<MarkOutcome<StaffAttendance>> {
    let outcome = host.attendance.mark_staff(record).await?;
    if let MarkOutcome::Created(record) = &outcome {
        tracing::info!(
            staff_id = %record.staff_id,
            date = %record.date,
            status = %record.status,
            "Marked staff attendance"
        );
    }
    Ok(outcome)
}

/// `POST /api/staff-attendance`
pub async fn create_staff_attendance(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<MarkStaffRequest>,
) -> CampusResult<(StatusCode, Json<MarkResponse<StaffAttendance>>)> {
    if host.resources.staff.get(&request.staff_id).await?.is_none() {
        return Err(EntityError::not_found("staff", request.staff_id).into());
    }

    let record = StaffAttendance::new(
        request.staff_id,
        request.date.unwrap_or_else(|| host.today()),
        request.status,
        AttendanceSource::Manual,
        None,
        None,
    );
    Ok(respond(mark_staff(&host, record).await?))
}

/// `POST /api/staff-attendance/biometric`
pub async fn biometric_staff_attendance(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<BiometricRequest>,
) -> CampusResult<(StatusCode, Json<MarkResponse<StaffAttendance>>)> {
    let staff = host
        .resources
        .staff_by_biometric(&request.biometric_id)
        .await?
        .ok_or_else(|| EntityError::UnknownBiometricId {
            entity_type: "staff".to_string(),
            biometric_id: request.biometric_id.clone(),
        })?;

    let at = request.timestamp.unwrap_or_else(Utc::now);
    let record = StaffAttendance::new(
        staff.id,
        school_date(&host, at)?,
        AttendanceStatus::Present,
        AttendanceSource::Biometric,
        Some(at),
        request.device_id,
    );
    Ok(respond(mark_staff(&host, record).await?))
}

/// `GET /api/staff-attendance?staffId=&date=`
pub async fn list_staff_attendance(
    State(host): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> CampusResult<Json<PaginatedResponse<StaffAttendance>>> {
    let (params, filters) = ListParams::from_query(query)?;
    let items = filter_items(host.attendance.list_staff().await?, &filters)?;
    Ok(Json(params.paginate(items)))
}

/// `GET /api/whatsapp-messages?studentId=`, newest first
pub async fn list_messages(
    State(host): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> CampusResult<Json<PaginatedResponse<WhatsAppMessage>>> {
    let (params, filters) = ListParams::from_query(query)?;
    let mut items = filter_items(host.messages.list().await?, &filters)?;
    items.reverse();
    Ok(Json(params.paginate(items)))
}
