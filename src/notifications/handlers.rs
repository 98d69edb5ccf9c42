//! HTTP handlers for in-app notifications

use super::model::Notification;
use crate::core::error::{CampusResult, EntityError};
use crate::core::query::{ListParams, PaginatedResponse, filter_items};
use crate::core::{ValidatedJson, parse_id};
use crate::server::host::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// `GET /api/notifications?recipientId=&unread=true`, newest first
pub async fn list_notifications(
    State(host): State<AppState>,
    Query(mut query): Query<HashMap<String, String>>,
) -> CampusResult<Json<PaginatedResponse<Notification>>> {
    let unread_only = query
        .remove("unread")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let (params, mut filters) = ListParams::from_query(query)?;
    if unread_only {
        filters.push(("read".to_string(), "false".to_string()));
    }

    let mut items = filter_items(host.notifications.list().await?, &filters)?;
    items.reverse();
    Ok(Json(params.paginate(items)))
}

/// `PATCH /api/notifications/{id}/read`
pub async fn mark_read(
    State(host): State<AppState>,
    Path(id): Path<String>,
) -> CampusResult<Json<Notification>> {
    let id = parse_id("id", &id)?;
    let mut notification = host
        .notifications
        .get(&id)
        .await?
        .ok_or_else(|| EntityError::not_found("notification", id))?;

    if notification.mark_read() {
        notification = host.notifications.update(&id, notification).await?;
    }
    Ok(Json(notification))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReadAllRequest {
    #[serde(default)]
    pub recipient_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub updated: usize,
}

/// `POST /api/notifications/read-all`
pub async fn mark_all_read(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<ReadAllRequest>,
) -> CampusResult<Json<ReadAllResponse>> {
    let recipient_id = parse_id(
        "recipientId",
        request.recipient_id.as_deref().unwrap_or_default(),
    )?;

    let mut updated = 0;
    for mut notification in host
        .notifications
        .search("recipient_id", &recipient_id.to_string())
        .await?
    {
        if notification.mark_read() {
            let id = notification.id;
            host.notifications.update(&id, notification).await?;
            updated += 1;
        }
    }

    tracing::info!(recipient_id = %recipient_id, updated, "Marked notifications read");
    Ok(Json(ReadAllResponse { updated }))
}
