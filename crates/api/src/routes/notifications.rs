//! Notification feed routes.
//!
//! Admins operate on the shared admin feed, customers on their own rows; the
//! same endpoints serve both, scoped by the caller's role.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use clementine_core::{NotificationAudience, NotificationId, UserId};

use crate::db::NotificationRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::notification::Notification;
use crate::routes::{ok, ok_message, Envelope};
use crate::services::auth::AuthenticatedUser;
use crate::state::AppState;

fn scope(identity: AuthenticatedUser) -> (NotificationAudience, Option<UserId>) {
    if identity.is_admin() {
        (NotificationAudience::Admin, None)
    } else {
        (NotificationAudience::Customer, Some(identity.user_id))
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// `GET /api/notifications`
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Envelope<Vec<Notification>>>> {
    let repo = NotificationRepository::new(state.pool());
    let limit = query.limit.unwrap_or(50);
    let notifications = if identity.is_admin() {
        repo.list_for_admin(limit).await?
    } else {
        repo.list_for_user(identity.user_id, limit).await?
    };
    Ok(ok("OK", notifications))
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

/// `GET /api/notifications/unread-count`
pub async fn unread_count(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<UnreadCount>>> {
    let (audience, user_id) = scope(identity);
    let unread = NotificationRepository::new(state.pool())
        .unread_count(audience, user_id)
        .await?;
    Ok(ok("OK", UnreadCount { unread }))
}

/// `PUT /api/notifications/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    let (audience, user_id) = scope(identity);
    NotificationRepository::new(state.pool())
        .mark_read(NotificationId::new(id), audience, user_id)
        .await?;
    Ok(ok_message("Marked read"))
}

/// `PUT /api/notifications/read-all`
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<()>>> {
    let (audience, user_id) = scope(identity);
    NotificationRepository::new(state.pool())
        .mark_all_read(audience, user_id)
        .await?;
    Ok(ok_message("All notifications marked read"))
}

/// `DELETE /api/notifications/{id}`
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    let (audience, user_id) = scope(identity);
    NotificationRepository::new(state.pool())
        .delete(NotificationId::new(id), audience, user_id)
        .await?;
    Ok(ok_message("Notification deleted"))
}
