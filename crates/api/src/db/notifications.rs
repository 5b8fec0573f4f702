//! Notification repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use clementine_core::{
    NotificationAudience, NotificationId, NotificationKind, OrderId, ProductId, UserId,
};

use super::{parse_enum, RepositoryError};
use crate::models::notification::Notification;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i32,
    audience: String,
    user_id: Option<i32>,
    kind: String,
    title: String,
    body: String,
    order_id: Option<i32>,
    product_id: Option<i32>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepositoryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: NotificationId::new(row.id),
            audience: parse_enum::<NotificationAudience>(&row.audience)?,
            user_id: row.user_id.map(UserId::new),
            kind: parse_enum::<NotificationKind>(&row.kind)?,
            title: row.title,
            body: row.body,
            order_id: row.order_id.map(OrderId::new),
            product_id: row.product_id.map(ProductId::new),
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

/// New-notification parameters.
pub struct NewNotification<'a> {
    pub audience: NotificationAudience,
    pub user_id: Option<UserId>,
    pub kind: NotificationKind,
    pub title: &'a str,
    pub body: &'a str,
    pub order_id: Option<OrderId>,
    pub product_id: Option<ProductId>,
}

/// Repository for notification database operations.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        new: NewNotification<'_>,
    ) -> Result<Notification, RepositoryError> {
        let row: NotificationRow = sqlx::query_as(
            "INSERT INTO notifications (audience, user_id, kind, title, body, order_id, product_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(new.audience.to_string())
        .bind(new.user_id.map(UserId::as_i32))
        .bind(new.kind.to_string())
        .bind(new.title)
        .bind(new.body)
        .bind(new.order_id.map(OrderId::as_i32))
        .bind(new.product_id.map(ProductId::as_i32))
        .fetch_one(self.pool)
        .await?;

        Notification::try_from(row)
    }

    /// The admin feed, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_admin(&self, limit: i64) -> Result<Vec<Notification>, RepositoryError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE audience = 'admin' \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit.clamp(1, 200))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// A customer's own feed, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE audience = 'customer' AND user_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id.as_i32())
        .bind(limit.clamp(1, 200))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Unread count for the badge.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(
        &self,
        audience: NotificationAudience,
        user_id: Option<UserId>,
    ) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications \
             WHERE audience = $1 AND ($2::int IS NULL OR user_id = $2) AND NOT is_read",
        )
        .bind(audience.to_string())
        .bind(user_id.map(UserId::as_i32))
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one notification read, scoped so customers can only touch their
    /// own rows and admins only the admin feed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row matched.
    pub async fn mark_read(
        &self,
        id: NotificationId,
        audience: NotificationAudience,
        user_id: Option<UserId>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE \
             WHERE id = $1 AND audience = $2 AND ($3::int IS NULL OR user_id = $3)",
        )
        .bind(id.as_i32())
        .bind(audience.to_string())
        .bind(user_id.map(UserId::as_i32))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark a whole feed read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(
        &self,
        audience: NotificationAudience,
        user_id: Option<UserId>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE \
             WHERE audience = $1 AND ($2::int IS NULL OR user_id = $2) AND NOT is_read",
        )
        .bind(audience.to_string())
        .bind(user_id.map(UserId::as_i32))
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete a notification from a feed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row matched.
    pub async fn delete(
        &self,
        id: NotificationId,
        audience: NotificationAudience,
        user_id: Option<UserId>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE id = $1 AND audience = $2 AND ($3::int IS NULL OR user_id = $3)",
        )
        .bind(id.as_i32())
        .bind(audience.to_string())
        .bind(user_id.map(UserId::as_i32))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
