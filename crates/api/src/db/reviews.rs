//! Review repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use clementine_core::{OrderId, ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::review::Review;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    order_id: i32,
    rating: i32,
    title: Option<String>,
    comment: String,
    is_approved: bool,
    is_visible: bool,
    is_abusive: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            order_id: OrderId::new(row.order_id),
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            is_approved: row.is_approved,
            is_visible: row.is_visible,
            is_abusive: row.is_abusive,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A public review joined with the author's display name.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublicReview {
    #[serde(flatten)]
    pub review: Review,
    pub author: String,
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a review. The delivered-order gate has already been checked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed this
    /// product.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        order_id: OrderId,
        rating: i32,
        title: Option<&str>,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let row: ReviewRow = sqlx::query_as(
            "INSERT INTO reviews (user_id, product_id, order_id, rating, title, comment) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .bind(order_id.as_i32())
        .bind(rating)
        .bind(title)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "You have already reviewed this product"))?;

        Ok(Review::from(row))
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row: Option<ReviewRow> = sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Review::from))
    }

    /// Public reviews for a product page: approved, visible, not abusive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn public_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<PublicReview>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Joined {
            #[sqlx(flatten)]
            review: ReviewRow,
            author: String,
        }

        let rows: Vec<Joined> = sqlx::query_as(
            "SELECT r.*, u.name AS author FROM reviews r \
             JOIN users u ON u.id = r.user_id \
             WHERE r.product_id = $1 AND r.is_approved AND r.is_visible AND NOT r.is_abusive \
             ORDER BY r.created_at DESC",
        )
        .bind(product_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|j| PublicReview {
                review: Review::from(j.review),
                author: j.author,
            })
            .collect())
    }

    /// A user's own reviews, whatever their moderation state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Review>, RepositoryError> {
        let rows: Vec<ReviewRow> =
            sqlx::query_as("SELECT * FROM reviews WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id.as_i32())
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    /// Reviews awaiting moderation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending(&self) -> Result<Vec<Review>, RepositoryError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT * FROM reviews WHERE NOT is_approved AND NOT is_abusive ORDER BY created_at",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

}

/// Write a moderation verdict inside the caller's transaction, so the
/// product rating aggregate moves in the same commit. Returns the updated
/// review.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the review doesn't exist.
pub async fn moderate(
    conn: &mut PgConnection,
    id: ReviewId,
    is_approved: bool,
    is_visible: bool,
    is_abusive: bool,
) -> Result<Review, RepositoryError> {
    let row: Option<ReviewRow> = sqlx::query_as(
        "UPDATE reviews SET is_approved = $2, is_visible = $3, is_abusive = $4, \
         updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id.as_i32())
    .bind(is_approved)
    .bind(is_visible)
    .bind(is_abusive)
    .fetch_optional(conn)
    .await?;

    row.map(Review::from).ok_or(RepositoryError::NotFound)
}

/// Delete a review inside the caller's transaction. The caller unwinds the
/// rating aggregate in the same transaction if the review was approved.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete(conn: &mut PgConnection, id: ReviewId) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id.as_i32())
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
