//! Review routes.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::json;

use clementine_core::{NotificationAudience, NotificationKind, ProductId, ReviewId};

use crate::db::notifications::NewNotification;
use crate::db::reviews::PublicReview;
use crate::db::{products, reviews, NotificationRepository, OrderRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::review::Review;
use crate::routes::{ok, ok_message, Envelope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub product_id: i32,
    pub rating: i32,
    pub title: Option<String>,
    #[serde(default)]
    pub comment: String,
}

/// `POST /api/reviews`
///
/// Only customers with a delivered order containing the product may review
/// it, once.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<CreateReviewRequest>,
) -> Result<Json<Envelope<Review>>> {
    if !(1..=5).contains(&body.rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let product_id = ProductId::new(body.product_id);
    let order_id = OrderRepository::new(state.pool())
        .delivered_order_with_product(identity.user_id, product_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation("Order must be delivered before you can review.".to_string())
        })?;

    let review = ReviewRepository::new(state.pool())
        .create(
            identity.user_id,
            product_id,
            order_id,
            body.rating,
            body.title.as_deref(),
            body.comment.trim(),
        )
        .await?;

    if let Err(e) = NotificationRepository::new(state.pool())
        .create(NewNotification {
            audience: NotificationAudience::Admin,
            user_id: None,
            kind: NotificationKind::ReviewSubmitted,
            title: "New review awaiting moderation",
            body: &format!("{}-star review for product #{}", review.rating, product_id),
            order_id: None,
            product_id: Some(product_id),
        })
        .await
    {
        tracing::warn!(error = %e, "failed to persist review notification");
    }
    state.notifier().emit_admin(
        "adminNotification",
        json!({
            "title": "New review awaiting moderation",
            "productId": product_id,
            "rating": review.rating,
        }),
    );

    Ok(ok("Review submitted for moderation", review))
}

/// `GET /api/products/{id}/reviews`
pub async fn list_for_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Vec<PublicReview>>>> {
    let reviews = ReviewRepository::new(state.pool())
        .public_for_product(ProductId::new(id))
        .await?;
    Ok(ok("OK", reviews))
}

/// `GET /api/reviews/mine`
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<Vec<Review>>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_user(identity.user_id)
        .await?;
    Ok(ok("OK", reviews))
}

/// `GET /api/reviews/pending` (admin)
pub async fn list_pending(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Envelope<Vec<Review>>>> {
    let reviews = ReviewRepository::new(state.pool()).pending().await?;
    Ok(ok("OK", reviews))
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub is_approved: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub is_abusive: bool,
}

const fn default_true() -> bool {
    true
}

/// `PUT /api/reviews/{id}/moderate` (admin)
///
/// Approving folds the rating into the product aggregate; revoking a prior
/// approval removes it again.
pub async fn moderate(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<ModerateRequest>,
) -> Result<Json<Envelope<Review>>> {
    let repo = ReviewRepository::new(state.pool());
    let before = repo
        .get(ReviewId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    // The verdict and the rating aggregate move in one commit.
    let mut tx = state
        .pool()
        .begin()
        .await
        .map_err(|e| AppError::Database(e.into()))?;
    let review = reviews::moderate(
        &mut tx,
        ReviewId::new(id),
        body.is_approved,
        body.is_visible,
        body.is_abusive,
    )
    .await?;

    let delta = match (before.is_approved, review.is_approved) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    };
    if delta != 0 {
        products::apply_rating(&mut tx, review.product_id, review.rating, delta).await?;
    }
    tx.commit()
        .await
        .map_err(|e| AppError::Database(e.into()))?;

    if let Err(e) = NotificationRepository::new(state.pool())
        .create(NewNotification {
            audience: NotificationAudience::Customer,
            user_id: Some(review.user_id),
            kind: NotificationKind::ReviewModerated,
            title: if review.is_approved {
                "Your review was published"
            } else {
                "Your review was not published"
            },
            body: "",
            order_id: None,
            product_id: Some(review.product_id),
        })
        .await
    {
        tracing::warn!(error = %e, "failed to persist moderation notification");
    }
    state.notifier().emit_customer(
        review.user_id,
        "customerNotification",
        json!({
            "title": "Review moderated",
            "approved": review.is_approved,
            "productId": review.product_id,
        }),
    );

    Ok(ok("Review moderated", review))
}

/// `DELETE /api/reviews/{id}`
///
/// Owners can delete their own review; admins any. An approved review's
/// rating is unwound from the product aggregate first.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    let repo = ReviewRepository::new(state.pool());
    let review = repo
        .get(ReviewId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    if review.user_id != identity.user_id && !identity.is_admin() {
        return Err(AppError::NotFound("Review not found".to_string()));
    }

    let mut tx = state
        .pool()
        .begin()
        .await
        .map_err(|e| AppError::Database(e.into()))?;
    if review.is_approved {
        products::apply_rating(&mut tx, review.product_id, review.rating, -1).await?;
    }
    reviews::delete(&mut tx, review.id).await?;
    tx.commit()
        .await
        .map_err(|e| AppError::Database(e.into()))?;
    Ok(ok_message("Review deleted"))
}
