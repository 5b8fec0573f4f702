//! Category routes.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use clementine_core::CategoryId;

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::category::Category;
use crate::routes::{ok, ok_message, Envelope};
use crate::state::AppState;

/// `GET /api/categories`
pub async fn list(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Category>>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(ok("OK", categories))
}

/// `GET /api/categories/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Category>>> {
    let category = CategoryRepository::new(state.pool())
        .get(CategoryId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
    Ok(ok("OK", category))
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub slug: Option<String>,
    pub parent_id: Option<i32>,
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

impl CategoryRequest {
    fn validate(&self) -> Result<(&str, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        let slug = self
            .slug
            .as_deref()
            .map_or_else(|| slugify(name), |s| slugify(s));
        if slug.is_empty() {
            return Err(AppError::Validation("Slug is required".to_string()));
        }
        Ok((name, slug))
    }
}

/// `POST /api/categories` (admin)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<Envelope<Category>>> {
    let (name, slug) = body.validate()?;
    let category = CategoryRepository::new(state.pool())
        .create(name, &slug, body.parent_id.map(CategoryId::new))
        .await?;
    Ok(ok("Category created", category))
}

/// `PUT /api/categories/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<Envelope<Category>>> {
    let (name, slug) = body.validate()?;
    if body.parent_id == Some(id) {
        return Err(AppError::Validation(
            "A category cannot be its own parent".to_string(),
        ));
    }
    let category = CategoryRepository::new(state.pool())
        .update(
            CategoryId::new(id),
            name,
            &slug,
            body.parent_id.map(CategoryId::new),
        )
        .await?;
    Ok(ok("Category updated", category))
}

/// `DELETE /api/categories/{id}` (admin)
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    let deleted = CategoryRepository::new(state.pool())
        .delete(CategoryId::new(id))
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Category not found".to_string()));
    }
    Ok(ok_message("Category deleted"))
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Home & Garden"), "home-garden");
        assert_eq!(slugify("  Électronique!  "), "lectronique");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }
}
