//! Product repository: catalog queries, stock mutation, rating aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use clementine_core::{CategoryId, ProductId};

use super::RepositoryError;
use crate::models::product::Product;

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    compare_price: Option<Decimal>,
    category_id: Option<i32>,
    stock: i32,
    images: Vec<String>,
    rating_avg: Decimal,
    rating_count: i32,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            compare_price: row.compare_price,
            category_id: row.category_id.map(CategoryId::new),
            stock: row.stock,
            images: row.images,
            rating_avg: row.rating_avg,
            rating_count: row.rating_count,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Catalog listing filters.
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring match on name/description.
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    /// Non-admins only ever see active products.
    pub include_inactive: bool,
    pub sort: ProductSort,
    pub page: i64,
    pub per_page: i64,
}

/// Catalog sort orders.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
}

impl ProductSort {
    const fn order_clause(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC",
            Self::PriceAsc => "price ASC",
            Self::PriceDesc => "price DESC",
            Self::Rating => "rating_avg DESC, rating_count DESC",
        }
    }
}

/// New-product parameters.
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter, newest first by default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let per_page = filter.per_page.clamp(1, 100);
        let offset = (filter.page.max(1) - 1) * per_page;

        let sql = format!(
            "SELECT * FROM products \
             WHERE (is_active OR $1) \
               AND ($2::int IS NULL OR category_id = $2) \
               AND ($3::text IS NULL OR name ILIKE $3 OR description ILIKE $3) \
               AND ($4::numeric IS NULL OR price >= $4) \
               AND ($5::numeric IS NULL OR price <= $5) \
               AND ($6::bool IS NULL OR is_featured = $6) \
             ORDER BY {} LIMIT $7 OFFSET $8",
            filter.sort.order_clause()
        );

        let pattern = filter
            .search
            .as_ref()
            .map(|s| format!("%{}%", s.replace(['%', '_'], "")));

        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(filter.include_inactive)
            .bind(filter.category_id.map(CategoryId::as_i32))
            .bind(pattern)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.featured)
            .bind(per_page)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, new: NewProduct<'_>) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(
            "INSERT INTO products \
             (name, description, price, compare_price, category_id, stock, is_active, is_featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(new.name)
        .bind(new.description)
        .bind(new.price)
        .bind(new.compare_price)
        .bind(new.category_id.map(CategoryId::as_i32))
        .bind(new.stock)
        .bind(new.is_active)
        .bind(new.is_featured)
        .fetch_one(self.pool)
        .await?;

        Ok(Product::from(row))
    }

    /// Update a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        new: NewProduct<'_>,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "UPDATE products SET name = $2, description = $3, price = $4, compare_price = $5, \
             category_id = $6, stock = $7, is_active = $8, is_featured = $9, updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id.as_i32())
        .bind(new.name)
        .bind(new.description)
        .bind(new.price)
        .bind(new.compare_price)
        .bind(new.category_id.map(CategoryId::as_i32))
        .bind(new.stock)
        .bind(new.is_active)
        .bind(new.is_featured)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// # Returns
    ///
    /// Returns `true` if the product was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Adjust stock by a signed delta, guarded against going negative.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the adjustment would drive
    /// stock below zero, `RepositoryError::NotFound` if the product doesn't
    /// exist.
    pub async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "UPDATE products SET stock = stock + $2, updated_at = now() \
             WHERE id = $1 AND stock + $2 >= 0 RETURNING *",
        )
        .bind(id.as_i32())
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(Product::from(row)),
            None => {
                if self.get(id).await?.is_some() {
                    Err(RepositoryError::Conflict(
                        "Stock adjustment would drive stock negative".to_owned(),
                    ))
                } else {
                    Err(RepositoryError::NotFound)
                }
            }
        }
    }

    /// Append an image path to a product's image list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn add_image(&self, id: ProductId, path: &str) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "UPDATE products SET images = array_append(images, $2), updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id.as_i32())
        .bind(path)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    /// Products at or below a stock threshold (admin report).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT * FROM products WHERE is_active AND stock <= $1 ORDER BY stock ASC",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

// =============================================================================
// Transaction-scoped helpers (checkout, cancellation, moderation)
// =============================================================================

/// Decrement stock inside a checkout transaction, guarded so the row is only
/// touched when enough stock remains.
///
/// Returns `false` when stock was insufficient; the caller aborts the
/// transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = now() \
         WHERE id = $1 AND stock >= $2",
    )
    .bind(product_id.as_i32())
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Return stock to inventory inside a cancellation transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restore_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1")
        .bind(product_id.as_i32())
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fold an approved review's rating into the product aggregate
/// (`delta_count` +1) or remove it again (`delta_count` -1).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn apply_rating(
    conn: &mut PgConnection,
    product_id: ProductId,
    rating: i32,
    delta_count: i32,
) -> Result<(), RepositoryError> {
    // rating_avg is recomputed from the stored sum implied by avg*count, so
    // repeated approve/unapprove cycles stay consistent.
    sqlx::query(
        "UPDATE products SET \
           rating_avg = CASE WHEN rating_count + $3 <= 0 THEN 0 \
             ELSE ROUND((rating_avg * rating_count + $2 * $3)::numeric / (rating_count + $3), 2) \
           END, \
           rating_count = GREATEST(rating_count + $3, 0), \
           updated_at = now() \
         WHERE id = $1",
    )
    .bind(product_id.as_i32())
    .bind(rating)
    .bind(delta_count)
    .execute(conn)
    .await?;
    Ok(())
}
