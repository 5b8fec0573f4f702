//! Admin reporting routes.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::db::orders::{Overview, SalesDay, TopProduct};
use crate::db::{OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::product::Product;
use crate::routes::{ok, Envelope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl WindowQuery {
    /// Default window: the last 30 days.
    fn resolve(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to.unwrap_or_else(Utc::now);
        let from = self.from.unwrap_or(to - Duration::days(30));
        if from >= to {
            return Err(AppError::Validation(
                "Report window must start before it ends".to_string(),
            ));
        }
        Ok((from, to))
    }
}

/// `GET /api/reports/sales` (admin)
pub async fn sales(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Envelope<Vec<SalesDay>>>> {
    let (from, to) = query.resolve()?;
    let days = OrderRepository::new(state.pool())
        .sales_by_day(from, to)
        .await?;
    Ok(ok("OK", days))
}

#[derive(Debug, Deserialize)]
pub struct TopProductsQuery {
    #[serde(flatten)]
    pub window: WindowQuery,
    pub limit: Option<i64>,
}

/// `GET /api/reports/top-products` (admin)
pub async fn top_products(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<TopProductsQuery>,
) -> Result<Json<Envelope<Vec<TopProduct>>>> {
    let (from, to) = query.window.resolve()?;
    let rows = OrderRepository::new(state.pool())
        .top_products(from, to, query.limit.unwrap_or(10))
        .await?;
    Ok(ok("OK", rows))
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

/// `GET /api/reports/low-stock` (admin)
pub async fn low_stock(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Envelope<Vec<Product>>>> {
    let threshold = query.threshold.unwrap_or(5);
    if threshold < 0 {
        return Err(AppError::Validation(
            "Threshold cannot be negative".to_string(),
        ));
    }
    let products = ProductRepository::new(state.pool())
        .low_stock(threshold)
        .await?;
    Ok(ok("OK", products))
}

/// `GET /api/reports/overview` (admin)
pub async fn overview(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Envelope<Overview>>> {
    let overview = OrderRepository::new(state.pool()).overview().await?;
    Ok(ok("OK", overview))
}
