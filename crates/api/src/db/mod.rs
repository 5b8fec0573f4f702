//! Database operations for the Clementine `PostgreSQL` database.
//!
//! One repository module per aggregate:
//!
//! - `users` - accounts, addresses, settings
//! - `products` / `categories` - catalog
//! - `carts` - active cart + save-for-later bucket
//! - `orders` - orders, status transitions, report aggregates
//! - `reviews` - reviews and moderation
//! - `coupons` - coupon CRUD and atomic redemption
//! - `notifications` - persisted notification records
//!
//! Queries use runtime `sqlx::query`/`query_as` with `FromRow` row types that
//! convert into domain types via `TryFrom`, so the workspace builds without a
//! live database. Multi-statement sequences (checkout, cancellation) take a
//! `&mut PgConnection` and run inside one transaction owned by the caller.
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p clementine-cli -- migrate
//! ```

pub mod carts;
pub mod categories;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use coupons::CouponRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The requested row does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be converted into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl RepositoryError {
    /// Map a sqlx error, turning unique violations into `Conflict`.
    pub(crate) fn from_unique(e: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict_message.to_owned());
        }
        Self::Database(e)
    }
}

/// Parse a stored enum text column into its domain enum.
pub(crate) fn parse_enum<T: std::str::FromStr<Err = String>>(
    value: &str,
) -> Result<T, RepositoryError> {
    value
        .parse()
        .map_err(|e: String| RepositoryError::DataCorruption(e))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
