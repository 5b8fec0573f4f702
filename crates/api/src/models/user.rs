//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clementine_core::{AddressId, Email, UserId, UserRole};

/// A platform user (customer or admin).
///
/// The password hash never leaves the `db` layer; this type is safe to
/// serialize into API responses.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    /// Set for accounts created through Google sign-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    pub theme: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's shipping address.
///
/// At most one address per user carries `is_default`; the repository clears
/// the previous default in the same transaction that sets a new one.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub recipient: String,
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
