//! Category domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clementine_core::CategoryId;

/// A hierarchical catalog tag. No cycle detection is performed on
/// `parent_id`; the admin UI only offers top-level categories as parents.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
}
