use chrono::{DateTime, Utc};

use crate::auth::Permission;

/// A browser/API session. Tokens are opaque UUIDs with a fixed 24h expiry.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
