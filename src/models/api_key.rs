use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Permission;

/// An issued API key. Only the SHA-256 hash of the key material is stored;
/// the plaintext is returned exactly once at creation time.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub key_hash: String,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Wire shape for listing keys. The hash stays server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(k: &ApiKey) -> Self {
        Self {
            id: k.id,
            user_id: k.user_id,
            name: k.name.clone(),
            permissions: k.permissions.clone(),
            is_active: k.is_active,
            last_used_at: k.last_used_at,
            created_at: k.created_at,
        }
    }
}
