//! Authentication gate.
//!
//! Resolves an [`AuthContext`] (user id + permission set) from an inbound
//! request. The core payment path never reads ambient request state; every
//! operation takes the resolved context as an explicit argument.
//!
//! Two credential shapes share the `Authorization: Bearer <...>` header:
//! session tokens (issued by the login endpoint) and API keys (stored as
//! SHA-256 hashes). Sessions are tried first because they are the hot path
//! for the dashboard.

use actix_web::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, EnumString};

use crate::db::Database;

/// Capabilities a caller can hold. Stored as a comma-separated TEXT list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
pub enum Permission {
    #[strum(serialize = "read")]
    #[serde(rename = "read")]
    Read,
    #[strum(serialize = "transact")]
    #[serde(rename = "transact")]
    Transact,
    #[strum(serialize = "admin")]
    #[serde(rename = "admin")]
    Admin,
}

/// Parse a comma-separated permission list, ignoring unknown entries.
pub fn parse_permissions(csv: &str) -> Vec<Permission> {
    csv.split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}

/// Serialize a permission list for storage.
pub fn permissions_to_csv(perms: &[Permission]) -> String {
    perms
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// The authenticated caller, passed explicitly into every core operation.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub permissions: Vec<Permission>,
}

impl AuthContext {
    pub fn has(&self, perm: Permission) -> bool {
        // Admin implies everything.
        self.permissions.contains(&perm) || self.permissions.contains(&Permission::Admin)
    }
}

/// SHA-256 hex digest of an API key's plaintext.
pub fn hash_api_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the caller from the request, or produce the error response to
/// return as-is.
pub fn authenticate(db: &Database, req: &HttpRequest) -> Result<AuthContext, HttpResponse> {
    let token = match bearer_token(req) {
        Some(t) => t,
        None => {
            return Err(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": { "kind": "Unauthorized", "message": "No authorization token provided" }
            })));
        }
    };

    // Session token first, then API key.
    match db.validate_session(&token) {
        Ok(Some(session)) => {
            return Ok(AuthContext {
                user_id: session.user_id,
                permissions: session.permissions,
            });
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("[auth] session lookup failed: {}", e);
            return Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": { "kind": "InternalError", "message": "Internal server error" }
            })));
        }
    }

    let key_hash = hash_api_key(&token);
    match db.find_active_api_key(&key_hash) {
        Ok(Some(key)) => {
            if let Err(e) = db.touch_api_key(key.id) {
                log::warn!("[auth] failed to update last_used_at for key {}: {}", key.id, e);
            }
            Ok(AuthContext {
                user_id: key.user_id,
                permissions: key.permissions,
            })
        }
        Ok(None) => Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": { "kind": "Unauthorized", "message": "Invalid or expired credentials" }
        }))),
        Err(e) => {
            log::error!("[auth] api key lookup failed: {}", e);
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": { "kind": "InternalError", "message": "Internal server error" }
            })))
        }
    }
}

/// Check a permission on an already-resolved context, or produce the 403.
pub fn require(ctx: &AuthContext, perm: Permission) -> Result<(), HttpResponse> {
    if ctx.has(perm) {
        Ok(())
    } else {
        Err(HttpResponse::Forbidden().json(serde_json::json!({
            "error": {
                "kind": "Unauthorized",
                "message": format!("Missing '{}' permission", perm.as_ref())
            }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_csv_round_trip() {
        let perms = vec![Permission::Read, Permission::Transact];
        let csv = permissions_to_csv(&perms);
        assert_eq!(csv, "read,transact");
        assert_eq!(parse_permissions(&csv), perms);
    }

    #[test]
    fn test_parse_ignores_unknown() {
        assert_eq!(parse_permissions("read, bogus ,admin"), vec![Permission::Read, Permission::Admin]);
    }

    #[test]
    fn test_admin_implies_all() {
        let ctx = AuthContext { user_id: 1, permissions: vec![Permission::Admin] };
        assert!(ctx.has(Permission::Read));
        assert!(ctx.has(Permission::Transact));

        let ctx = AuthContext { user_id: 2, permissions: vec![Permission::Read] };
        assert!(!ctx.has(Permission::Transact));
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let h = hash_api_key("vypr_test_key");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_api_key("vypr_test_key"));
        assert_ne!(h, hash_api_key("vypr_test_key2"));
    }
}
