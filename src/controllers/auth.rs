//! Login and credential management.
//!
//! A deployment has one operator secret (`ADMIN_TOKEN`). Logging in with it
//! mints a short-lived admin session; admin sessions in turn mint scoped API
//! keys for agents. An API key's plaintext is shown exactly once.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{authenticate, hash_api_key, require, Permission};
use crate::controllers::db_error;
use crate::models::ApiKeyResponse;
use crate::AppState;

/// The operator account that owns admin sessions.
const ADMIN_USER_ID: i64 = 1;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/auth/login").route(web::post().to(login)));
    cfg.service(web::resource("/api/auth/logout").route(web::post().to(logout)));
    cfg.service(
        web::resource("/api/keys")
            .route(web::post().to(create_key))
            .route(web::get().to(list_keys)),
    );
    cfg.service(web::resource("/api/keys/{id}").route(web::delete().to(revoke_key)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    admin_token: String,
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let expected = match &state.config.admin_token {
        Some(t) => t,
        None => {
            return HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "error": { "kind": "Unauthorized", "message": "Login is not configured" }
            }));
        }
    };
    if body.admin_token != *expected {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": { "kind": "Unauthorized", "message": "Invalid admin token" }
        }));
    }

    match state.db.create_session(ADMIN_USER_ID, &[Permission::Admin]) {
        Ok(session) => HttpResponse::Ok().json(serde_json::json!({
            "token": session.token,
            "expiresAt": session.expires_at,
        })),
        Err(e) => db_error("[auth] failed to create session", e),
    }
}

async fn logout(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").trim().to_string());

    match token {
        Some(t) => match state.db.delete_session(&t) {
            Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "loggedOut": true })),
            Err(e) => db_error("[auth] failed to delete session", e),
        },
        None => HttpResponse::Ok().json(serde_json::json!({ "loggedOut": false })),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyRequest {
    name: String,
    /// The agent account this key acts as. Defaults to the operator.
    user_id: Option<i64>,
    permissions: Vec<Permission>,
}

async fn create_key(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateKeyRequest>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Admin) {
        return resp;
    }
    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": { "kind": "MissingField", "message": "Missing required field 'name'" }
        }));
    }

    // Plaintext is handed out once and only its hash is stored.
    let plaintext = format!("vypr_{}", Uuid::new_v4().simple());
    let user_id = body.user_id.unwrap_or(ctx.user_id);

    match state
        .db
        .create_api_key(user_id, body.name.trim(), &hash_api_key(&plaintext), &body.permissions)
    {
        Ok(key) => {
            log::info!("[auth] issued api key {} for user {}", key.id, user_id);
            HttpResponse::Created().json(serde_json::json!({
                "key": plaintext,
                "apiKey": ApiKeyResponse::from(&key),
            }))
        }
        Err(e) => db_error("[auth] failed to create api key", e),
    }
}

async fn list_keys(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Admin) {
        return resp;
    }

    match state.db.list_api_keys() {
        Ok(keys) => {
            let responses: Vec<ApiKeyResponse> = keys.iter().map(ApiKeyResponse::from).collect();
            HttpResponse::Ok().json(responses)
        }
        Err(e) => db_error("[auth] failed to list api keys", e),
    }
}

async fn revoke_key(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Admin) {
        return resp;
    }

    match state.db.deactivate_api_key(path.into_inner()) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "revoked": true })),
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "error": { "kind": "NotFound", "message": "API key not found" }
        })),
        Err(e) => db_error("[auth] failed to revoke api key", e),
    }
}
