//! Service marketplace endpoints: publish, browse, execute.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::auth::{authenticate, require, Permission};
use crate::controllers::{db_error, payment_error};
use crate::db::tables::NewService;
use crate::models::{AuthMethod, RequestField, ServiceResponse};
use crate::payments::{ExecuteServiceRequest, PaymentError};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/services")
            .route(web::post().to(create_service))
            .route(web::get().to(list_services)),
    );
    cfg.service(web::resource("/api/services/execute").route(web::post().to(execute_service)));
    cfg.service(web::resource("/api/services/{id}").route(web::delete().to(deactivate_service)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateServiceRequest {
    wallet_id: i64,
    name: String,
    description: Option<String>,
    price_per_request: String,
    category: Option<String>,
    api_endpoint: Option<String>,
    api_method: Option<String>,
    auth_method: Option<AuthMethod>,
    auth_secret: Option<String>,
    auth_username: Option<String>,
    auth_header_name: Option<String>,
    #[serde(default)]
    request_fields: Vec<RequestField>,
}

async fn create_service(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateServiceRequest>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Transact) {
        return resp;
    }

    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": { "kind": "MissingField", "message": "Missing required field 'name'" }
        }));
    }
    let price = match Decimal::from_str(&body.price_per_request) {
        Ok(p) if p > Decimal::ZERO => p,
        _ => {
            return payment_error(&PaymentError::InvalidAmount {
                reason: format!("'{}' is not a valid price", body.price_per_request),
            });
        }
    };

    // The earning wallet must be the caller's own active wallet.
    let wallet = match state.db.get_wallet(body.wallet_id) {
        Ok(Some(w)) => w,
        Ok(None) => return payment_error(&PaymentError::WalletNotFound),
        Err(e) => return db_error("[services] wallet lookup failed", e),
    };
    if wallet.user_id != ctx.user_id && !ctx.has(Permission::Admin) {
        return payment_error(&PaymentError::Unauthorized);
    }
    if !wallet.is_active {
        return payment_error(&PaymentError::WalletNotFound);
    }

    let new = NewService {
        wallet_id: wallet.id,
        name: body.name.trim().to_string(),
        description: body.description.clone().unwrap_or_default(),
        price_per_request: price,
        category: body.category.clone().unwrap_or_else(|| "general".to_string()),
        api_endpoint: body.api_endpoint.clone().filter(|u| !u.is_empty()),
        api_method: body.api_method.clone(),
        auth_method: body.auth_method.unwrap_or(AuthMethod::None),
        auth_secret: body.auth_secret.clone(),
        auth_username: body.auth_username.clone(),
        auth_header_name: body.auth_header_name.clone(),
        request_fields: body.request_fields.clone(),
    };

    match state.db.create_service(&new) {
        Ok(service) => {
            log::info!("[services] created service {} '{}'", service.id, service.name);
            HttpResponse::Created().json(ServiceResponse::from(&service))
        }
        Err(e) => db_error("[services] failed to create service", e),
    }
}

async fn list_services(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Read) {
        return resp;
    }

    match state.db.list_active_services() {
        Ok(services) => {
            let responses: Vec<ServiceResponse> =
                services.iter().map(ServiceResponse::from).collect();
            HttpResponse::Ok().json(responses)
        }
        Err(e) => db_error("[services] failed to list services", e),
    }
}

async fn deactivate_service(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Transact) {
        return resp;
    }
    let service_id = path.into_inner();

    let service = match state.db.get_service(service_id) {
        Ok(Some(s)) => s,
        Ok(None) => return payment_error(&PaymentError::ServiceNotFound),
        Err(e) => return db_error("[services] lookup failed", e),
    };
    // Ownership flows through the service's earning wallet.
    let owns = match state.db.get_wallet(service.wallet_id) {
        Ok(Some(w)) => w.user_id == ctx.user_id,
        Ok(None) => false,
        Err(e) => return db_error("[services] wallet lookup failed", e),
    };
    if !owns && !ctx.has(Permission::Admin) {
        return payment_error(&PaymentError::Unauthorized);
    }

    match state.db.set_service_active(service_id, false) {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "deactivated": true })),
        Err(e) => db_error("[services] failed to deactivate", e),
    }
}

async fn execute_service(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ExecuteServiceRequest>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Transact) {
        return resp;
    }

    match state.orchestrator.execute_service(&ctx, &body).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => payment_error(&e),
    }
}
