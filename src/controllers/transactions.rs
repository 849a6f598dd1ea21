//! Transfer creation and transaction history.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use std::str::FromStr;

use crate::auth::{authenticate, require, Permission};
use crate::controllers::{db_error, payment_error};
use crate::db::tables::TransactionFilter;
use crate::models::TransactionStatus;
use crate::payments::{validate_transfer, TransferDestination, TransferRequest};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/transactions")
            .route(web::post().to(create_transfer))
            .route(web::get().to(list_transactions)),
    );
    cfg.service(web::resource("/api/transactions/{id}").route(web::get().to(get_transaction)));
}

async fn create_transfer(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<TransferRequest>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Transact) {
        return resp;
    }

    let validated = match validate_transfer(&state.db, &ctx, &body) {
        Ok(v) => v,
        Err(e) => return payment_error(&e),
    };

    let to_label = match &validated.dest {
        TransferDestination::Wallet(w) => w.agent_name.clone(),
        TransferDestination::External(addr) => addr.clone(),
    };

    match state
        .recorder
        .record_transfer(
            &validated.from,
            &validated.dest,
            validated.amount,
            validated.memo.as_deref(),
        )
        .await
    {
        Ok(outcome) => HttpResponse::Created().json(serde_json::json!({
            "transactionId": outcome.transaction.id,
            "blockchainHash": outcome.blockchain_hash,
            "status": outcome.transaction.status,
            "amount": outcome.transaction.amount.to_string(),
            "currency": outcome.transaction.currency,
            "fromWallet": validated.from.agent_name,
            "toWallet": to_label,
        })),
        Err(e) => payment_error(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    status: Option<String>,
    wallet_id: Option<i64>,
}

async fn list_transactions(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Read) {
        return resp;
    }

    let status = match &query.status {
        Some(raw) => match TransactionStatus::from_str(raw) {
            Ok(s) => Some(s),
            Err(_) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": {
                        "kind": "InvalidField",
                        "message": format!("Unknown status '{}'", raw)
                    }
                }));
            }
        },
        None => None,
    };

    let filter = TransactionFilter {
        limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0).max(0),
        status,
        wallet_id: query.wallet_id,
    };

    let transactions = match state.db.list_transactions(&filter) {
        Ok(t) => t,
        Err(e) => return db_error("[transactions] list failed", e),
    };
    let total = match state.db.count_transactions(&filter) {
        Ok(c) => c,
        Err(e) => return db_error("[transactions] count failed", e),
    };

    HttpResponse::Ok().json(serde_json::json!({
        "transactions": transactions,
        "total": total,
        "limit": filter.limit,
        "offset": filter.offset,
    }))
}

async fn get_transaction(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Read) {
        return resp;
    }

    match state.db.get_transaction(path.into_inner()) {
        Ok(Some(tx)) => HttpResponse::Ok().json(tx),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": { "kind": "NotFound", "message": "Transaction not found" }
        })),
        Err(e) => db_error("[transactions] lookup failed", e),
    }
}
