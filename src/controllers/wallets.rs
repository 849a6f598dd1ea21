//! Wallet lifecycle and balance endpoints.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use ethers::signers::{LocalWallet, Signer};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::auth::{authenticate, require, Permission};
use crate::controllers::{db_error, payment_error};
use crate::ledger::from_base_units;
use crate::models::{normalize_payment_id, AgentType, Wallet, WalletResponse};
use crate::payments::{default_wallet, PaymentError};
use crate::AppState;

/// Attempts at drawing a payment id before giving up on UNIQUE collisions.
const PAYMENT_ID_ATTEMPTS: usize = 5;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/wallets")
            .route(web::post().to(create_wallet))
            .route(web::get().to(list_wallets)),
    );
    cfg.service(web::resource("/api/wallets/balance").route(web::get().to(get_balance)));
    cfg.service(
        web::resource("/api/wallets/default")
            .route(web::get().to(get_default))
            .route(web::post().to(set_default))
            .route(web::delete().to(clear_default)),
    );
    cfg.service(web::resource("/api/wallets/{id}").route(web::delete().to(deactivate_wallet)));
    cfg.service(web::resource("/api/deposits").route(web::post().to(record_deposit)));
}

/// Fresh keypair for a new wallet: (address, private key), both 0x-hex.
fn generate_keypair() -> (String, String) {
    let wallet = LocalWallet::new(&mut rand::thread_rng());
    let address = format!("{:?}", wallet.address());
    let private_key = format!("0x{}", hex::encode(wallet.signer().to_bytes()));
    (address, private_key)
}

/// 16 random decimal digits. Uniqueness is enforced by the database.
fn generate_payment_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWalletRequest {
    agent_name: String,
    /// "SYSTEM", "STORE" or "AI_AGENT"; defaults to AI_AGENT.
    agent_type: Option<String>,
}

async fn create_wallet(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateWalletRequest>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Transact) {
        return resp;
    }

    let agent_name = body.agent_name.trim();
    if agent_name.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": { "kind": "MissingField", "message": "Missing required field 'agentName'" }
        }));
    }
    let agent_type = match &body.agent_type {
        Some(raw) => match AgentType::from_str(raw) {
            Ok(t) => t,
            Err(_) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": {
                        "kind": "InvalidField",
                        "message": format!("Unknown agent type '{}'", raw)
                    }
                }));
            }
        },
        None => AgentType::AiAgent,
    };

    let (address, private_key) = generate_keypair();

    // Payment ids are random; on the rare collision, draw again.
    let mut created = None;
    for _ in 0..PAYMENT_ID_ATTEMPTS {
        let payment_id = generate_payment_id();
        match state.db.create_wallet(
            ctx.user_id,
            agent_name,
            agent_type,
            &payment_id,
            &address,
            &private_key,
        ) {
            Ok(wallet) => {
                created = Some(wallet);
                break;
            }
            Err(e) if is_unique_violation(&e) => {
                log::warn!("[wallets] payment id collision, retrying");
                continue;
            }
            Err(e) => return db_error("[wallets] failed to create wallet", e),
        }
    }
    let wallet = match created {
        Some(w) => w,
        None => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": { "kind": "InternalError", "message": "Could not allocate a payment id" }
            }));
        }
    };
    log::info!(
        "[wallets] created wallet {} ({}) for user {}",
        wallet.id,
        wallet.payment_id,
        ctx.user_id
    );

    // Starter gas drip so the new keypair can sign its first transfers.
    // Funding failures are logged, not surfaced; the wallet is already usable
    // as a payment destination.
    if let Some(funder_key) = state.config.gas_funder_private_key.clone() {
        if let Ok(amount) = Decimal::from_str(&state.config.gas_fund_amount) {
            match state.recorder.record_gas_funding(&funder_key, &wallet, amount).await {
                Ok(outcome) => log::info!(
                    "[wallets] gas funded wallet {} in tx {}",
                    wallet.id,
                    outcome.blockchain_hash
                ),
                Err(e) => log::warn!("[wallets] gas funding failed for wallet {}: {}", wallet.id, e),
            }
        }
    }

    HttpResponse::Created().json(WalletResponse::from(&wallet))
}

async fn list_wallets(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Read) {
        return resp;
    }

    match state.db.list_wallets_for_user(ctx.user_id) {
        Ok(wallets) => {
            let responses: Vec<WalletResponse> = wallets.iter().map(WalletResponse::from).collect();
            HttpResponse::Ok().json(responses)
        }
        Err(e) => db_error("[wallets] failed to list wallets", e),
    }
}

async fn deactivate_wallet(
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
    let wallet_id = path.into_inner();

    let wallet = match state.db.get_wallet(wallet_id) {
        Ok(Some(w)) => w,
        Ok(None) => return payment_error(&PaymentError::WalletNotFound),
        Err(e) => return db_error("[wallets] failed to load wallet", e),
    };
    if wallet.user_id != ctx.user_id && !ctx.has(Permission::Admin) {
        return payment_error(&PaymentError::Unauthorized);
    }

    match state.db.set_wallet_active(wallet_id, false) {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "deactivated": true })),
        Err(e) => db_error("[wallets] failed to deactivate wallet", e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceQuery {
    payment_id: Option<String>,
    agent_name: Option<String>,
}

/// Balance success shape. `lastUpdated` reflects the cached-balance refresh
/// that this lookup just performed.
fn balance_response(wallet: &Wallet, balance: Decimal, currency: &str) -> serde_json::Value {
    serde_json::json!({
        "paymentId": wallet.payment_id,
        "agentName": wallet.agent_name,
        "balance": balance.to_string(),
        "currency": currency,
        "isActive": wallet.is_active,
        "lastUpdated": wallet.updated_at,
    })
}

/// Live balance lookup by payment id or agent name. Reads the chain, then
/// refreshes the advisory cached balance. Deactivated wallets still answer
/// (with `isActive: false`); they hold funds even though they are no longer
/// valid transfer endpoints.
async fn get_balance(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<BalanceQuery>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Read) {
        return resp;
    }

    let wallet: Option<Wallet> = if let Some(raw) = &query.payment_id {
        let payment_id = normalize_payment_id(raw);
        match state.db.get_wallet_by_payment_id(&payment_id) {
            Ok(w) => w,
            Err(e) => return db_error("[wallets] balance lookup failed", e),
        }
    } else if let Some(name) = &query.agent_name {
        match state.db.get_wallet_by_agent_name(name.trim()) {
            Ok(w) => w,
            Err(e) => return db_error("[wallets] balance lookup failed", e),
        }
    } else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": {
                "kind": "MissingField",
                "message": "Provide either 'paymentId' or 'agentName'"
            }
        }));
    };

    let wallet = match wallet {
        Some(w) => w,
        None => return payment_error(&PaymentError::WalletNotFound),
    };

    let units = match state.gateway.token_balance(&wallet.chain_address).await {
        Ok(u) => u,
        Err(e) => {
            log::error!("[wallets] chain balance read failed for {}: {}", wallet.id, e);
            return payment_error(&PaymentError::DownstreamCallFailed {
                message: "Balance lookup failed".to_string(),
            });
        }
    };
    let balance = match from_base_units(units, state.config.token_decimals) {
        Ok(b) => b,
        Err(e) => {
            log::error!("[wallets] balance conversion failed for {}: {}", wallet.id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": { "kind": "InternalError", "message": "Balance conversion failed" }
            }));
        }
    };
    if let Err(e) = state.db.update_cached_balance(wallet.id, balance) {
        log::warn!("[wallets] cached balance refresh failed for {}: {}", wallet.id, e);
    }
    // Re-read so lastUpdated reflects the refresh just written.
    let wallet = match state.db.get_wallet(wallet.id) {
        Ok(Some(w)) => w,
        _ => wallet,
    };

    HttpResponse::Ok().json(balance_response(&wallet, balance, &state.config.currency))
}

async fn get_default(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Read) {
        return resp;
    }

    match default_wallet::resolve(&state.db, ctx.user_id) {
        Ok(id) => HttpResponse::Ok().json(serde_json::json!({ "walletId": id })),
        Err(e) => payment_error(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDefaultRequest {
    wallet_id: i64,
}

async fn set_default(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SetDefaultRequest>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Transact) {
        return resp;
    }

    match default_wallet::set_default(&state.db, &ctx, body.wallet_id) {
        Ok(wallet) => HttpResponse::Ok().json(serde_json::json!({ "walletId": wallet.id })),
        Err(e) => payment_error(&e),
    }
}

async fn clear_default(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Transact) {
        return resp;
    }

    match default_wallet::clear_default(&state.db, ctx.user_id) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "walletId": null })),
        Err(e) => payment_error(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositRequest {
    payment_id: String,
    amount: String,
    blockchain_hash: Option<String>,
    memo: Option<String>,
}

/// Record an observed on-chain deposit. Admin-only: the row is terminal on
/// insert, so this trusts the caller about what landed on chain.
async fn record_deposit(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DepositRequest>,
) -> impl Responder {
    let ctx = match authenticate(&state.db, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require(&ctx, Permission::Admin) {
        return resp;
    }

    let payment_id = normalize_payment_id(&body.payment_id);
    let wallet = match state.db.get_wallet_by_payment_id(&payment_id) {
        Ok(Some(w)) if w.is_active => w,
        Ok(_) => return payment_error(&PaymentError::WalletNotFound),
        Err(e) => return db_error("[wallets] deposit wallet lookup failed", e),
    };
    let amount = match Decimal::from_str(&body.amount) {
        Ok(a) => a,
        Err(_) => {
            return payment_error(&PaymentError::InvalidAmount {
                reason: format!("'{}' is not a valid amount", body.amount),
            });
        }
    };

    match state.recorder.record_deposit(
        &wallet,
        amount,
        body.blockchain_hash.as_deref(),
        body.memo.as_deref(),
    ) {
        Ok(tx) => HttpResponse::Created().json(tx),
        Err(e) => payment_error(&e),
    }
}
