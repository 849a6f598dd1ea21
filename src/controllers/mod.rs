pub mod auth;
pub mod health;
pub mod services;
pub mod transactions;
pub mod wallets;

use actix_web::HttpResponse;

use crate::payments::PaymentError;

/// Render a payment pipeline error as its HTTP envelope.
pub fn payment_error(e: &PaymentError) -> HttpResponse {
    HttpResponse::build(e.status_code()).json(e.to_body())
}

/// Plain database failure from a handler that is not in the payment path.
pub fn db_error(context: &str, e: rusqlite::Error) -> HttpResponse {
    log::error!("{}: {}", context, e);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": { "kind": "InternalError", "message": "Internal server error" }
    }))
}
