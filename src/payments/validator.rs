//! Payment Validator
//!
//! Rejects malformed or unauthorized transfer requests before any
//! transaction row is created. The checks run in a fixed order so error
//! precedence is deterministic: a request that is wrong in several ways
//! always reports the first failing check.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::db::Database;
use crate::models::{is_valid_payment_id, normalize_payment_id, Wallet};

use super::error::PaymentError;
use super::recorder::TransferDestination;

/// Raw transfer request as received on the wire. Amount arrives as a JSON
/// string or number; both are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_wallet_id: Option<i64>,
    pub to_payment_id: Option<String>,
    /// Raw chain address for transfers out of the system. Mutually
    /// exclusive with `to_payment_id`; payment id wins when both are set.
    pub to_address: Option<String>,
    pub amount: Option<serde_json::Value>,
    pub memo: Option<String>,
}

/// A request that passed all checks and is safe to hand to the recorder.
#[derive(Debug, Clone)]
pub struct ValidatedTransfer {
    pub from: Wallet,
    pub dest: TransferDestination,
    pub amount: Decimal,
    pub memo: Option<String>,
}

fn parse_amount(raw: &serde_json::Value) -> Result<Decimal, PaymentError> {
    let text = match raw {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(PaymentError::InvalidAmount {
                reason: format!("expected a number, got {}", other),
            });
        }
    };
    let amount: Decimal = text.parse().map_err(|_| PaymentError::InvalidAmount {
        reason: format!("'{}' is not a number", text),
    })?;
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount {
            reason: format!("amount must be positive, got {}", amount),
        });
    }
    Ok(amount)
}

fn looks_like_chain_address(addr: &str) -> bool {
    let hex_part = match addr.strip_prefix("0x") {
        Some(h) => h,
        None => return false,
    };
    hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Run the six ordered checks. Only a fully validated request ever reaches
/// the recorder; nothing here writes to the database.
pub fn validate_transfer(
    db: &Database,
    auth: &AuthContext,
    req: &TransferRequest,
) -> Result<ValidatedTransfer, PaymentError> {
    // 1. Required fields
    let from_wallet_id = req
        .from_wallet_id
        .ok_or(PaymentError::MissingField { field: "fromWalletId" })?;
    if req.to_payment_id.is_none() && req.to_address.is_none() {
        return Err(PaymentError::MissingField { field: "toPaymentId" });
    }
    let raw_amount = req
        .amount
        .as_ref()
        .ok_or(PaymentError::MissingField { field: "amount" })?;

    // 2. Amount shape
    let amount = parse_amount(raw_amount)?;

    // 3. Destination identifier format
    let dest_payment_id = match &req.to_payment_id {
        Some(raw) => {
            let normalized = normalize_payment_id(raw);
            if !is_valid_payment_id(&normalized) {
                return Err(PaymentError::InvalidPaymentIdFormat(
                    "Payment id must be exactly 16 digits".to_string(),
                ));
            }
            Some(normalized)
        }
        None => {
            let addr = req.to_address.as_deref().unwrap_or_default().trim();
            if !looks_like_chain_address(addr) {
                return Err(PaymentError::InvalidPaymentIdFormat(
                    "Destination address must be a 0x-prefixed 40-hex-digit address".to_string(),
                ));
            }
            None
        }
    };

    // 4. Source wallet: exists, owned by caller, active
    let from = db
        .get_wallet(from_wallet_id)?
        .ok_or(PaymentError::WalletNotFound)?;
    if from.user_id != auth.user_id {
        return Err(PaymentError::Unauthorized);
    }
    if !from.is_active {
        return Err(PaymentError::WalletNotFound);
    }

    // 5. Destination wallet: exists and active
    let dest = match dest_payment_id {
        Some(payment_id) => {
            let to = db
                .get_wallet_by_payment_id(&payment_id)?
                .filter(|w| w.is_active)
                .ok_or(PaymentError::RecipientNotFound)?;
            TransferDestination::Wallet(to)
        }
        None => TransferDestination::External(
            req.to_address.as_deref().unwrap_or_default().trim().to_string(),
        ),
    };

    // 6. No self-transfer
    if let TransferDestination::Wallet(to) = &dest {
        if to.id == from.id {
            return Err(PaymentError::SelfTransferNotAllowed);
        }
    }

    Ok(ValidatedTransfer {
        from,
        dest,
        amount,
        memo: req.memo.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Permission;
    use crate::payments::testutil::{make_wallet, test_db};
    use serde_json::json;

    fn auth(user_id: i64) -> AuthContext {
        AuthContext {
            user_id,
            permissions: vec![Permission::Read, Permission::Transact],
        }
    }

    fn req(from: i64, to: &str, amount: serde_json::Value) -> TransferRequest {
        TransferRequest {
            from_wallet_id: Some(from),
            to_payment_id: Some(to.to_string()),
            to_address: None,
            amount: Some(amount),
            memo: None,
        }
    }

    fn kind(err: PaymentError) -> &'static str {
        err.kind()
    }

    #[test]
    fn test_missing_field_precedes_bad_amount() {
        let (_dir, db) = test_db();
        // no fromWalletId AND a bad amount: MissingField must win
        let r = TransferRequest {
            from_wallet_id: None,
            to_payment_id: Some("1111222233334444".to_string()),
            to_address: None,
            amount: Some(json!("-5")),
            memo: None,
        };
        assert_eq!(kind(validate_transfer(&db, &auth(1), &r).unwrap_err()), "MissingField");
    }

    #[test]
    fn test_amount_checks() {
        let (_dir, db) = test_db();
        make_wallet(&db, 1, "a", "1111222233334444");
        for bad in [json!("0"), json!("-1"), json!("abc"), json!(null), json!(["x"])] {
            let r = req(1, "5555666677778888", bad);
            assert_eq!(kind(validate_transfer(&db, &auth(1), &r).unwrap_err()), "InvalidAmount");
        }
        // number form accepted
        let w2 = make_wallet(&db, 2, "b", "5555666677778888");
        let r = req(1, &w2.payment_id, json!(10.5));
        let v = validate_transfer(&db, &auth(1), &r).unwrap();
        assert_eq!(v.amount, "10.5".parse().unwrap());
    }

    #[test]
    fn test_payment_id_format_and_stripping() {
        let (_dir, db) = test_db();
        make_wallet(&db, 1, "a", "1111222233334444");
        let w2 = make_wallet(&db, 2, "b", "5555666677778888");

        // embedded spaces are stripped before validation and lookup
        let r = req(1, "5555 6666 7777 8888", json!("1"));
        let v = validate_transfer(&db, &auth(1), &r).unwrap();
        match v.dest {
            TransferDestination::Wallet(w) => assert_eq!(w.id, w2.id),
            _ => panic!("expected wallet destination"),
        }

        for bad in ["555566667777888", "55556666777788889", "5555-6666-7777-8888"] {
            let r = req(1, bad, json!("1"));
            assert_eq!(
                kind(validate_transfer(&db, &auth(1), &r).unwrap_err()),
                "InvalidPaymentIdFormat"
            );
        }
    }

    #[test]
    fn test_ownership_and_activity() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        make_wallet(&db, 2, "b", "5555666677778888");

        // unknown wallet
        let r = req(999, "5555666677778888", json!("1"));
        assert_eq!(kind(validate_transfer(&db, &auth(1), &r).unwrap_err()), "WalletNotFound");

        // someone else's wallet
        let r = req(a.id, "5555666677778888", json!("1"));
        assert_eq!(kind(validate_transfer(&db, &auth(2), &r).unwrap_err()), "Unauthorized");

        // caller's wallet but deactivated
        db.set_wallet_active(a.id, false).unwrap();
        let r = req(a.id, "5555666677778888", json!("1"));
        assert_eq!(kind(validate_transfer(&db, &auth(1), &r).unwrap_err()), "WalletNotFound");
    }

    #[test]
    fn test_recipient_checks() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let b = make_wallet(&db, 2, "b", "5555666677778888");

        // unknown payment id
        let r = req(a.id, "9999888877776666", json!("1"));
        assert_eq!(kind(validate_transfer(&db, &auth(1), &r).unwrap_err()), "RecipientNotFound");

        // deactivated recipient
        db.set_wallet_active(b.id, false).unwrap();
        let r = req(a.id, &b.payment_id, json!("1"));
        assert_eq!(kind(validate_transfer(&db, &auth(1), &r).unwrap_err()), "RecipientNotFound");
    }

    #[test]
    fn test_self_transfer_rejected() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let r = req(a.id, &a.payment_id, json!("1"));
        assert_eq!(
            kind(validate_transfer(&db, &auth(1), &r).unwrap_err()),
            "SelfTransferNotAllowed"
        );
    }

    #[test]
    fn test_external_address_destination() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let r = TransferRequest {
            from_wallet_id: Some(a.id),
            to_payment_id: None,
            to_address: Some("0x00000000000000000000000000000000000000aa".to_string()),
            amount: Some(json!("1")),
            memo: None,
        };
        let v = validate_transfer(&db, &auth(1), &r).unwrap();
        assert!(matches!(v.dest, TransferDestination::External(_)));

        let r = TransferRequest {
            from_wallet_id: Some(a.id),
            to_payment_id: None,
            to_address: Some("bogus".to_string()),
            amount: Some(json!("1")),
            memo: None,
        };
        assert_eq!(
            kind(validate_transfer(&db, &auth(1), &r).unwrap_err()),
            "InvalidPaymentIdFormat"
        );
    }
}
