//! Default Wallet Resolver
//!
//! Resolves the implicit payer wallet when a caller omits one. Absence is a
//! hard stop: there is deliberately no "pick the richest wallet" fallback.

use crate::auth::AuthContext;
use crate::db::Database;
use crate::models::Wallet;

use super::error::PaymentError;

/// Read the pointer. `None` means the caller must name a wallet explicitly.
pub fn resolve(db: &Database, user_id: i64) -> Result<Option<i64>, PaymentError> {
    Ok(db.get_default_wallet_id(user_id)?)
}

/// Point the caller's default at one of their own active wallets.
pub fn set_default(db: &Database, auth: &AuthContext, wallet_id: i64) -> Result<Wallet, PaymentError> {
    let wallet = db.get_wallet(wallet_id)?.ok_or(PaymentError::WalletNotFound)?;
    if wallet.user_id != auth.user_id {
        return Err(PaymentError::Unauthorized);
    }
    if !wallet.is_active {
        return Err(PaymentError::WalletNotFound);
    }
    db.set_default_wallet_id(auth.user_id, wallet_id)?;
    Ok(wallet)
}

/// Null the pointer unconditionally.
pub fn clear_default(db: &Database, user_id: i64) -> Result<(), PaymentError> {
    db.clear_default_wallet_id(user_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Permission;
    use crate::payments::testutil::{make_wallet, test_db};

    fn auth(user_id: i64) -> AuthContext {
        AuthContext { user_id, permissions: vec![Permission::Transact] }
    }

    #[test]
    fn test_set_resolve_clear_round_trip() {
        let (_dir, db) = test_db();
        let w = make_wallet(&db, 1, "a", "1111222233334444");

        assert_eq!(resolve(&db, 1).unwrap(), None);
        set_default(&db, &auth(1), w.id).unwrap();
        assert_eq!(resolve(&db, 1).unwrap(), Some(w.id));
        clear_default(&db, 1).unwrap();
        assert_eq!(resolve(&db, 1).unwrap(), None);
    }

    #[test]
    fn test_set_validates_ownership_and_activity() {
        let (_dir, db) = test_db();
        let w = make_wallet(&db, 1, "a", "1111222233334444");

        let err = set_default(&db, &auth(2), w.id).unwrap_err();
        assert!(matches!(err, PaymentError::Unauthorized));

        db.set_wallet_active(w.id, false).unwrap();
        let err = set_default(&db, &auth(1), w.id).unwrap_err();
        assert!(matches!(err, PaymentError::WalletNotFound));

        let err = set_default(&db, &auth(1), 404).unwrap_err();
        assert!(matches!(err, PaymentError::WalletNotFound));
    }
}
