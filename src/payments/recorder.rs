//! Transaction Ledger Recorder
//!
//! Durably records the intent and outcome of every value transfer. The
//! contract is strict: the transaction row is inserted PENDING before the
//! ledger gateway is touched, and every exit path finalizes it to exactly
//! one terminal state before returning. A failed transfer is terminal;
//! retrying means a brand-new attempt with a brand-new row.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::db::Database;
use crate::ledger::{from_base_units, to_base_units, LedgerGateway};
use crate::models::{Transaction, TransactionStatus, TransactionType, Wallet};

use super::error::PaymentError;

/// Native-currency decimals for gas funding transfers.
const NATIVE_DECIMALS: u32 = 18;

/// Where a transfer goes: another wallet in the system, or a raw chain
/// address outside it (recorded with a NULL `to_wallet_id`).
#[derive(Debug, Clone)]
pub enum TransferDestination {
    Wallet(Wallet),
    External(String),
}

impl TransferDestination {
    fn wallet_id(&self) -> Option<i64> {
        match self {
            Self::Wallet(w) => Some(w.id),
            Self::External(_) => None,
        }
    }

    fn chain_address(&self) -> &str {
        match self {
            Self::Wallet(w) => &w.chain_address,
            Self::External(addr) => addr,
        }
    }
}

/// Result of a successful transfer attempt.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub transaction: Transaction,
    pub blockchain_hash: String,
}

#[derive(Clone)]
pub struct TransferRecorder {
    db: Arc<Database>,
    gateway: Arc<dyn LedgerGateway>,
    currency: String,
    token_decimals: u32,
}

impl TransferRecorder {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn LedgerGateway>,
        currency: &str,
        token_decimals: u32,
    ) -> Self {
        Self {
            db,
            gateway,
            currency: currency.to_string(),
            token_decimals,
        }
    }

    /// Record and execute one token transfer.
    ///
    /// The balance check before the transfer call is best-effort: the balance
    /// can change between check and transfer, and two concurrent transfers
    /// from the same wallet can both pass it. The chain settles that race;
    /// this layer does not serialize per-wallet.
    pub async fn record_transfer(
        &self,
        from: &Wallet,
        dest: &TransferDestination,
        amount: Decimal,
        memo: Option<&str>,
    ) -> Result<TransferOutcome, PaymentError> {
        // Defensive re-checks. The validator enforces these for API callers,
        // but the recorder is also reachable from the orchestrator.
        if !from.is_active {
            return Err(PaymentError::WalletNotFound);
        }
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount {
                reason: format!("amount must be positive, got {}", amount),
            });
        }
        match dest {
            TransferDestination::Wallet(to) => {
                if to.id == from.id {
                    return Err(PaymentError::SelfTransferNotAllowed);
                }
                if !to.is_active {
                    return Err(PaymentError::RecipientNotFound);
                }
            }
            TransferDestination::External(_) => {}
        }

        let amount_units = to_base_units(amount, self.token_decimals)
            .map_err(|reason| PaymentError::InvalidAmount { reason })?;

        // Record before acting: every attempted transfer gets a durable row.
        let pending = self.db.create_transaction(
            Some(from.id),
            dest.wallet_id(),
            amount,
            &self.currency,
            TransactionStatus::Pending,
            TransactionType::Transfer,
            memo,
            None,
        )?;
        log::info!(
            "[recorder] transaction {} PENDING: wallet {} -> {:?}, {} {}",
            pending.id,
            from.id,
            dest.wallet_id(),
            amount,
            self.currency
        );

        let balance_units = match self.gateway.token_balance(&from.chain_address).await {
            Ok(b) => b,
            Err(message) => {
                return Err(self.fail(pending.id, message).await);
            }
        };

        if balance_units < amount_units {
            self.db
                .finalize_transaction(pending.id, TransactionStatus::Failed, None)?;
            let balance =
                from_base_units(balance_units, self.token_decimals).unwrap_or_default();
            log::warn!(
                "[recorder] transaction {} FAILED: insufficient funds ({} < {})",
                pending.id,
                balance,
                amount
            );
            return Err(PaymentError::InsufficientFunds {
                balance,
                requested: amount,
                transaction_id: pending.id,
            });
        }

        let hash = match self
            .gateway
            .transfer_token(&from.chain_private_key, dest.chain_address(), amount_units)
            .await
        {
            Ok(h) => h,
            Err(message) => {
                return Err(self.fail(pending.id, message).await);
            }
        };

        self.db
            .finalize_transaction(pending.id, TransactionStatus::Completed, Some(&hash))?;
        log::info!("[recorder] transaction {} COMPLETED: {}", pending.id, hash);

        // Advisory cached-balance refresh; correctness never depends on it.
        let new_balance =
            from_base_units(balance_units - amount_units, self.token_decimals).unwrap_or_default();
        if let Err(e) = self.db.update_cached_balance(from.id, new_balance) {
            log::warn!("[recorder] cached balance refresh failed for wallet {}: {}", from.id, e);
        }

        let transaction = self
            .db
            .get_transaction(pending.id)?
            .ok_or_else(|| PaymentError::Internal("finalized transaction vanished".to_string()))?;

        Ok(TransferOutcome {
            transaction,
            blockchain_hash: hash,
        })
    }

    /// Record an observed external deposit. The chain event already
    /// happened, so the row is inserted in its terminal state directly.
    pub fn record_deposit(
        &self,
        to: &Wallet,
        amount: Decimal,
        blockchain_hash: Option<&str>,
        memo: Option<&str>,
    ) -> Result<Transaction, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount {
                reason: format!("amount must be positive, got {}", amount),
            });
        }
        if !to.is_active {
            return Err(PaymentError::RecipientNotFound);
        }
        let tx = self.db.create_transaction(
            None,
            Some(to.id),
            amount,
            &self.currency,
            TransactionStatus::Completed,
            TransactionType::Deposit,
            memo,
            blockchain_hash,
        )?;
        log::info!("[recorder] deposit {} recorded for wallet {}", tx.id, to.id);
        Ok(tx)
    }

    /// Fund a freshly created wallet with gas money from the configured
    /// funder key. Same record-then-finalize discipline as token transfers,
    /// but in native currency and without a balance pre-check (the funder is
    /// an operator concern).
    pub async fn record_gas_funding(
        &self,
        funder_private_key: &str,
        to: &Wallet,
        amount_native: Decimal,
    ) -> Result<TransferOutcome, PaymentError> {
        let amount_wei = to_base_units(amount_native, NATIVE_DECIMALS)
            .map_err(|reason| PaymentError::InvalidAmount { reason })?;

        let pending = self.db.create_transaction(
            None,
            Some(to.id),
            amount_native,
            "ETH",
            TransactionStatus::Pending,
            TransactionType::GasTransfer,
            Some("gas funding for new wallet"),
            None,
        )?;

        let hash = match self
            .gateway
            .transfer_native(funder_private_key, &to.chain_address, amount_wei)
            .await
        {
            Ok(h) => h,
            Err(message) => {
                return Err(self.fail(pending.id, message).await);
            }
        };

        self.db
            .finalize_transaction(pending.id, TransactionStatus::Completed, Some(&hash))?;
        log::info!("[recorder] gas funding {} COMPLETED: {}", pending.id, hash);

        let transaction = self
            .db
            .get_transaction(pending.id)?
            .ok_or_else(|| PaymentError::Internal("finalized transaction vanished".to_string()))?;
        Ok(TransferOutcome {
            transaction,
            blockchain_hash: hash,
        })
    }

    /// Finalize a row FAILED after a gateway error. The row stays as the
    /// permanent audit trail of the attempt.
    async fn fail(&self, transaction_id: i64, message: String) -> PaymentError {
        log::warn!("[recorder] transaction {} FAILED: {}", transaction_id, message);
        if let Err(e) = self
            .db
            .finalize_transaction(transaction_id, TransactionStatus::Failed, None)
        {
            // The row may be left PENDING here only if the database itself is
            // down, in which case nothing else would have worked either.
            log::error!(
                "[recorder] could not finalize transaction {}: {}",
                transaction_id,
                e
            );
        }
        PaymentError::TransferFailed {
            message,
            transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::testutil::{make_wallet, test_db, MockLedger};

    fn recorder(db: Arc<Database>, ledger: Arc<MockLedger>) -> TransferRecorder {
        TransferRecorder::new(db, ledger, "USDC", 6)
    }

    #[tokio::test]
    async fn test_happy_path_completes_single_row() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let b = make_wallet(&db, 2, "b", "5555666677778888");
        // wallet A holds 50 USDC on chain
        let ledger = Arc::new(MockLedger::with_balance(50_000_000));
        let rec = recorder(db.clone(), ledger.clone());

        let outcome = rec
            .record_transfer(
                &a,
                &TransferDestination::Wallet(b.clone()),
                "10.00".parse().unwrap(),
                Some("lunch"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
        assert_eq!(outcome.transaction.amount, "10.00".parse().unwrap());
        assert_eq!(outcome.transaction.blockchain_hash.as_deref(), Some(outcome.blockchain_hash.as_str()));
        assert_eq!(ledger.transfer_calls(), 1);

        // exactly one row exists and it is terminal
        let all = db
            .list_transactions(&crate::db::tables::TransactionFilter {
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, TransactionStatus::Completed);

        // advisory cached balance refreshed from the pre-transfer read
        let a = db.get_wallet(a.id).unwrap().unwrap();
        assert_eq!(a.cached_balance, "40".parse().unwrap());
    }

    // The balance check is check-then-act: two concurrent transfers from the
    // same wallet can both pass it against a stale balance, and the chain
    // settles that race. This test only pins the single-request behavior.
    #[tokio::test]
    async fn test_insufficient_funds_short_circuits_transfer() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let b = make_wallet(&db, 2, "b", "5555666677778888");
        let ledger = Arc::new(MockLedger::with_balance(50_000_000)); // 50 USDC
        let rec = recorder(db.clone(), ledger.clone());

        let err = rec
            .record_transfer(
                &a,
                &TransferDestination::Wallet(b),
                "999999".parse().unwrap(),
                None,
            )
            .await
            .unwrap_err();

        match err {
            PaymentError::InsufficientFunds { balance, transaction_id, .. } => {
                assert_eq!(balance, "50".parse().unwrap());
                let tx = db.get_transaction(transaction_id).unwrap().unwrap();
                assert_eq!(tx.status, TransactionStatus::Failed);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
        // Balance was read, transfer was never attempted
        assert_eq!(ledger.balance_calls(), 1);
        assert_eq!(ledger.transfer_calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_finalizes_failed() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let b = make_wallet(&db, 2, "b", "5555666677778888");
        let ledger = Arc::new(MockLedger::with_balance(50_000_000));
        ledger.fail_transfers("contract reverted");
        let rec = recorder(db.clone(), ledger.clone());

        let err = rec
            .record_transfer(&a, &TransferDestination::Wallet(b), "10".parse().unwrap(), None)
            .await
            .unwrap_err();

        match err {
            PaymentError::TransferFailed { message, transaction_id } => {
                assert!(message.contains("contract reverted"));
                let tx = db.get_transaction(transaction_id).unwrap().unwrap();
                assert_eq!(tx.status, TransactionStatus::Failed);
                assert!(tx.blockchain_hash.is_none());
            }
            other => panic!("expected TransferFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_balance_read_failure_finalizes_failed() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let b = make_wallet(&db, 2, "b", "5555666677778888");
        let ledger = Arc::new(MockLedger::with_balance(0));
        ledger.fail_balance_reads("rpc timeout");
        let rec = recorder(db.clone(), ledger.clone());

        let err = rec
            .record_transfer(&a, &TransferDestination::Wallet(b), "1".parse().unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::TransferFailed { .. }));
        assert_eq!(ledger.transfer_calls(), 0);
    }

    #[tokio::test]
    async fn test_defensive_checks_create_no_rows() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let ledger = Arc::new(MockLedger::with_balance(50_000_000));
        let rec = recorder(db.clone(), ledger.clone());

        // self transfer
        let err = rec
            .record_transfer(
                &a,
                &TransferDestination::Wallet(a.clone()),
                "1".parse().unwrap(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::SelfTransferNotAllowed));

        // non-positive amount
        let b = make_wallet(&db, 2, "b", "5555666677778888");
        let err = rec
            .record_transfer(
                &a,
                &TransferDestination::Wallet(b.clone()),
                "0".parse().unwrap(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount { .. }));

        // inactive source
        db.set_wallet_active(a.id, false).unwrap();
        let a = db.get_wallet(a.id).unwrap().unwrap();
        let err = rec
            .record_transfer(&a, &TransferDestination::Wallet(b), "1".parse().unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::WalletNotFound));

        let count = db
            .count_transactions(&crate::db::tables::TransactionFilter { limit: 10, ..Default::default() })
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(ledger.balance_calls(), 0);
    }

    #[tokio::test]
    async fn test_external_destination_has_null_to_wallet() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let ledger = Arc::new(MockLedger::with_balance(50_000_000));
        let rec = recorder(db.clone(), ledger.clone());

        let outcome = rec
            .record_transfer(
                &a,
                &TransferDestination::External(
                    "0x00000000000000000000000000000000000000aa".to_string(),
                ),
                "5".parse().unwrap(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.transaction.to_wallet_id, None);
        assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_deposit_and_gas_funding() {
        let (_dir, db) = test_db();
        let a = make_wallet(&db, 1, "a", "1111222233334444");
        let ledger = Arc::new(MockLedger::with_balance(0));
        let rec = recorder(db.clone(), ledger.clone());

        let dep = rec
            .record_deposit(&a, "25".parse().unwrap(), Some("0xdep"), Some("faucet"))
            .unwrap();
        assert_eq!(dep.tx_type, TransactionType::Deposit);
        assert_eq!(dep.status, TransactionStatus::Completed);
        assert_eq!(dep.from_wallet_id, None);

        let gas = rec
            .record_gas_funding("0xfunderkey", &a, "0.001".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(gas.transaction.tx_type, TransactionType::GasTransfer);
        assert_eq!(gas.transaction.status, TransactionStatus::Completed);
        assert_eq!(ledger.native_transfer_calls(), 1);
    }
}
