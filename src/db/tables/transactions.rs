//! Database methods for the transactions table
//!
//! The transactions table is the permanent audit trail of every transfer
//! attempt. Rows are inserted PENDING before any chain call and finalized
//! exactly once; nothing ever deletes from this table.

use chrono::{DateTime, Utc};
use rusqlite::{Result as SqliteResult, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::db::Database;
use crate::models::{Transaction, TransactionStatus, TransactionType};

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let status_str: String = row.get(5)?;
    let type_str: String = row.get(6)?;
    let created_at_str: String = row.get(9)?;
    let finalized_at_str: Option<String> = row.get(10)?;

    Ok(Transaction {
        id: row.get(0)?,
        from_wallet_id: row.get(1)?,
        to_wallet_id: row.get(2)?,
        amount: row
            .get::<_, String>(3)?
            .parse::<Decimal>()
            .unwrap_or_default(),
        currency: row.get(4)?,
        status: TransactionStatus::from_str(&status_str).unwrap_or(TransactionStatus::Failed),
        tx_type: TransactionType::from_str(&type_str).unwrap_or(TransactionType::Transfer),
        memo: row.get(7)?,
        blockchain_hash: row.get(8)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .unwrap()
            .with_timezone(&Utc),
        finalized_at: finalized_at_str
            .map(|s| DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
    })
}

const TX_COLUMNS: &str = "id, from_wallet_id, to_wallet_id, amount, currency, status, tx_type, \
     memo, blockchain_hash, created_at, finalized_at";

/// Query filter for listing transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub limit: i64,
    pub offset: i64,
    pub status: Option<TransactionStatus>,
    pub wallet_id: Option<i64>,
}

impl Database {
    /// Insert a new transaction row. Status is whatever the caller passes
    /// (the recorder inserts PENDING; deposit recording inserts COMPLETED
    /// directly because the chain event already happened).
    #[allow(clippy::too_many_arguments)]
    pub fn create_transaction(
        &self,
        from_wallet_id: Option<i64>,
        to_wallet_id: Option<i64>,
        amount: Decimal,
        currency: &str,
        status: TransactionStatus,
        tx_type: TransactionType,
        memo: Option<&str>,
        blockchain_hash: Option<&str>,
    ) -> SqliteResult<Transaction> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let finalized_at = match status {
            TransactionStatus::Pending => None,
            _ => Some(now.clone()),
        };

        conn.execute(
            "INSERT INTO transactions (from_wallet_id, to_wallet_id, amount, currency, status,
                                       tx_type, memo, blockchain_hash, created_at, finalized_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                from_wallet_id,
                to_wallet_id,
                amount.to_string(),
                currency,
                status.as_ref(),
                tx_type.as_ref(),
                memo,
                blockchain_hash,
                &now,
                finalized_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        drop(conn);

        Ok(self.get_transaction(id)?.expect("transaction just inserted"))
    }

    pub fn get_transaction(&self, id: i64) -> SqliteResult<Option<Transaction>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE id = ?1",
            TX_COLUMNS
        ))?;
        let tx = stmt.query_row([id], transaction_from_row).ok();
        Ok(tx)
    }

    /// Transition a PENDING row to its terminal state. The status guard in
    /// the WHERE clause makes the transition exactly-once: a second call for
    /// the same row affects nothing and returns false.
    pub fn finalize_transaction(
        &self,
        id: i64,
        status: TransactionStatus,
        blockchain_hash: Option<&str>,
    ) -> SqliteResult<bool> {
        debug_assert!(status != TransactionStatus::Pending);
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute(
            "UPDATE transactions SET status = ?1, blockchain_hash = ?2, finalized_at = ?3
             WHERE id = ?4 AND status = 'PENDING'",
            rusqlite::params![status.as_ref(), blockchain_hash, &now, id],
        )?;
        Ok(affected > 0)
    }

    /// Append an outcome suffix to a transaction memo and persist it. Used
    /// by service execution to annotate the downstream leg's result.
    pub fn append_transaction_memo(&self, id: i64, suffix: &str) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE transactions SET memo = COALESCE(memo, '') || ?1 WHERE id = ?2",
            rusqlite::params![suffix, id],
        )?;
        Ok(affected > 0)
    }

    pub fn list_transactions(&self, filter: &TransactionFilter) -> SqliteResult<Vec<Transaction>> {
        let conn = self.conn();
        let mut sql = format!("SELECT {} FROM transactions WHERE 1=1", TX_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            params.push(Box::new(status.as_ref().to_string()));
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }
        if let Some(wallet_id) = filter.wallet_id {
            params.push(Box::new(wallet_id));
            let n = params.len();
            sql.push_str(&format!(
                " AND (from_wallet_id = ?{} OR to_wallet_id = ?{})",
                n, n
            ));
        }

        params.push(Box::new(filter.limit.max(1)));
        sql.push_str(&format!(" ORDER BY id DESC LIMIT ?{}", params.len()));
        params.push(Box::new(filter.offset.max(0)));
        sql.push_str(&format!(" OFFSET ?{}", params.len()));

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(params_ref.as_slice(), transaction_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(txs)
    }

    pub fn count_transactions(&self, filter: &TransactionFilter) -> SqliteResult<i64> {
        let conn = self.conn();
        let mut sql = "SELECT COUNT(*) FROM transactions WHERE 1=1".to_string();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            params.push(Box::new(status.as_ref().to_string()));
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }
        if let Some(wallet_id) = filter.wallet_id {
            params.push(Box::new(wallet_id));
            let n = params.len();
            sql.push_str(&format!(
                " AND (from_wallet_id = ?{} OR to_wallet_id = ?{})",
                n, n
            ));
        }

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(&sql, params_ref.as_slice(), |row| row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db").to_str().unwrap()).unwrap();
        (dir, db)
    }

    fn pending(db: &Database, from: i64, to: i64, amount: &str) -> Transaction {
        db.create_transaction(
            Some(from),
            Some(to),
            amount.parse().unwrap(),
            "USDC",
            TransactionStatus::Pending,
            TransactionType::Transfer,
            Some("test"),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_finalize_is_exactly_once() {
        let (_dir, db) = test_db();
        let tx = pending(&db, 1, 2, "10.00");
        assert_eq!(tx.status, TransactionStatus::Pending);

        assert!(db
            .finalize_transaction(tx.id, TransactionStatus::Completed, Some("0xhash"))
            .unwrap());
        // Second transition must be a no-op
        assert!(!db
            .finalize_transaction(tx.id, TransactionStatus::Failed, None)
            .unwrap());

        let tx = db.get_transaction(tx.id).unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.blockchain_hash.as_deref(), Some("0xhash"));
        assert!(tx.finalized_at.is_some());
    }

    #[test]
    fn test_memo_append_persists() {
        let (_dir, db) = test_db();
        let tx = pending(&db, 1, 2, "5");
        db.append_transaction_memo(tx.id, " | Service Response: SUCCESS")
            .unwrap();
        let tx = db.get_transaction(tx.id).unwrap().unwrap();
        assert_eq!(tx.memo.as_deref(), Some("test | Service Response: SUCCESS"));
    }

    #[test]
    fn test_list_filters() {
        let (_dir, db) = test_db();
        let a = pending(&db, 1, 2, "1");
        let b = pending(&db, 2, 3, "2");
        db.finalize_transaction(a.id, TransactionStatus::Completed, None)
            .unwrap();
        db.finalize_transaction(b.id, TransactionStatus::Failed, None)
            .unwrap();

        let filter = TransactionFilter {
            limit: 10,
            offset: 0,
            status: Some(TransactionStatus::Failed),
            wallet_id: None,
        };
        let rows = db.list_transactions(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, b.id);

        // wallet filter matches either side
        let filter = TransactionFilter {
            limit: 10,
            offset: 0,
            status: None,
            wallet_id: Some(2),
        };
        assert_eq!(db.list_transactions(&filter).unwrap().len(), 2);
        assert_eq!(db.count_transactions(&filter).unwrap(), 2);
    }

    #[test]
    fn test_deposit_rows_insert_terminal() {
        let (_dir, db) = test_db();
        let tx = db
            .create_transaction(
                None,
                Some(7),
                "25".parse().unwrap(),
                "USDC",
                TransactionStatus::Completed,
                TransactionType::Deposit,
                Some("external deposit"),
                Some("0xdep"),
            )
            .unwrap();
        assert_eq!(tx.from_wallet_id, None);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.finalized_at.is_some());
    }
}
