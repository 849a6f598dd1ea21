//! Database methods for the wallets table

use chrono::{DateTime, Utc};
use rusqlite::{Result as SqliteResult, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::db::Database;
use crate::models::{AgentType, Wallet};

fn wallet_from_row(row: &Row) -> rusqlite::Result<Wallet> {
    let agent_type_str: String = row.get(3)?;
    let created_at_str: String = row.get(9)?;
    let updated_at_str: String = row.get(10)?;

    Ok(Wallet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        agent_name: row.get(2)?,
        agent_type: AgentType::from_str(&agent_type_str).unwrap_or(AgentType::AiAgent),
        payment_id: row.get(4)?,
        chain_address: row.get(5)?,
        chain_private_key: row.get(6)?,
        is_active: row.get::<_, i32>(7)? != 0,
        cached_balance: row
            .get::<_, String>(8)?
            .parse::<Decimal>()
            .unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
            .unwrap()
            .with_timezone(&Utc),
    })
}

const WALLET_COLUMNS: &str = "id, user_id, agent_name, agent_type, payment_id, chain_address, \
     chain_private_key, is_active, cached_balance, created_at, updated_at";

impl Database {
    pub fn create_wallet(
        &self,
        user_id: i64,
        agent_name: &str,
        agent_type: AgentType,
        payment_id: &str,
        chain_address: &str,
        chain_private_key: &str,
    ) -> SqliteResult<Wallet> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO wallets (user_id, agent_name, agent_type, payment_id, chain_address,
                                  chain_private_key, is_active, cached_balance, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, '0', ?7, ?8)",
            rusqlite::params![
                user_id,
                agent_name,
                agent_type.as_ref(),
                payment_id,
                chain_address,
                chain_private_key,
                &now,
                &now
            ],
        )?;

        let id = conn.last_insert_rowid();
        drop(conn);

        Ok(self.get_wallet(id)?.expect("wallet just inserted"))
    }

    pub fn get_wallet(&self, id: i64) -> SqliteResult<Option<Wallet>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wallets WHERE id = ?1",
            WALLET_COLUMNS
        ))?;
        let wallet = stmt.query_row([id], wallet_from_row).ok();
        Ok(wallet)
    }

    pub fn get_wallet_by_payment_id(&self, payment_id: &str) -> SqliteResult<Option<Wallet>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wallets WHERE payment_id = ?1",
            WALLET_COLUMNS
        ))?;
        let wallet = stmt.query_row([payment_id], wallet_from_row).ok();
        Ok(wallet)
    }

    pub fn get_wallet_by_agent_name(&self, agent_name: &str) -> SqliteResult<Option<Wallet>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wallets WHERE agent_name = ?1 ORDER BY id LIMIT 1",
            WALLET_COLUMNS
        ))?;
        let wallet = stmt.query_row([agent_name], wallet_from_row).ok();
        Ok(wallet)
    }

    pub fn list_wallets_for_user(&self, user_id: i64) -> SqliteResult<Vec<Wallet>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wallets WHERE user_id = ?1 ORDER BY id",
            WALLET_COLUMNS
        ))?;
        let wallets = stmt
            .query_map([user_id], wallet_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(wallets)
    }

    /// Soft-deactivate a wallet. Deactivated wallets are never a valid
    /// transfer source or destination; rows are never hard-deleted.
    pub fn set_wallet_active(&self, id: i64, active: bool) -> SqliteResult<bool> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute(
            "UPDATE wallets SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![if active { 1 } else { 0 }, &now, id],
        )?;
        Ok(affected > 0)
    }

    /// Best-effort refresh of the advisory cached balance.
    pub fn update_cached_balance(&self, id: i64, balance: Decimal) -> SqliteResult<bool> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute(
            "UPDATE wallets SET cached_balance = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![balance.to_string(), &now, id],
        )?;
        Ok(affected > 0)
    }
}
