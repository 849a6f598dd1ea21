use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Lifecycle of a transfer attempt. A row starts PENDING and transitions
/// exactly once to COMPLETED or FAILED; there is no other path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
pub enum TransactionStatus {
    #[strum(serialize = "PENDING")]
    #[serde(rename = "PENDING")]
    Pending,
    #[strum(serialize = "COMPLETED")]
    #[serde(rename = "COMPLETED")]
    Completed,
    #[strum(serialize = "FAILED")]
    #[serde(rename = "FAILED")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
pub enum TransactionType {
    #[strum(serialize = "TRANSFER")]
    #[serde(rename = "TRANSFER")]
    Transfer,
    #[strum(serialize = "DEPOSIT")]
    #[serde(rename = "DEPOSIT")]
    Deposit,
    #[strum(serialize = "GAS_TRANSFER")]
    #[serde(rename = "GAS_TRANSFER")]
    GasTransfer,
}

/// Durable record of one transfer attempt and its terminal outcome.
///
/// `from_wallet_id` is NULL for external deposits; `to_wallet_id` is NULL
/// for transfers to a raw chain address outside the system.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub from_wallet_id: Option<i64>,
    pub to_wallet_id: Option<i64>,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub tx_type: TransactionType,
    pub memo: Option<String>,
    pub blockchain_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(TransactionStatus::from_str("PENDING").unwrap(), TransactionStatus::Pending);
        assert_eq!(TransactionStatus::Completed.as_ref(), "COMPLETED");
        assert!(TransactionStatus::from_str("pending").is_err());
    }

    #[test]
    fn test_type_round_trip() {
        assert_eq!(TransactionType::from_str("GAS_TRANSFER").unwrap(), TransactionType::GasTransfer);
        assert_eq!(TransactionType::Deposit.as_ref(), "DEPOSIT");
    }
}
