use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Kind of agent a wallet belongs to. Stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
pub enum AgentType {
    #[strum(serialize = "SYSTEM")]
    #[serde(rename = "SYSTEM")]
    System,
    #[strum(serialize = "STORE")]
    #[serde(rename = "STORE")]
    Store,
    #[strum(serialize = "AI_AGENT")]
    #[serde(rename = "AI_AGENT")]
    AiAgent,
}

/// An agent wallet: a chain keypair plus a human-shareable 16-digit payment id.
///
/// The private key never leaves this record; API responses go through
/// [`WalletResponse`] which omits it.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub agent_name: String,
    pub agent_type: AgentType,
    pub payment_id: String,
    pub chain_address: String,
    pub chain_private_key: String,
    pub is_active: bool,
    /// Advisory only. The authoritative balance is always read live from the
    /// ledger gateway; this is refreshed opportunistically.
    pub cached_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape for a wallet. No private key, no raw chain plumbing the UI
/// doesn't need.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub id: i64,
    pub agent_name: String,
    pub agent_type: AgentType,
    pub payment_id: String,
    pub chain_address: String,
    pub is_active: bool,
    pub cached_balance: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletResponse {
    fn from(w: &Wallet) -> Self {
        Self {
            id: w.id,
            agent_name: w.agent_name.clone(),
            agent_type: w.agent_type,
            payment_id: w.payment_id.clone(),
            chain_address: w.chain_address.clone(),
            is_active: w.is_active,
            cached_balance: w.cached_balance.to_string(),
            created_at: w.created_at,
        }
    }
}

/// Strip embedded whitespace from a payment id as received on the wire.
/// Request bodies routinely contain card-number style grouping
/// ("1234 5678 9012 3456").
pub fn normalize_payment_id(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// A payment id is exactly 16 ASCII digits.
pub fn is_valid_payment_id(candidate: &str) -> bool {
    candidate.len() == 16 && candidate.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_grouping_spaces() {
        assert_eq!(normalize_payment_id("1234 5678 9012 3456"), "1234567890123456");
        assert_eq!(normalize_payment_id(" 1234567890123456 "), "1234567890123456");
    }

    #[test]
    fn test_payment_id_format() {
        assert!(is_valid_payment_id("1234567890123456"));
        assert!(!is_valid_payment_id("123456789012345")); // 15 digits
        assert!(!is_valid_payment_id("12345678901234567")); // 17 digits
        assert!(!is_valid_payment_id("123456789012345a"));
        assert!(!is_valid_payment_id(""));
    }

    #[test]
    fn test_agent_type_round_trip() {
        use std::str::FromStr;
        assert_eq!(AgentType::from_str("AI_AGENT").unwrap(), AgentType::AiAgent);
        assert_eq!(AgentType::Store.as_ref(), "STORE");
    }
}
