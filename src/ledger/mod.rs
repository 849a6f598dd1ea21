//! Ledger Gateway
//!
//! Narrow interface over the on-chain token contract. The payment core only
//! ever needs two things from the chain: a live balance read and a transfer
//! signed with a wallet's private key. Everything else (RPC plumbing, gas
//! estimation, receipt polling) stays behind [`LedgerGateway`], which also
//! makes the core testable against a mock.
//!
//! Human-facing amounts are `Decimal`; the chain side is `U256` base units
//! with a fixed token decimal count (6 for USDC).

mod evm;

pub use evm::EvmLedgerGateway;

use async_trait::async_trait;
use ethers::types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// External collaborator performing actual on-chain balance/transfer
/// operations. Every call can fail or time out; failures are terminal for
/// the request that made them (no retry loop lives below this trait).
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Token balance of an address, in base units.
    async fn token_balance(&self, address: &str) -> Result<U256, String>;

    /// Transfer `amount` base units of the token from the keypair behind
    /// `from_private_key` to `to_address`. Returns the transaction hash.
    async fn transfer_token(
        &self,
        from_private_key: &str,
        to_address: &str,
        amount: U256,
    ) -> Result<String, String>;

    /// Transfer native currency (gas money), in wei.
    async fn transfer_native(
        &self,
        from_private_key: &str,
        to_address: &str,
        amount_wei: U256,
    ) -> Result<String, String>;
}

/// Convert a human-readable decimal amount to token base units.
/// "1.5" with 6 decimals -> 1_500_000. Rejects negative amounts and more
/// fractional digits than the token carries.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256, String> {
    if amount.is_sign_negative() {
        return Err(format!("Amount must not be negative: {}", amount));
    }
    if amount.scale() > decimals {
        return Err(format!(
            "Amount {} has more than {} decimal places",
            amount, decimals
        ));
    }
    let scaled = amount
        .checked_mul(Decimal::from(10u64.pow(decimals)))
        .ok_or_else(|| format!("Amount {} overflows base units", amount))?;
    let units = scaled
        .to_u128()
        .ok_or_else(|| format!("Amount {} does not fit in base units", amount))?;
    Ok(U256::from(units))
}

/// Convert base units back to a human-readable decimal amount.
pub fn from_base_units(units: U256, decimals: u32) -> Result<Decimal, String> {
    let raw = u128::try_from(units)
        .map_err(|_| format!("Balance {} too large to represent", units))?;
    if raw > i128::MAX as u128 {
        return Err(format!("Balance {} too large to represent", units));
    }
    let value = Decimal::try_from_i128_with_scale(raw as i128, decimals)
        .map_err(|e| format!("Balance {} not representable: {}", units, e))?;
    Ok(value.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units("0.01".parse().unwrap(), 6).unwrap(), U256::from(10_000u64));
        assert_eq!(to_base_units("1".parse().unwrap(), 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(to_base_units("0.000001".parse().unwrap(), 6).unwrap(), U256::from(1u64));
        assert!(to_base_units("0.0000001".parse().unwrap(), 6).is_err());
        assert!(to_base_units("-1".parse().unwrap(), 6).is_err());
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(U256::from(10_000u64), 6).unwrap(), "0.01".parse().unwrap());
        assert_eq!(from_base_units(U256::from(50_000_000u64), 6).unwrap(), "50".parse().unwrap());
    }

    #[test]
    fn test_round_trip_at_scale() {
        let amount: Decimal = "123.456789".parse().unwrap();
        let units = to_base_units(amount, 6).unwrap();
        assert_eq!(from_base_units(units, 6).unwrap(), amount);
    }
}
