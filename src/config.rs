use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const RPC_URL: &str = "RPC_URL";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const TOKEN_ADDRESS: &str = "TOKEN_ADDRESS";
    pub const TOKEN_DECIMALS: &str = "TOKEN_DECIMALS";
    pub const CURRENCY: &str = "CURRENCY";
    pub const ADMIN_TOKEN: &str = "ADMIN_TOKEN";
    // Optional gas funder: new wallets get a starter native-currency drip
    pub const GAS_FUNDER_PRIVATE_KEY: &str = "GAS_FUNDER_PRIVATE_KEY";
    pub const GAS_FUND_AMOUNT: &str = "GAS_FUND_AMOUNT";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/vypr.db";
    pub const RPC_URL: &str = "https://mainnet.base.org";
    pub const CHAIN_ID: u64 = 8453;
    // USDC on Base
    pub const TOKEN_ADDRESS: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
    pub const TOKEN_DECIMALS: u32 = 6;
    pub const CURRENCY: &str = "USDC";
    /// Native units, as a decimal string (0.0002 ETH).
    pub const GAS_FUND_AMOUNT: &str = "0.0002";
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub token_address: String,
    pub token_decimals: u32,
    pub currency: String,
    /// Shared secret exchanged for an admin session at login.
    pub admin_token: Option<String>,
    pub gas_funder_private_key: Option<String>,
    pub gas_fund_amount: String,
}

impl Config {
    pub fn from_env() -> Self {
        let admin_token = env::var(env_vars::ADMIN_TOKEN).ok().filter(|t| !t.is_empty());
        if admin_token.is_none() {
            log::warn!(
                "{} is not set; the login endpoint is disabled until it is",
                env_vars::ADMIN_TOKEN
            );
        }

        Self {
            port: env_or(env_vars::PORT, defaults::PORT),
            database_url: env::var(env_vars::DATABASE_URL)
                .unwrap_or_else(|_| defaults::DATABASE_URL.to_string()),
            rpc_url: env::var(env_vars::RPC_URL)
                .unwrap_or_else(|_| defaults::RPC_URL.to_string()),
            chain_id: env_or(env_vars::CHAIN_ID, defaults::CHAIN_ID),
            token_address: env::var(env_vars::TOKEN_ADDRESS)
                .unwrap_or_else(|_| defaults::TOKEN_ADDRESS.to_string()),
            token_decimals: env_or(env_vars::TOKEN_DECIMALS, defaults::TOKEN_DECIMALS),
            currency: env::var(env_vars::CURRENCY)
                .unwrap_or_else(|_| defaults::CURRENCY.to_string()),
            admin_token,
            gas_funder_private_key: env::var(env_vars::GAS_FUNDER_PRIVATE_KEY)
                .ok()
                .filter(|k| !k.is_empty()),
            gas_fund_amount: env::var(env_vars::GAS_FUND_AMOUNT)
                .unwrap_or_else(|_| defaults::GAS_FUND_AMOUNT.to_string()),
        }
    }
}
