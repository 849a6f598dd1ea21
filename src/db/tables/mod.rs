//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod api_keys; // api_keys (hashed credentials + permissions)
mod services; // services (priced capabilities)
mod sessions; // sessions (login tokens)
mod transactions; // transactions (transfer audit trail)
mod user_settings; // user_settings (default-wallet pointer)
mod wallets; // wallets (agent wallets + chain keypairs)

pub use services::NewService;
pub use transactions::TransactionFilter;
