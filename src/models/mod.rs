pub mod api_key;
pub mod service;
pub mod session;
pub mod transaction;
pub mod wallet;

pub use api_key::{ApiKey, ApiKeyResponse};
pub use service::{
    validate_payload, AuthMethod, FieldKind, RequestField, Service, ServiceResponse,
};
pub use session::Session;
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use wallet::{is_valid_payment_id, normalize_payment_id, AgentType, Wallet, WalletResponse};
