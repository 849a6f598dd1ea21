//! Payment pipeline
//!
//! Request parsing and ordered validation, durable transaction recording
//! around the on-chain transfer, default-wallet resolution, and the paid
//! service orchestrator with its outbound HTTP invoker.

pub mod default_wallet;
mod error;
mod invoker;
mod orchestrator;
mod recorder;
mod validator;

pub use error::PaymentError;
pub use invoker::{HttpServiceInvoker, ServiceInvoker};
pub use orchestrator::{ExecuteServiceRequest, ServiceOrchestrator};
pub use recorder::{TransferDestination, TransferRecorder};
pub use validator::{validate_transfer, TransferRequest};
