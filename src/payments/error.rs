use actix_web::http::StatusCode;
use rust_decimal::Decimal;
use thiserror::Error;

/// Everything that can go wrong on the payment path. Each variant maps to a
/// stable machine-readable kind and an HTTP status; nothing here is ever
/// collapsed into a generic 200.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("{0}")]
    InvalidPaymentIdFormat(String),

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Wallet does not belong to the caller")]
    Unauthorized,

    #[error("Recipient wallet not found")]
    RecipientNotFound,

    #[error("Cannot transfer to the sending wallet")]
    SelfTransferNotAllowed,

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
        transaction_id: i64,
    },

    #[error("Transfer failed: {message}")]
    TransferFailed {
        message: String,
        transaction_id: i64,
    },

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Service is not active")]
    ServiceInactive,

    #[error("Invalid service payload: {reason}")]
    InvalidField { reason: String },

    #[error("No wallet specified and no default wallet is set")]
    NoWalletSpecified,

    #[error("Downstream service call failed: {message}")]
    DownstreamCallFailed { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Stable machine-readable kind for error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "MissingField",
            Self::InvalidAmount { .. } => "InvalidAmount",
            Self::InvalidPaymentIdFormat(_) => "InvalidPaymentIdFormat",
            Self::WalletNotFound => "WalletNotFound",
            Self::Unauthorized => "Unauthorized",
            Self::RecipientNotFound => "RecipientNotFound",
            Self::SelfTransferNotAllowed => "SelfTransferNotAllowed",
            Self::InsufficientFunds { .. } => "InsufficientFunds",
            Self::TransferFailed { .. } => "TransferFailed",
            Self::ServiceNotFound => "ServiceNotFound",
            Self::ServiceInactive => "ServiceInactive",
            Self::InvalidField { .. } => "InvalidField",
            Self::NoWalletSpecified => "NoWalletSpecified",
            Self::DownstreamCallFailed { .. } => "DownstreamCallFailed",
            Self::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingField { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidPaymentIdFormat(_)
            | Self::SelfTransferNotAllowed
            | Self::InsufficientFunds { .. }
            | Self::InvalidField { .. }
            | Self::NoWalletSpecified => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::WalletNotFound
            | Self::RecipientNotFound
            | Self::ServiceNotFound
            | Self::ServiceInactive => StatusCode::NOT_FOUND,
            Self::DownstreamCallFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::TransferFailed { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Id of the transaction row created for the attempt, when one exists.
    /// Always present for errors raised after the PENDING insert, so callers
    /// can trace a failed attempt.
    pub fn transaction_id(&self) -> Option<i64> {
        match self {
            Self::InsufficientFunds { transaction_id, .. }
            | Self::TransferFailed { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }

    /// JSON error envelope: `{"error": {"kind", "message", "transactionId"?}}`.
    pub fn to_body(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(id) = self.transaction_id() {
            error["transactionId"] = serde_json::json!(id);
        }
        serde_json::json!({ "error": error })
    }
}

impl From<rusqlite::Error> for PaymentError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(format!("database error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status_mapping() {
        assert_eq!(PaymentError::MissingField { field: "amount" }.kind(), "MissingField");
        assert_eq!(
            PaymentError::MissingField { field: "amount" }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(PaymentError::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(PaymentError::WalletNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            PaymentError::TransferFailed { message: "rpc".into(), transaction_id: 7 }
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err = PaymentError::DownstreamCallFailed { message: "rpc timeout".into() };
        assert_eq!(err.kind(), "DownstreamCallFailed");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_envelope_carries_transaction_id() {
        let err = PaymentError::InsufficientFunds {
            balance: "50".parse().unwrap(),
            requested: "999999".parse().unwrap(),
            transaction_id: 12,
        };
        let body = err.to_body();
        assert_eq!(body["error"]["kind"], "InsufficientFunds");
        assert_eq!(body["error"]["transactionId"], 12);

        let body = PaymentError::WalletNotFound.to_body();
        assert!(body["error"].get("transactionId").is_none());
    }
}
