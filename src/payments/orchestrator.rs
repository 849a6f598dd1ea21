//! Service Execution Orchestrator
//!
//! Couples a payment to an optional downstream provider call and reports
//! one combined outcome. The ordering is deliberate and pay-first: the
//! payment transaction reaches its terminal state before any downstream
//! call is attempted, and a failing downstream call does not refund the
//! already-committed payment. The transaction memo gets an appended
//! ` | Service Response: SUCCESS` / `FAILED` marker so operators can
//! reconcile the two legs manually.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::db::Database;
use crate::models::{validate_payload, AuthMethod, Service, Transaction};

use super::default_wallet;
use super::error::PaymentError;
use super::invoker::{OutboundCall, ServiceInvoker};
use super::recorder::{TransferDestination, TransferRecorder};
use super::validator::ValidatedTransfer;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteServiceRequest {
    pub service_id: Option<i64>,
    /// Omitted means "use my default wallet".
    pub from_wallet_id: Option<i64>,
    pub request_details: Option<String>,
    #[serde(default)]
    pub service_payload: HashMap<String, String>,
}

/// Combined outcome of one execution: the payment transaction (always, in
/// its terminal state) plus the downstream leg's result.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub success: bool,
    pub transaction: Transaction,
    pub service_response: Option<Value>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct ServiceOrchestrator {
    db: Arc<Database>,
    recorder: TransferRecorder,
    invoker: Arc<dyn ServiceInvoker>,
}

impl ServiceOrchestrator {
    pub fn new(
        db: Arc<Database>,
        recorder: TransferRecorder,
        invoker: Arc<dyn ServiceInvoker>,
    ) -> Self {
        Self { db, recorder, invoker }
    }

    /// Execute a paid service call for the authenticated caller.
    ///
    /// Errors out of this function mean no payment was committed (or, for
    /// `InsufficientFunds`/`TransferFailed`, that the payment attempt itself
    /// failed and is recorded as FAILED). A committed payment with a failed
    /// downstream leg is NOT an error: it returns `Ok` with `success=false`.
    pub async fn execute_service(
        &self,
        auth: &AuthContext,
        req: &ExecuteServiceRequest,
    ) -> Result<ExecutionReport, PaymentError> {
        let service_id = req
            .service_id
            .ok_or(PaymentError::MissingField { field: "serviceId" })?;

        // 1. Resolve the payer wallet, falling back to the default pointer.
        let from_wallet_id = match req.from_wallet_id {
            Some(id) => id,
            None => default_wallet::resolve(&self.db, auth.user_id)?
                .ok_or(PaymentError::NoWalletSpecified)?,
        };

        // 2. Load the service.
        let service = self
            .db
            .get_service(service_id)?
            .ok_or(PaymentError::ServiceNotFound)?;
        if !service.is_active {
            return Err(PaymentError::ServiceInactive);
        }

        // 3. Payer wallet: exists, owned by caller, active.
        let from = self
            .db
            .get_wallet(from_wallet_id)?
            .ok_or(PaymentError::WalletNotFound)?;
        if from.user_id != auth.user_id {
            return Err(PaymentError::Unauthorized);
        }
        if !from.is_active {
            return Err(PaymentError::WalletNotFound);
        }

        // The service's own wallet is the payee.
        let payee = self
            .db
            .get_wallet(service.wallet_id)?
            .filter(|w| w.is_active)
            .ok_or(PaymentError::RecipientNotFound)?;

        // 4. Validate the payload against the service's declared fields
        //    before any money moves.
        let payload = validate_payload(&service.request_fields, &req.service_payload)
            .map_err(|reason| PaymentError::InvalidField { reason })?;

        let request_details = req.request_details.clone().unwrap_or_default();
        let memo = if request_details.is_empty() {
            format!("Service: {}", service.name)
        } else {
            format!("Service: {} | {}", service.name, request_details)
        };

        let validated = ValidatedTransfer {
            from,
            dest: TransferDestination::Wallet(payee),
            amount: service.price_per_request,
            memo: Some(memo),
        };

        // 5. Pay first. A payment failure ends the execution here; the
        //    downstream provider is never contacted.
        let outcome = self
            .recorder
            .record_transfer(
                &validated.from,
                &validated.dest,
                validated.amount,
                validated.memo.as_deref(),
            )
            .await?;
        let transaction_id = outcome.transaction.id;

        // 6. Manual service: no endpoint, nothing to call.
        let endpoint = match &service.api_endpoint {
            Some(url) => url.clone(),
            None => {
                log::info!(
                    "[orchestrator] service {} is manual, payment {} recorded",
                    service.id,
                    transaction_id
                );
                return Ok(ExecutionReport {
                    success: true,
                    transaction: outcome.transaction,
                    service_response: Some(json!({
                        "type": "manual_service",
                        "message": format!(
                            "Payment sent. '{}' is fulfilled manually by the provider; \
                             they have been notified of your request.",
                            service.name
                        ),
                    })),
                    error: None,
                });
            }
        };

        // 7. Downstream call.
        let call = build_outbound_call(&service, &endpoint, &request_details, &payload);
        let (success, service_response, error) = match self.invoker.invoke(&call).await {
            Ok(resp) => {
                log::info!(
                    "[orchestrator] service {} responded {} for payment {}",
                    service.id,
                    resp.status,
                    transaction_id
                );
                (true, Some(resp.body), None)
            }
            Err(message) => {
                log::warn!(
                    "[orchestrator] service {} call failed for payment {}: {}",
                    service.id,
                    transaction_id,
                    message
                );
                (false, None, Some(message))
            }
        };

        // 8. Annotate the payment memo with the downstream outcome. The
        //    payment stays COMPLETED either way; there is no automatic
        //    compensating refund.
        let marker = if success {
            " | Service Response: SUCCESS"
        } else {
            " | Service Response: FAILED"
        };
        if let Err(e) = self.db.append_transaction_memo(transaction_id, marker) {
            log::warn!(
                "[orchestrator] memo annotation failed for transaction {}: {}",
                transaction_id,
                e
            );
        }
        let transaction = self
            .db
            .get_transaction(transaction_id)?
            .unwrap_or(outcome.transaction);

        Ok(ExecutionReport {
            success,
            transaction,
            service_response,
            error,
        })
    }
}

/// Assemble the outbound request: provider auth header plus a body carrying
/// the execution envelope with the validated payload merged in.
fn build_outbound_call(
    service: &Service,
    endpoint: &str,
    request_details: &str,
    payload: &HashMap<String, String>,
) -> OutboundCall {
    let mut headers = Vec::new();
    match service.auth_method {
        AuthMethod::None => {}
        AuthMethod::ApiKey => {
            let name = service
                .auth_header_name
                .clone()
                .unwrap_or_else(|| "X-API-Key".to_string());
            headers.push((name, service.auth_secret.clone().unwrap_or_default()));
        }
        AuthMethod::BearerToken => {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", service.auth_secret.clone().unwrap_or_default()),
            ));
        }
        AuthMethod::BasicAuth => {
            let credentials = format!(
                "{}:{}",
                service.auth_username.clone().unwrap_or_default(),
                service.auth_secret.clone().unwrap_or_default()
            );
            let encoded = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                credentials,
            );
            headers.push(("Authorization".to_string(), format!("Basic {}", encoded)));
        }
    }

    let mut body = json!({
        "serviceId": service.id,
        "serviceName": service.name,
        "requestDetails": request_details,
        "timestamp": Utc::now().to_rfc3339(),
    });
    for (key, value) in payload {
        body[key] = json!(value);
    }

    OutboundCall {
        url: endpoint.to_string(),
        method: service
            .api_method
            .clone()
            .unwrap_or_else(|| "POST".to_string())
            .to_uppercase(),
        headers,
        body,
    }
}
