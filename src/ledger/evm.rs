//! EVM JSON-RPC implementation of the ledger gateway.
//!
//! Talks to a standard EVM RPC endpoint over HTTP, hand-encodes the two
//! ERC-20 calls the system needs (`balanceOf`, `transfer`), and signs
//! EIP-1559 transactions locally with the wallet's private key.

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip1559::Eip1559TransactionRequest;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, H256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::LedgerGateway;

/// ERC-20 function selectors: keccak("balanceOf(address)")[..4] and
/// keccak("transfer(address,uint256)")[..4].
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// How long to poll for a transfer receipt before giving up. A missing
/// receipt surfaces as a gateway error; the transaction row it belongs to
/// is finalized FAILED by the recorder.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<Value>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    #[allow(dead_code)]
    transaction_hash: H256,
    status: Option<U64>,
}

/// Real gateway against an EVM chain. One instance per process, shared via
/// `Arc<dyn LedgerGateway>`.
pub struct EvmLedgerGateway {
    client: reqwest::Client,
    rpc_url: String,
    chain_id: u64,
    token_address: Address,
}

impl EvmLedgerGateway {
    pub fn new(rpc_url: &str, chain_id: u64, token_address: &str) -> Result<Self, String> {
        let token_address: Address = token_address
            .parse()
            .map_err(|_| format!("Invalid token contract address: {}", token_address))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            chain_id,
            token_address,
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, String> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: 1,
        };

        log::debug!("[ledger] {} to {}", method, self.rpc_url);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("RPC request failed: {}", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read RPC response: {}", e))?;

        if !status.is_success() {
            return Err(format!("RPC error ({}): {}", status, body));
        }

        let rpc_response: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse RPC response: {} - body: {}", e, body))?;

        if let Some(error) = rpc_response.error {
            return Err(format!("RPC error {}: {}", error.code, error.message));
        }

        rpc_response
            .result
            .ok_or_else(|| "RPC returned null result".to_string())
    }

    fn parse_hex_u256(result: &Value, what: &str) -> Result<U256, String> {
        let hex_str = result
            .as_str()
            .ok_or_else(|| format!("Invalid {} response", what))?;
        U256::from_str_radix(hex_str.trim_start_matches("0x"), 16)
            .map_err(|e| format!("Failed to parse {}: {}", what, e))
    }

    async fn get_nonce(&self, address: Address) -> Result<U256, String> {
        let params = json!([format!("{:?}", address), "pending"]);
        let result = self.rpc_call("eth_getTransactionCount", params).await?;
        Self::parse_hex_u256(&result, "nonce")
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
        value: U256,
    ) -> Result<U256, String> {
        let params = json!([{
            "from": format!("{:?}", from),
            "to": format!("{:?}", to),
            "data": format!("0x{}", hex::encode(data)),
            "value": format!("0x{:x}", value)
        }]);
        let result = self.rpc_call("eth_estimateGas", params).await?;
        Self::parse_hex_u256(&result, "gas estimate")
    }

    /// EIP-1559 fee estimate. Some RPC providers report an implausibly high
    /// priority fee, so it is capped at the base gas price.
    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256), String> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        let gas_price = Self::parse_hex_u256(&result, "gas price")?;

        let result = self.rpc_call("eth_maxPriorityFeePerGas", json!([])).await?;
        let priority_fee = Self::parse_hex_u256(&result, "priority fee")?;

        let capped_priority_fee = std::cmp::min(priority_fee, gas_price);
        let max_fee = gas_price + gas_price / 10;
        Ok((max_fee, capped_priority_fee))
    }

    async fn get_receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, String> {
        let params = json!([format!("{:?}", tx_hash)]);
        let result = self.rpc_call("eth_getTransactionReceipt", params).await?;
        if result.is_null() {
            return Ok(None);
        }
        let receipt: TransactionReceipt = serde_json::from_value(result)
            .map_err(|e| format!("Failed to parse receipt: {}", e))?;
        Ok(Some(receipt))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt, String> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_secs(2);

        loop {
            if start.elapsed() > RECEIPT_TIMEOUT {
                return Err(format!("Timeout waiting for tx receipt: {:?}", tx_hash));
            }
            match self.get_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => tokio::time::sleep(poll_interval).await,
                Err(e) => {
                    log::warn!("[ledger] error fetching receipt: {}, retrying...", e);
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    /// Sign and broadcast one transaction, then wait for its receipt.
    /// Returns the transaction hash on chain success; a reverted transaction
    /// is an error like any other gateway failure.
    async fn send_transaction(
        &self,
        from_private_key: &str,
        to: Address,
        data: Vec<u8>,
        value: U256,
    ) -> Result<String, String> {
        let wallet: LocalWallet = from_private_key
            .parse::<LocalWallet>()
            .map_err(|e| format!("Invalid private key: {}", e))?
            .with_chain_id(self.chain_id);
        let from = wallet.address();

        let nonce = self.get_nonce(from).await?;
        let gas = self.estimate_gas(from, to, &data, value).await?;
        let gas = gas * U256::from(120) / U256::from(100); // 20% buffer
        let (max_fee, priority_fee) = self.estimate_eip1559_fees().await?;

        log::info!(
            "[ledger] signing tx: to={:?}, value={}, data_len={}, gas={}, nonce={}",
            to,
            value,
            data.len(),
            gas,
            nonce
        );

        let tx = Eip1559TransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .data(data)
            .nonce(nonce)
            .gas(gas)
            .max_fee_per_gas(max_fee)
            .max_priority_fee_per_gas(priority_fee)
            .chain_id(self.chain_id);

        let typed_tx: TypedTransaction = tx.into();
        let signature = wallet
            .sign_transaction(&typed_tx)
            .await
            .map_err(|e| format!("Failed to sign transaction: {}", e))?;
        let raw = typed_tx.rlp_signed(&signature);

        let params = json!([format!("0x{}", hex::encode(&raw))]);
        let result = self.rpc_call("eth_sendRawTransaction", params).await?;
        let hash_hex = result
            .as_str()
            .ok_or_else(|| "Invalid sendRawTransaction response".to_string())?;
        let tx_hash: H256 = hash_hex
            .parse()
            .map_err(|e| format!("Failed to parse tx hash: {}", e))?;

        let receipt = self.wait_for_receipt(tx_hash).await?;
        match receipt.status {
            Some(status) if status == U64::one() => Ok(format!("{:?}", tx_hash)),
            _ => Err(format!("Transaction {:?} reverted on chain", tx_hash)),
        }
    }
}

/// ABI-encode `balanceOf(address)` calldata.
fn encode_balance_of(owner: Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(owner.as_bytes());
    data
}

/// ABI-encode `transfer(address,uint256)` calldata.
fn encode_transfer(to: Address, amount: U256) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to.as_bytes());
    let mut amount_bytes = [0u8; 32];
    amount.to_big_endian(&mut amount_bytes);
    data.extend_from_slice(&amount_bytes);
    data
}

fn parse_address(address: &str) -> Result<Address, String> {
    address
        .parse()
        .map_err(|_| format!("Invalid chain address: {}", address))
}

#[async_trait]
impl LedgerGateway for EvmLedgerGateway {
    async fn token_balance(&self, address: &str) -> Result<U256, String> {
        let owner = parse_address(address)?;
        let calldata = encode_balance_of(owner);
        let params = json!([
            {
                "to": format!("{:?}", self.token_address),
                "data": format!("0x{}", hex::encode(&calldata))
            },
            "latest"
        ]);
        let result = self.rpc_call("eth_call", params).await?;
        Self::parse_hex_u256(&result, "token balance")
    }

    async fn transfer_token(
        &self,
        from_private_key: &str,
        to_address: &str,
        amount: U256,
    ) -> Result<String, String> {
        let to = parse_address(to_address)?;
        let calldata = encode_transfer(to, amount);
        self.send_transaction(from_private_key, self.token_address, calldata, U256::zero())
            .await
    }

    async fn transfer_native(
        &self,
        from_private_key: &str,
        to_address: &str,
        amount_wei: U256,
    ) -> Result<String, String> {
        let to = parse_address(to_address)?;
        self.send_transaction(from_private_key, to, Vec::new(), amount_wei)
            .await
    }
}
