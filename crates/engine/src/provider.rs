// QDB - Contract Trace Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Trace providers: the boundary to the node (or VM) that replays transactions.
//!
//! The engine never talks to a node directly. Sessions are opened through a
//! [`TraceProvider`], which yields the linear opcode trace of a transaction
//! and the receipt data needed to place its root frame.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy_primitives::{Address, Bytes, TxHash, U64};
use dashmap::DashMap;
use qdb_common::types::{StructLogTrace, Trace};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{analysis::RootFrame, ProviderError};

/// Receipt data of a replayed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Whether the transaction succeeded
    pub status: bool,
    /// Gas used by the transaction
    pub gas_used: u64,
    /// Block the transaction was included in
    pub block_number: Option<u64>,
    /// Sender
    pub from: Address,
    /// Recipient, `None` for deployments
    pub to: Option<Address>,
    /// Deployed contract, for deployments
    pub contract_address: Option<Address>,
    /// Transaction input
    #[serde(default)]
    pub input: Bytes,
}

impl TransactionReceipt {
    /// The root frame this transaction executes in.
    pub fn root_frame(&self) -> RootFrame {
        match self.to {
            Some(to) => RootFrame::call(to, self.input.clone()),
            None => RootFrame::creation(self.contract_address),
        }
    }
}

/// Supplies traces and receipts for transactions.
pub trait TraceProvider: Send + Sync + 'static {
    /// Fetch the per-opcode trace of a transaction.
    fn fetch_trace(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Trace, ProviderError>> + Send;

    /// Fetch receipt data of a transaction.
    fn fetch_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<TransactionReceipt, ProviderError>> + Send;
}

/// Receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<U64>,
    gas_used: U64,
    #[serde(default)]
    block_number: Option<U64>,
    from: Address,
    #[serde(default)]
    to: Option<Address>,
    #[serde(default)]
    contract_address: Option<Address>,
}

/// Transaction as returned by `eth_getTransactionByHash`, reduced to what we need.
#[derive(Debug, Deserialize)]
struct RpcTransaction {
    #[serde(default)]
    input: Bytes,
}

/// Fetches traces from a node over JSON-RPC (`debug_traceTransaction`).
#[derive(Debug)]
pub struct JsonRpcTraceProvider {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcTraceProvider {
    /// Create a provider for the node at `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into(), next_id: AtomicU64::new(1) })
    }

    /// The node URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a JSON-RPC call. A `null` result yields `None`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        debug!(method, id, url = %self.url, "sending request to node");
        let response: Value = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(ProviderError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        match response.get("result") {
            None | Some(Value::Null) => Ok(None),
            Some(result) => Ok(Some(serde_json::from_value(result.clone())?)),
        }
    }
}

impl TraceProvider for JsonRpcTraceProvider {
    async fn fetch_trace(&self, tx_hash: TxHash) -> Result<Trace, ProviderError> {
        let options = json!({
            "enableMemory": true,
            "disableStack": false,
            "disableStorage": false,
            "enableReturnData": false,
        });
        let result: StructLogTrace = self
            .call("debug_traceTransaction", json!([tx_hash, options]))
            .await?
            .ok_or(ProviderError::NotFound(tx_hash))?;

        if result.struct_logs.is_empty() {
            return Err(ProviderError::EmptyTrace);
        }

        let trace = Trace::from_struct_logs(result.struct_logs);
        info!(%tx_hash, steps = trace.len(), failed = result.failed, "fetched trace");
        Ok(trace)
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt, ProviderError> {
        let receipt: RpcReceipt = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?
            .ok_or(ProviderError::NotFound(tx_hash))?;
        let transaction: RpcTransaction = self
            .call("eth_getTransactionByHash", json!([tx_hash]))
            .await?
            .ok_or(ProviderError::NotFound(tx_hash))?;

        Ok(TransactionReceipt {
            status: receipt.status.is_some_and(|s| s == U64::from(1)),
            gas_used: receipt.gas_used.to(),
            block_number: receipt.block_number.map(|n| n.to()),
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            input: transaction.input,
        })
    }
}

/// Serves traces held in memory. Used for offline replay and tests.
#[derive(Debug, Default)]
pub struct StaticTraceProvider {
    entries: DashMap<TxHash, (Trace, TransactionReceipt)>,
}

impl StaticTraceProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a transaction available
    pub fn insert(&self, tx_hash: TxHash, trace: Trace, receipt: TransactionReceipt) {
        self.entries.insert(tx_hash, (trace, receipt));
    }

    /// Builder-style [`StaticTraceProvider::insert`]
    pub fn with_transaction(self, tx_hash: TxHash, trace: Trace, receipt: TransactionReceipt) -> Self {
        self.insert(tx_hash, trace, receipt);
        self
    }
}

impl TraceProvider for StaticTraceProvider {
    async fn fetch_trace(&self, tx_hash: TxHash) -> Result<Trace, ProviderError> {
        let trace = self
            .entries
            .get(&tx_hash)
            .map(|entry| entry.0.clone())
            .ok_or(ProviderError::NotFound(tx_hash))?;
        if trace.is_empty() {
            return Err(ProviderError::EmptyTrace);
        }
        Ok(trace)
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt, ProviderError> {
        self.entries.get(&tx_hash).map(|entry| entry.1.clone()).ok_or(ProviderError::NotFound(tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};
    use qdb_common::{ensure_test_logging, types::TraceStep};
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const TX: TxHash = b256!("0x608d79d71287ca8a0351955a92fa4dce74d2c75cbfccfa08ed331b33de0ce4c2");

    async fn mock_node() -> (JsonRpcTraceProvider, MockServer) {
        let server = MockServer::start().await;
        let provider = JsonRpcTraceProvider::new(server.uri(), Duration::from_secs(5)).unwrap();
        (provider, server)
    }

    fn rpc_result(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    #[tokio::test]
    async fn test_fetch_trace_converts_struct_logs() {
        ensure_test_logging(None);
        let (provider, server) = mock_node().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({ "method": "debug_traceTransaction" })))
            .respond_with(rpc_result(json!({
                "gas": 21000,
                "failed": false,
                "returnValue": "",
                "structLogs": [
                    {"pc": 0, "op": "PUSH1", "gas": 100, "gasCost": 3, "depth": 1, "stack": []},
                    {"pc": 2, "op": "STOP", "gas": 97, "gasCost": 0, "depth": 1, "stack": ["0x1"]}
                ]
            })))
            .mount(&server)
            .await;

        let trace = provider.fetch_trace(TX).await.unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].opcode_name, "STOP");
        assert_eq!(trace[1].stack, vec!["0x1".to_string()]);
        assert_eq!(trace[1].tracer_depth, Some(1));
    }

    #[tokio::test]
    async fn test_fetch_trace_errors() {
        ensure_test_logging(None);
        let (provider, server) = mock_node().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "transaction not found" }
            })))
            .mount(&server)
            .await;

        match provider.fetch_trace(TX).await {
            Err(ProviderError::Rpc { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "transaction not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_receipt() {
        ensure_test_logging(None);
        let (provider, server) = mock_node().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
            .respond_with(rpc_result(json!({
                "status": "0x1",
                "gasUsed": "0x5208",
                "blockNumber": "0x10",
                "from": "0x00000000000000000000000000000000000000aa",
                "to": "0x00000000000000000000000000000000000000bb",
                "contractAddress": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getTransactionByHash" })))
            .respond_with(rpc_result(json!({ "input": "0xd09de08a" })))
            .mount(&server)
            .await;

        let receipt = provider.fetch_receipt(TX).await.unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.gas_used, 21000);
        assert_eq!(receipt.block_number, Some(16));
        assert_eq!(receipt.to, Some(address!("0x00000000000000000000000000000000000000bb")));
        assert_eq!(receipt.input, Bytes::from(vec![0xd0, 0x9d, 0xe0, 0x8a]));

        let root = receipt.root_frame();
        assert!(!root.is_creation);
        assert_eq!(root.address, receipt.to);
    }

    #[tokio::test]
    async fn test_null_result_is_not_found() {
        ensure_test_logging(None);
        let (provider, server) = mock_node().await;

        Mock::given(method("POST")).respond_with(rpc_result(Value::Null)).mount(&server).await;

        assert!(matches!(provider.fetch_receipt(TX).await, Err(ProviderError::NotFound(h)) if h == TX));
    }

    #[tokio::test]
    async fn test_static_provider() {
        ensure_test_logging(None);
        let trace = Trace::from(vec![TraceStep::new(0, 0, "STOP")]);
        let provider =
            StaticTraceProvider::new().with_transaction(TX, trace.clone(), TransactionReceipt::default());

        assert_eq!(provider.fetch_trace(TX).await.unwrap(), trace);
        assert!(provider.fetch_receipt(TX).await.is_ok());
        assert!(matches!(provider.fetch_trace(TxHash::ZERO).await, Err(ProviderError::NotFound(_))));

        provider.insert(TxHash::ZERO, Trace::new(), TransactionReceipt::default());
        assert!(matches!(provider.fetch_trace(TxHash::ZERO).await, Err(ProviderError::EmptyTrace)));
    }

    #[test]
    fn test_creation_root_frame() {
        ensure_test_logging(None);
        let created = address!("0x00000000000000000000000000000000000000cc");
        let receipt = TransactionReceipt { contract_address: Some(created), ..Default::default() };
        let root = receipt.root_frame();
        assert!(root.is_creation);
        assert_eq!(root.address, Some(created));
    }
}
