//! Shared fixtures: contract `A` at [`CALLER`] calls `Counter.inc()` at [`COUNTER`].

#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{address, b256, hex, keccak256, Address, Bytes, TxHash};
use qdb_common::types::{Trace, TraceStep};
use qdb_engine::{ContractArtifact, ContractRegistry, StaticTraceProvider, TransactionReceipt};

pub const CALLER: Address = address!("0x00000000000000000000000000000000000000aa");
pub const COUNTER: Address = address!("0x00000000000000000000000000000000000000bb");
pub const TX: TxHash = b256!("0xabababababababababababababababababababababababababababababababab");

pub const CALLER_SOURCE: &str =
    "contract A {\n    function run() public {\n        b.inc();\n    }\n}\n";
pub const COUNTER_SOURCE: &str =
    "contract Counter {\n    uint x;\n    function inc() public {\n        x += 1;\n    }\n}\n";

/// `PUSH1 00 PUSH1 00 CALL STOP`
pub fn caller_artifact() -> ContractArtifact {
    let json = serde_json::json!({
        "name": "A",
        "abi": [{"type": "function", "name": "run", "inputs": [], "outputs": [], "stateMutability": "nonpayable"}],
        "deployedBytecode": "0x60006000f100",
        "deployedSourceMap": "0:12:0:-;49:7;:::i;-1:0:-1:-",
        "sources": [{"index": 0, "path": "A.sol", "content": CALLER_SOURCE}],
    });
    ContractArtifact::from_json(&json.to_string()).unwrap()
}

/// `PUSH1 01 PUSH1 02 ADD STOP`
pub fn counter_artifact() -> ContractArtifact {
    let json = serde_json::json!({
        "name": "Counter",
        "abi": [{"type": "function", "name": "inc", "inputs": [], "outputs": [], "stateMutability": "nonpayable"}],
        "deployed_bytecode": "0x600160020100",
        "deployed_source_map": "0:8:0:-;67:6:0:-;;-1:0:-1:-",
        "sources": [{"index": 0, "path": "Counter.sol", "content": COUNTER_SOURCE}],
    });
    ContractArtifact::from_json(&json.to_string()).unwrap()
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Eight steps: `A` runs to its CALL, `Counter` runs to STOP, `A` stops.
pub fn nested_trace() -> Trace {
    let callee = format!("0x{}", hex::encode(COUNTER));
    let call_stack = ["0x20", "0x0", "0x4", "0x0", "0x0", callee.as_str(), "0xffff"];
    let mut word = hex::encode(selector("inc()"));
    word.push_str(&"0".repeat(56));

    Trace::from(vec![
        TraceStep::new(0, 0, "PUSH1"),
        TraceStep::new(1, 2, "PUSH1").with_stack(["0x0"]),
        TraceStep::new(2, 4, "CALL").with_stack(call_stack).with_memory([word]),
        TraceStep::new(3, 0, "PUSH1"),
        TraceStep::new(4, 2, "PUSH1").with_stack(["0x1"]),
        TraceStep::new(5, 4, "ADD").with_stack(["0x1", "0x2"]),
        TraceStep::new(6, 5, "STOP").with_stack(["0x3"]),
        TraceStep::new(7, 5, "STOP").with_stack(["0x1"]),
    ])
}

pub fn receipt() -> TransactionReceipt {
    TransactionReceipt {
        status: true,
        to: Some(CALLER),
        input: Bytes::from(selector("run()").to_vec()),
        ..Default::default()
    }
}

pub fn registry() -> Arc<ContractRegistry> {
    let registry = Arc::new(ContractRegistry::new());
    registry.register(CALLER, &caller_artifact()).unwrap();
    registry.register(COUNTER, &counter_artifact()).unwrap();
    registry
}

pub fn provider() -> StaticTraceProvider {
    StaticTraceProvider::new().with_transaction(TX, nested_trace(), receipt())
}
