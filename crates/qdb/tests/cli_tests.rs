use std::{fs, path::Path};

use alloy_primitives::{hex, keccak256};
use assert_cmd::Command;
use predicates::prelude::*;
use qdb_common::ensure_test_logging;
use tempfile::TempDir;
use tracing::info;

const COUNTER: &str = "0x00000000000000000000000000000000000000bb";

const ARTIFACT: &str = r#"{
    "name": "Counter",
    "abi": [{"type": "function", "name": "inc", "inputs": [], "outputs": [], "stateMutability": "nonpayable"}],
    "deployedBytecode": "0x600160020100",
    "deployedSourceMap": "0:8:0:-;67:6:0:-;;-1:0:-1:-",
    "sources": [{
        "index": 0,
        "path": "Counter.sol",
        "content": "contract Counter {\n    uint x;\n    function inc() public {\n        x += 1;\n    }\n}\n"
    }]
}"#;

const TRACE: &str = r#"{"gas": 21000, "failed": false, "returnValue": "", "structLogs": [
    {"pc": 0, "op": "PUSH1", "gas": 100, "gasCost": 3, "depth": 1, "stack": []},
    {"pc": 2, "op": "PUSH1", "gas": 97, "gasCost": 3, "depth": 1, "stack": ["0x1"]},
    {"pc": 4, "op": "ADD", "gas": 94, "gasCost": 3, "depth": 1, "stack": ["0x1", "0x2"]},
    {"pc": 5, "op": "STOP", "gas": 91, "gasCost": 0, "depth": 1, "stack": ["0x3"]}
]}"#;

fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Counter.json"), ARTIFACT).unwrap();
    fs::write(dir.path().join("trace.json"), TRACE).unwrap();
    // keep a stray ~/.qdb.toml from leaking into the tests
    fs::write(dir.path().join("qdb.toml"), "").unwrap();
    dir
}

fn qdb(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("qdb").unwrap();
    cmd.env_remove("QDB_RPC_URL").env_remove("QDB_PORT").env_remove("RUST_LOG");
    cmd.arg("--config").arg(dir.join("qdb.toml"));
    cmd
}

#[test]
fn test_help_command() {
    ensure_test_logging(None);
    info!("Testing CLI help command");

    let mut cmd = Command::cargo_bin("qdb").unwrap();
    cmd.arg("--help").assert().success().stdout(predicate::str::contains("Contract Trace Debugger"));
}

#[test]
fn test_version_command() {
    ensure_test_logging(None);
    let mut cmd = Command::cargo_bin("qdb").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("qdb"));
}

#[test]
fn test_missing_subcommand() {
    ensure_test_logging(None);
    let mut cmd = Command::cargo_bin("qdb").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_disasm_inline() {
    ensure_test_logging(None);
    let dir = fixture();
    qdb(dir.path())
        .args(["disasm", "0x60016002015f00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0000: PUSH1 0x01"))
        .stdout(predicate::str::contains("0004: ADD"))
        .stdout(predicate::str::contains("0005: PUSH0"))
        .stdout(predicate::str::contains("0006: STOP"));
}

#[test]
fn test_disasm_from_file_without_pc() {
    ensure_test_logging(None);
    let dir = fixture();
    let code = dir.path().join("code.hex");
    fs::write(&code, "6080604052\n").unwrap();

    qdb(dir.path())
        .arg("disasm")
        .arg("--file")
        .arg(&code)
        .arg("--no-pc")
        .assert()
        .success()
        .stdout(predicate::str::diff("PUSH1 0x80\nPUSH1 0x40\nMSTORE\n"));
}

#[test]
fn test_disasm_rejects_odd_hex() {
    ensure_test_logging(None);
    let dir = fixture();
    qdb(dir.path())
        .args(["disasm", "0x123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed bytecode"));
}

#[test]
fn test_replay_session() {
    ensure_test_logging(None);
    let dir = fixture();
    let selector = format!("0x{}", hex::encode(&keccak256("inc()")[..4]));

    qdb(dir.path())
        .arg("replay")
        .arg("--trace")
        .arg(dir.path().join("trace.json"))
        .arg("--artifact")
        .arg(format!("{COUNTER}={}", dir.path().join("Counter.json").display()))
        .args(["--input", &selector])
        .write_stdin("s\nbreak Counter.sol:4\nr\nc\nbt\nn\nn\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[0/3] pc=0x0000 PUSH1 depth=0 gas=100"))
        .stdout(predicate::str::contains("at Counter.sol:1:1  contract"))
        .stdout(predicate::str::contains("at Counter.sol:4:9  x += 1"))
        .stdout(predicate::str::contains("breakpoint set at Counter.sol:4"))
        .stdout(predicate::str::contains("::inc @ step 0"))
        .stdout(predicate::str::contains("[3/3] pc=0x0005 STOP"))
        .stdout(predicate::str::contains("(no source)"));
}

#[test]
fn test_replay_missing_trace_file() {
    ensure_test_logging(None);
    let dir = fixture();
    qdb(dir.path())
        .arg("replay")
        .arg("--trace")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read trace file"));
}

#[test]
fn test_replay_rejects_bad_artifact_argument() {
    ensure_test_logging(None);
    let dir = fixture();
    qdb(dir.path())
        .arg("replay")
        .arg("--trace")
        .arg(dir.path().join("trace.json"))
        .args(["--artifact", "Counter.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ADDRESS=FILE"));
}
