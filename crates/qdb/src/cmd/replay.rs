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

//! Offline replay: open a session over a trace file and drive it from a
//! line-oriented prompt.
//!
//! ```text
//! s            step into          b            step back
//! n            step over          r            reset to the first step
//! o            step out           e            continue to the last step
//! c            continue to the next breakpoint (or the end)
//! rc           reverse to the previous breakpoint
//! g N          jump to step N
//! break F:L    set a breakpoint   delete F:L   remove a breakpoint
//! info         list breakpoints   bt           call stack
//! stack        stack items        p            reprint the current step
//! q            quit
//! ```

use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use alloy_primitives::{Address, Bytes, TxHash};
use eyre::{bail, eyre, Context, Result};
use itertools::Itertools;
use qdb_common::types::{Breakpoint, DebugSnapshot, StructLogTrace, Trace, TraceStep};
use qdb_engine::{
    ContractRegistry, SessionHandle, SessionManager, StaticTraceProvider, TraceProvider,
    TransactionReceipt,
};
use serde_json::Value;
use tracing::info;

use super::{load_artifacts, ArtifactArg};

/// Inputs of the replay command
#[derive(Debug, Clone, Default)]
pub struct ReplayArgs {
    /// Trace file: a `TraceStep` array or a `debug_traceTransaction` result
    pub trace: PathBuf,
    /// Contracts to register
    pub artifacts: Vec<ArtifactArg>,
    /// Contract executing at depth 0
    pub to: Option<Address>,
    /// Transaction input, used to name the outermost function
    pub input: Option<Bytes>,
    /// Transaction hash to label the session with
    pub tx_hash: Option<TxHash>,
}

/// Parse a trace from JSON text.
///
/// Accepts a `TraceStep` array, a `debug_traceTransaction` result object, or
/// a full JSON-RPC response wrapping one.
pub fn parse_trace(json: &str) -> Result<Trace> {
    let mut value: Value = serde_json::from_str(json).wrap_err("trace is not valid JSON")?;
    if let Some(result) = value.get_mut("result") {
        value = result.take();
    }

    let trace = if value.is_array() {
        let steps: Vec<TraceStep> =
            serde_json::from_value(value).wrap_err("malformed trace step array")?;
        Trace::from(steps)
    } else {
        let logs: StructLogTrace =
            serde_json::from_value(value).wrap_err("malformed debug_traceTransaction result")?;
        Trace::from_struct_logs(logs.struct_logs)
    };

    if trace.is_empty() {
        bail!("trace contains no steps");
    }
    Ok(trace)
}

/// Read and parse a trace file.
pub fn load_trace(path: &Path) -> Result<Trace> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file: {}", path.display()))?;
    parse_trace(&json).with_context(|| format!("Invalid trace file: {}", path.display()))
}

/// Replay a trace file interactively on stdin/stdout.
pub async fn replay_trace(args: &ReplayArgs) -> Result<()> {
    let trace = load_trace(&args.trace)?;
    info!(steps = trace.len(), "loaded trace");

    let registry = Arc::new(ContractRegistry::new());
    load_artifacts(&args.artifacts, &registry)?;

    // A single artifact is assumed to be the transaction's target.
    let to = match (args.to, args.artifacts.as_slice()) {
        (Some(to), _) => Some(to),
        (None, [only]) => Some(only.address),
        _ => None,
    };
    let receipt = TransactionReceipt {
        status: true,
        to,
        input: args.input.clone().unwrap_or_default(),
        ..Default::default()
    };

    let tx_hash = args.tx_hash.unwrap_or_default();
    let provider = StaticTraceProvider::new().with_transaction(tx_hash, trace, receipt);
    let manager = SessionManager::new(Arc::new(provider), registry);
    let handle = manager.open_session(tx_hash).await?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_repl(&manager, handle, stdin.lock(), stdout.lock())
}

/// One prompt command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `s`
    StepInto,
    /// `n`
    StepOver,
    /// `o`
    StepOut,
    /// `b`
    StepBack,
    /// `c`
    Continue,
    /// `rc`
    ReverseContinue,
    /// `e`
    End,
    /// `r`
    Reset,
    /// `g N`
    Goto(u32),
    /// `break FILE:LINE`
    Break(Breakpoint),
    /// `delete FILE:LINE`
    Delete(Breakpoint),
    /// `info`
    Info,
    /// `bt`
    Backtrace,
    /// `stack`
    Stack,
    /// `p`
    Print,
    /// `help`
    Help,
    /// `q`
    Quit,
}

impl FromStr for ReplCommand {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let command = words.next().ok_or_else(|| eyre!("empty command"))?;
        let arg = words.next();
        if words.next().is_some() {
            bail!("too many arguments to '{command}'");
        }

        let needs_arg = || arg.ok_or_else(|| eyre!("'{command}' needs an argument"));
        Ok(match command {
            "s" | "step" => Self::StepInto,
            "n" | "next" => Self::StepOver,
            "o" | "finish" => Self::StepOut,
            "b" | "back" => Self::StepBack,
            "c" | "continue" => Self::Continue,
            "rc" => Self::ReverseContinue,
            "e" | "end" => Self::End,
            "r" | "reset" => Self::Reset,
            "g" | "goto" => {
                let n = needs_arg()?;
                Self::Goto(n.parse().with_context(|| format!("invalid step '{n}'"))?)
            }
            "break" => Self::Break(needs_arg()?.parse()?),
            "delete" => Self::Delete(needs_arg()?.parse()?),
            "info" => Self::Info,
            "bt" => Self::Backtrace,
            "stack" => Self::Stack,
            "p" | "print" => Self::Print,
            "h" | "help" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => bail!("unknown command '{other}', try 'help'"),
        })
    }
}

const HELP: &str = "\
s step into | n step over | o step out | b step back | r reset | e end
c continue | rc reverse continue | g N jump to step N
break FILE:LINE | delete FILE:LINE | info breakpoints
bt call stack | stack | p print | q quit";

/// Describe the step under the cursor in one or two lines.
pub fn describe(snapshot: &DebugSnapshot, source: Option<&str>) -> String {
    let mut out = format!(
        "[{}/{}] pc={:#06x} {} depth={} gas={}",
        snapshot.step,
        snapshot.total_steps.saturating_sub(1),
        snapshot.pc,
        snapshot.opcode,
        snapshot.call_depth,
        snapshot.gas_left,
    );
    match (&snapshot.source_location, source) {
        (Some(location), Some(text)) => out.push_str(&format!("\n  at {location}  {text}")),
        (Some(location), None) => out.push_str(&format!("\n  at {location}")),
        (None, _) => out.push_str("\n  (no source)"),
    }
    out
}

fn print_current<P: TraceProvider>(
    manager: &SessionManager<P>,
    handle: SessionHandle,
    out: &mut impl Write,
) -> Result<()> {
    let (snapshot, source) =
        manager.with_session(handle, |session| Ok((session.snapshot(), session.source_text())))?;
    writeln!(out, "{}", describe(&snapshot, source.as_deref()))?;
    Ok(())
}

/// Execute one command. Returns `false` when the session should end.
fn execute<P: TraceProvider>(
    manager: &SessionManager<P>,
    handle: SessionHandle,
    command: ReplCommand,
    out: &mut impl Write,
) -> Result<bool> {
    match command {
        ReplCommand::StepInto => {
            manager.step_into(handle)?;
        }
        ReplCommand::StepOver => {
            manager.step_over(handle)?;
        }
        ReplCommand::StepOut => {
            manager.step_out(handle)?;
        }
        ReplCommand::StepBack => {
            manager.step_back(handle)?;
        }
        ReplCommand::Reset => {
            manager.reset(handle)?;
        }
        ReplCommand::End => {
            manager.continue_to_end(handle)?;
        }
        ReplCommand::Goto(step) => {
            manager.jump_to_step(handle, step)?;
        }
        ReplCommand::Continue => {
            if !manager.continue_to_breakpoint(handle)?.found {
                writeln!(out, "no breakpoint hit, running to the end")?;
                manager.continue_to_end(handle)?;
            }
        }
        ReplCommand::ReverseContinue => {
            if !manager.reverse_to_breakpoint(handle)?.found {
                writeln!(out, "no earlier breakpoint")?;
            }
        }
        ReplCommand::Break(bp) => {
            if manager.add_breakpoint(handle, bp.clone())? {
                writeln!(out, "breakpoint set at {bp}")?;
            } else {
                writeln!(out, "breakpoint already set at {bp}")?;
            }
            return Ok(true);
        }
        ReplCommand::Delete(bp) => {
            if manager.remove_breakpoint(handle, &bp)? {
                writeln!(out, "breakpoint removed at {bp}")?;
            } else {
                writeln!(out, "no breakpoint at {bp}")?;
            }
            return Ok(true);
        }
        ReplCommand::Info => {
            let breakpoints = manager.breakpoints(handle)?;
            if breakpoints.is_empty() {
                writeln!(out, "no breakpoints")?;
            } else {
                writeln!(out, "{}", breakpoints.iter().join("\n"))?;
            }
            return Ok(true);
        }
        ReplCommand::Backtrace => {
            let snapshot = manager.snapshot(handle)?;
            let mut frames = snapshot.call_stack.iter().rev().map(|frame| format!("  {frame}"));
            writeln!(out, "{}", frames.join("\n"))?;
            return Ok(true);
        }
        ReplCommand::Stack => {
            let snapshot = manager.snapshot(handle)?;
            let mut items = snapshot
                .stack
                .iter()
                .rev()
                .enumerate()
                .map(|(depth, item)| format!("  {depth:>3}: {item}"));
            writeln!(out, "{}", items.join("\n"))?;
            return Ok(true);
        }
        ReplCommand::Help => {
            writeln!(out, "{HELP}")?;
            return Ok(true);
        }
        ReplCommand::Print => {}
        ReplCommand::Quit => return Ok(false),
    }

    print_current(manager, handle, out)?;
    Ok(true)
}

/// Read commands from `input` until `q` or end of input.
///
/// Bad commands and failed operations are reported and the prompt goes on.
pub fn run_repl<P: TraceProvider>(
    manager: &SessionManager<P>,
    handle: SessionHandle,
    input: impl BufRead,
    mut out: impl Write,
) -> Result<()> {
    print_current(manager, handle, &mut out)?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = line
            .parse::<ReplCommand>()
            .and_then(|command| execute(manager, handle, command, &mut out));
        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => writeln!(out, "error: {e}")?,
        }
        out.flush()?;
    }

    manager.close_session(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdb_common::ensure_test_logging;
    use std::io::Cursor;

    const TRACE: &str = r#"[
        {"index": 0, "pc": 0, "opcode_name": "PUSH1", "gas_left": 100},
        {"index": 1, "pc": 2, "opcode_name": "PUSH1", "stack": ["0x1"], "gas_left": 97},
        {"index": 2, "pc": 4, "opcode_name": "ADD", "stack": ["0x1", "0x2"], "gas_left": 94},
        {"index": 3, "pc": 5, "opcode_name": "STOP", "stack": ["0x3"], "gas_left": 91}
    ]"#;

    fn manager() -> (SessionManager<StaticTraceProvider>, TxHash) {
        let trace = parse_trace(TRACE).unwrap();
        let provider = StaticTraceProvider::new().with_transaction(
            TxHash::ZERO,
            trace,
            TransactionReceipt::default(),
        );
        (SessionManager::new(Arc::new(provider), Arc::new(ContractRegistry::new())), TxHash::ZERO)
    }

    async fn run(commands: &str) -> String {
        let (manager, tx) = manager();
        let handle = manager.open_session(tx).await.unwrap();
        let mut out = Vec::new();
        run_repl(&manager, handle, Cursor::new(commands.to_string()), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        ensure_test_logging(None);
        assert_eq!("s".parse::<ReplCommand>().unwrap(), ReplCommand::StepInto);
        assert_eq!(" g  7 ".parse::<ReplCommand>().unwrap(), ReplCommand::Goto(7));
        assert_eq!(
            "break Counter.sol:4".parse::<ReplCommand>().unwrap(),
            ReplCommand::Break(Breakpoint::new(PathBuf::from("Counter.sol"), 4))
        );
        assert!("g".parse::<ReplCommand>().is_err());
        assert!("g x".parse::<ReplCommand>().is_err());
        assert!("s 1 2".parse::<ReplCommand>().is_err());
        assert!("fly".parse::<ReplCommand>().is_err());
        assert!("break Counter.sol".parse::<ReplCommand>().is_err());
    }

    #[test]
    fn test_parse_trace_shapes() {
        ensure_test_logging(None);
        assert_eq!(parse_trace(TRACE).unwrap().len(), 4);

        let logs = r#"{"gas": 21000, "failed": false, "returnValue": "", "structLogs": [
            {"pc": 0, "op": "PUSH1", "gas": 100, "gasCost": 3, "depth": 1, "stack": []},
            {"pc": 2, "op": "STOP", "gas": 97, "gasCost": 0, "depth": 1, "stack": ["0x1"]}
        ]}"#;
        let trace = parse_trace(logs).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].opcode_name, "STOP");

        let wrapped = format!(r#"{{"jsonrpc": "2.0", "id": 1, "result": {logs}}}"#);
        assert_eq!(parse_trace(&wrapped).unwrap().len(), 2);

        assert!(parse_trace("[]").is_err());
        assert!(parse_trace("{").is_err());
    }

    #[tokio::test]
    async fn test_repl_navigation() {
        ensure_test_logging(None);
        let out = run("s\nn\nb\ng 3\nr\nq\ns\n").await;
        let steps: Vec<_> =
            out.lines().filter(|l| l.starts_with('[')).map(|l| l[..5].to_string()).collect();
        assert_eq!(steps, vec!["[0/3]", "[1/3]", "[2/3]", "[1/3]", "[3/3]", "[0/3]"]);
        assert!(out.contains("pc=0x0004 ADD depth=0 gas=94"));
        assert!(out.contains("(no source)"));
    }

    #[tokio::test]
    async fn test_repl_reports_errors_and_continues() {
        ensure_test_logging(None);
        let out = run("g 9\nfly\nc\nstack\n").await;
        assert!(out.contains("error: step 9 is out of range (trace has 4 steps)"));
        assert!(out.contains("unknown command 'fly'"));
        assert!(out.contains("no breakpoint hit, running to the end"));
        assert!(out.contains("    0: 0x3"));
    }

    #[tokio::test]
    async fn test_repl_breakpoint_bookkeeping() {
        ensure_test_logging(None);
        let out =
            run("info\nbreak A.sol:3\nbreak A.sol:3\ninfo\ndelete A.sol:3\ndelete A.sol:3\n").await;
        assert!(out.contains("no breakpoints"));
        assert!(out.contains("breakpoint set at A.sol:3"));
        assert!(out.contains("breakpoint already set at A.sol:3"));
        assert!(out.contains("breakpoint removed at A.sol:3"));
        assert!(out.contains("no breakpoint at A.sol:3"));
    }
}
