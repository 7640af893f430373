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

//! Call-depth and call-stack reconstruction from a linear opcode trace.
//!
//! Nothing is re-executed. Depth changes are inferred from the opcode stream:
//! a call-class opcode opens a frame whose first instruction is the *next*
//! step, and a halt-class opcode (or an exceptional halt) closes the current
//! frame from the next step on.
//!
//! Two refinements keep the depths faithful to what the VM actually did:
//! - A call only opens a frame if the next step starts at `pc == 0`. Calls to
//!   precompiles, to accounts without code, or calls rejected before entry
//!   continue in the caller and leave the depth unchanged.
//! - The final step of a trace belongs to the root frame. A halt there closes
//!   any frame that is still open.

use alloy_primitives::{Address, Bytes, Selector, B256};
use qdb_common::{
    types::{CallFrame, CallKind, CallStack, CodeKind, SourceLocation, SourceMapEntry, TraceStep},
    OpcodeClass,
};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// The code a step executes: which account, and which of its bytecodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameOwner {
    /// Account whose code runs, `None` when it cannot be recovered from the trace
    pub address: Option<Address>,
    /// Runtime or creation code
    pub code_kind: CodeKind,
}

impl FrameOwner {
    /// Owner running the deployed code of `address`
    pub fn runtime(address: Address) -> Self {
        Self { address: Some(address), code_kind: CodeKind::Runtime }
    }

    /// Owner running constructor code
    pub fn creation(address: Option<Address>) -> Self {
        Self { address, code_kind: CodeKind::Creation }
    }
}

/// The outermost frame of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RootFrame {
    /// Called contract, or the created contract for a deployment
    pub address: Option<Address>,
    /// Whether the transaction deploys a contract
    pub is_creation: bool,
    /// Transaction input
    pub input: Bytes,
}

impl RootFrame {
    /// Root of a message call into `address`
    pub fn call(address: Address, input: Bytes) -> Self {
        Self { address: Some(address), is_creation: false, input }
    }

    /// Root of a deployment of `address`
    pub fn creation(address: Option<Address>) -> Self {
        Self { address, is_creation: true, input: Bytes::new() }
    }

    /// Code owner of the root frame
    pub fn owner(&self) -> FrameOwner {
        if self.is_creation {
            FrameOwner::creation(self.address)
        } else {
            FrameOwner { address: self.address, code_kind: CodeKind::Runtime }
        }
    }
}

/// Resolves call sites and function names while materializing call stacks.
///
/// Implemented by the contract registry; `()` resolves nothing.
pub trait CallSiteResolver {
    /// Source-map entry of the instruction at `pc` in `owner`'s code
    fn source_entry(&self, owner: &FrameOwner, pc: u32) -> Option<SourceMapEntry>;

    /// Resolved source location of the instruction at `pc` in `owner`'s code
    fn source_location(&self, owner: &FrameOwner, pc: u32) -> Option<SourceLocation>;

    /// Name of the function with the given selector in `address`'s ABI
    fn function_name(&self, address: Address, selector: Selector) -> Option<String>;
}

impl CallSiteResolver for () {
    fn source_entry(&self, _owner: &FrameOwner, _pc: u32) -> Option<SourceMapEntry> {
        None
    }

    fn source_location(&self, _owner: &FrameOwner, _pc: u32) -> Option<SourceLocation> {
        None
    }

    fn function_name(&self, _address: Address, _selector: Selector) -> Option<String> {
        None
    }
}

/// Derive the call depth of every step.
///
/// The root frame has depth 0 and the returned vector is parallel to `trace`.
/// A call-class step raises the depth from the next step on, and a halt lowers
/// it from the next step on. When the tracer reports its own depth on both the
/// call and the step after it, a call that did not enter a frame (precompile,
/// account without code) leaves the depth unchanged.
pub fn derive_call_depths(trace: &[TraceStep]) -> Vec<u32> {
    let mut depths = Vec::with_capacity(trace.len());
    let mut depth = 0u32;

    for (i, step) in trace.iter().enumerate() {
        depths.push(depth);

        match step_class(step) {
            OpcodeClass::Halt => depth = depth.saturating_sub(1),
            OpcodeClass::Call | OpcodeClass::Create => {
                let next = trace.get(i + 1).and_then(|next| next.tracer_depth);
                match (step.tracer_depth, next) {
                    (Some(current), Some(next)) if next <= current => {
                        trace!(step = i, opcode = %step.opcode_name, "call did not enter a new frame");
                    }
                    _ => depth += 1,
                }
            }
            OpcodeClass::Other => {}
        }
    }

    depths
}

/// Class of a step, promoting exceptional halts to [`OpcodeClass::Halt`].
pub fn step_class(step: &TraceStep) -> OpcodeClass {
    if step.is_exceptional_halt() {
        OpcodeClass::Halt
    } else {
        OpcodeClass::from_mnemonic(&step.opcode_name)
    }
}

/// Frame kind and callee of a call-class step.
fn callee_of(step: &TraceStep) -> (Option<CallKind>, FrameOwner) {
    let kind = CallKind::from_mnemonic(step.opcode_name.trim());
    let owner = match kind {
        Some(k) if k.is_create() => FrameOwner::creation(None),
        Some(_) => FrameOwner {
            address: step.stack_word(1).map(|word| Address::from_word(B256::from(word))),
            code_kind: CodeKind::Runtime,
        },
        None => FrameOwner { address: None, code_kind: CodeKind::Runtime },
    };
    (kind, owner)
}

/// Selector of the call data passed by a call-class step, read from its memory.
fn call_selector(step: &TraceStep, kind: CallKind) -> Option<Selector> {
    // Stack layout (top first): gas, address, [value], argsOffset, argsLength, ...
    let args_at = match kind {
        CallKind::Call | CallKind::CallCode => 3,
        CallKind::DelegateCall | CallKind::StaticCall => 2,
        _ => return None,
    };
    let offset = usize::try_from(step.stack_word(args_at)?).ok()?;
    let len = usize::try_from(step.stack_word(args_at + 1)?).ok()?;
    if len < 4 {
        return None;
    }
    let bytes = step.read_memory(offset, 4)?;
    Some(Selector::from_slice(&bytes))
}

/// Apply the depth change between `step - 1` and `step` to a frame stack.
///
/// `enter` builds the frame opened by the call-class step `step - 1`. The
/// root frame is never popped.
fn apply_depth_change<T>(
    stack: &mut Vec<T>,
    trace: &[TraceStep],
    depths: &[u32],
    step: usize,
    mut enter: impl FnMut(&TraceStep, &[T]) -> T,
) {
    let (prev, cur) = (depths[step - 1], depths[step]);
    for _ in prev..cur {
        let frame = enter(&trace[step - 1], stack);
        stack.push(frame);
    }
    for _ in cur..prev {
        if stack.len() > 1 {
            stack.pop();
        } else {
            warn!(step, "call depth dropped below the root frame");
        }
    }
}

/// Code owner of every step, parallel to `trace`.
pub fn step_owners(trace: &[TraceStep], depths: &[u32], root: &RootFrame) -> Vec<FrameOwner> {
    let len = trace.len().min(depths.len());
    let mut owners = Vec::with_capacity(len);
    let mut stack = vec![root.owner()];

    for i in 0..len {
        if i > 0 {
            apply_depth_change(&mut stack, trace, depths, i, |call, _| callee_of(call).1);
        }
        owners.push(stack.last().copied().unwrap_or_else(|| root.owner()));
    }

    owners
}

/// Build the frame entered by the call-class step `call`.
fn enter_frame<R: CallSiteResolver>(
    resolver: &R,
    call: &TraceStep,
    step: u32,
    depth: u32,
    caller: Option<FrameOwner>,
) -> (FrameOwner, CallFrame) {
    let (kind, owner) = callee_of(call);
    let call_kind = kind.unwrap_or(CallKind::Call);

    let (function_name, source, location) = match owner.address {
        Some(address) => {
            let function_name = call_selector(call, call_kind)
                .and_then(|selector| resolver.function_name(address, selector));
            let source = caller.and_then(|c| resolver.source_entry(&c, call.pc));
            let location = caller.and_then(|c| resolver.source_location(&c, call.pc));
            (function_name, source, location)
        }
        None => {
            if !call_kind.is_create() {
                warn!(step = call.index, "call target not recoverable from the stack");
            }
            (None, None, None)
        }
    };

    let frame = CallFrame {
        address: owner.address,
        function_name,
        source,
        location,
        entered_at_step: step,
        depth,
        call_kind,
        code_kind: owner.code_kind,
    };
    (owner, frame)
}

/// Materialize the call stack in effect at `step`.
///
/// Frames run from the root (index 0) to the innermost. A `step` past the end
/// of the trace is clamped to the last step; an empty trace has an empty stack.
pub fn call_stack_at<R: CallSiteResolver>(
    trace: &[TraceStep],
    depths: &[u32],
    step: usize,
    root: &RootFrame,
    resolver: &R,
) -> CallStack {
    if trace.is_empty() {
        return Vec::new();
    }

    let owner = root.owner();
    let function_name = match (root.address, root.input.get(..4)) {
        (Some(address), Some(selector)) if !root.is_creation => {
            resolver.function_name(address, Selector::from_slice(selector))
        }
        _ => None,
    };
    let root_frame = CallFrame {
        address: root.address,
        function_name,
        source: None,
        location: None,
        entered_at_step: 0,
        depth: 0,
        call_kind: CallKind::Root,
        code_kind: owner.code_kind,
    };

    let upto = step.min(trace.len() - 1).min(depths.len().saturating_sub(1));
    let mut stack = vec![(owner, root_frame)];
    for i in 1..=upto {
        let depth = depths[i];
        apply_depth_change(&mut stack, trace, depths, i, |call, frames| {
            enter_frame(resolver, call, i as u32, depth, frames.last().map(|(owner, _)| *owner))
        });
    }

    stack.into_iter().map(|(_, frame)| frame).collect()
}
