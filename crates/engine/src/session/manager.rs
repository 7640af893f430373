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

//! Session manager: the handle arena behind the exposed debugging interface.
//!
//! Opening a session is the only operation that waits on I/O. The handle is
//! reserved before the trace is fetched, so a caller can close it while the
//! fetch is still in flight; the late result is then discarded.

use std::{
    collections::HashMap,
    fmt,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use alloy_primitives::TxHash;
use derive_more::From;
use parking_lot::Mutex;
use qdb_common::types::{Breakpoint, BreakpointHit, BreakpointSearch, DebugSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::DebugSession;
use crate::{ContractRegistry, EngineError, EngineResult, TraceProvider};

/// Opaque handle naming one debugging session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From,
)]
#[serde(transparent)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
enum Slot {
    /// Trace fetch in flight
    Pending(TxHash),
    /// Session ready for navigation
    Ready(Box<DebugSession>),
}

/// Removes a reserved slot if `open_session` is dropped before its fetch completes.
struct PendingGuard<'a> {
    sessions: &'a Mutex<HashMap<SessionHandle, Slot>>,
    handle: SessionHandle,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut sessions = self.sessions.lock();
        if let Some(Slot::Pending(tx_hash)) = sessions.get(&self.handle) {
            debug!(handle = %self.handle, %tx_hash, "session open abandoned, releasing handle");
            sessions.remove(&self.handle);
        }
    }
}

/// Owns every open debugging session.
#[derive(Debug)]
pub struct SessionManager<P> {
    provider: Arc<P>,
    registry: Arc<ContractRegistry>,
    sessions: Mutex<HashMap<SessionHandle, Slot>>,
    next_handle: AtomicU64,
}

impl<P: TraceProvider> SessionManager<P> {
    /// Create a manager fetching traces from `provider`.
    pub fn new(provider: Arc<P>, registry: Arc<ContractRegistry>) -> Self {
        Self { provider, registry, sessions: Mutex::new(HashMap::new()), next_handle: AtomicU64::new(1) }
    }

    /// The contract registry shared by all sessions
    pub fn registry(&self) -> &Arc<ContractRegistry> {
        &self.registry
    }

    /// The trace provider
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Number of sessions, pending or ready
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Open a session for a transaction.
    ///
    /// Fails with [`EngineError::TraceUnavailable`] if the provider cannot
    /// supply a trace, and with [`EngineError::SessionClosed`] if the handle
    /// was closed while the trace was being fetched.
    pub async fn open_session(&self, tx_hash: TxHash) -> EngineResult<SessionHandle> {
        let handle = SessionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.sessions.lock().insert(handle, Slot::Pending(tx_hash));
        let mut guard = PendingGuard { sessions: &self.sessions, handle, armed: true };
        info!(%handle, %tx_hash, "opening debug session");

        let fetched = futures::try_join!(
            self.provider.fetch_receipt(tx_hash),
            self.provider.fetch_trace(tx_hash)
        );
        guard.disarm();

        let session = fetched
            .map_err(|e| EngineError::trace_unavailable(tx_hash, e))
            .and_then(|(receipt, trace)| {
                DebugSession::new(tx_hash, Arc::new(trace), receipt.root_frame(), self.registry.clone())
            });

        let mut sessions = self.sessions.lock();
        match (sessions.get_mut(&handle), session) {
            (Some(slot @ Slot::Pending(_)), Ok(session)) => {
                *slot = Slot::Ready(Box::new(session));
                info!(%handle, "debug session ready");
                Ok(handle)
            }
            (Some(Slot::Pending(_)), Err(err)) => {
                sessions.remove(&handle);
                warn!(%handle, %tx_hash, error = %err, "failed to open debug session");
                Err(err)
            }
            (_, _) => {
                debug!(%handle, "session closed before its trace arrived, discarding result");
                Err(EngineError::SessionClosed(handle))
            }
        }
    }

    /// Close a session, pending or ready. Returns `false` for unknown handles.
    pub fn close_session(&self, handle: SessionHandle) -> bool {
        match self.sessions.lock().remove(&handle) {
            Some(Slot::Pending(tx_hash)) => {
                info!(%handle, %tx_hash, "pending debug session closed");
                true
            }
            Some(Slot::Ready(session)) => {
                info!(%handle, tx_hash = %session.tx_hash(), "debug session closed");
                true
            }
            None => {
                debug!(%handle, "close requested for unknown session");
                false
            }
        }
    }

    /// Run `f` against a ready session.
    pub fn with_session<T>(
        &self,
        handle: SessionHandle,
        f: impl FnOnce(&mut DebugSession) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&handle) {
            Some(Slot::Ready(session)) => f(session),
            Some(Slot::Pending(_)) => Err(EngineError::SessionPending(handle)),
            None => Err(EngineError::UnknownSession(handle)),
        }
    }

    /// Apply a navigation operation and snapshot the result.
    fn navigate(
        &self,
        handle: SessionHandle,
        op: impl FnOnce(&mut DebugSession) -> EngineResult<()>,
    ) -> EngineResult<DebugSnapshot> {
        self.with_session(handle, |session| {
            op(session)?;
            Ok(session.snapshot())
        })
    }

    fn search(
        &self,
        handle: SessionHandle,
        op: impl FnOnce(&mut DebugSession) -> BreakpointSearch,
    ) -> EngineResult<BreakpointHit> {
        self.with_session(handle, |session| {
            let BreakpointSearch { found, .. } = op(session);
            Ok(BreakpointHit { found, snapshot: session.snapshot() })
        })
    }

    /// Snapshot at the cursor
    pub fn snapshot(&self, handle: SessionHandle) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |_| Ok(()))
    }

    /// See [`DebugSession::step_into`]
    pub fn step_into(&self, handle: SessionHandle) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |s| {
            s.step_into();
            Ok(())
        })
    }

    /// See [`DebugSession::step_over`]
    pub fn step_over(&self, handle: SessionHandle) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |s| {
            s.step_over();
            Ok(())
        })
    }

    /// See [`DebugSession::step_out`]
    pub fn step_out(&self, handle: SessionHandle) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |s| {
            s.step_out();
            Ok(())
        })
    }

    /// See [`DebugSession::step_back`]
    pub fn step_back(&self, handle: SessionHandle) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |s| {
            s.step_back();
            Ok(())
        })
    }

    /// See [`DebugSession::continue_to_end`]
    pub fn continue_to_end(&self, handle: SessionHandle) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |s| {
            s.continue_to_end();
            Ok(())
        })
    }

    /// See [`DebugSession::reset`]
    pub fn reset(&self, handle: SessionHandle) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |s| {
            s.reset();
            Ok(())
        })
    }

    /// See [`DebugSession::jump_to_step`]
    pub fn jump_to_step(&self, handle: SessionHandle, step: u32) -> EngineResult<DebugSnapshot> {
        self.navigate(handle, |s| s.jump_to_step(step).map(|_| ()))
    }

    /// See [`DebugSession::jump_to_breakpoint`]
    pub fn jump_to_breakpoint(
        &self,
        handle: SessionHandle,
        line: usize,
        file: &Path,
    ) -> EngineResult<BreakpointHit> {
        self.search(handle, |s| s.jump_to_breakpoint(line, file))
    }

    /// See [`DebugSession::jump_to_previous_breakpoint`]
    pub fn jump_to_previous_breakpoint(
        &self,
        handle: SessionHandle,
        line: usize,
        file: &Path,
    ) -> EngineResult<BreakpointHit> {
        self.search(handle, |s| s.jump_to_previous_breakpoint(line, file))
    }

    /// See [`DebugSession::continue_to_breakpoint`]
    pub fn continue_to_breakpoint(&self, handle: SessionHandle) -> EngineResult<BreakpointHit> {
        self.search(handle, DebugSession::continue_to_breakpoint)
    }

    /// See [`DebugSession::reverse_to_breakpoint`]
    pub fn reverse_to_breakpoint(&self, handle: SessionHandle) -> EngineResult<BreakpointHit> {
        self.search(handle, DebugSession::reverse_to_breakpoint)
    }

    /// Add a breakpoint to a session. Returns `false` if it was already set.
    pub fn add_breakpoint(&self, handle: SessionHandle, breakpoint: Breakpoint) -> EngineResult<bool> {
        self.with_session(handle, |s| Ok(s.add_breakpoint(breakpoint)))
    }

    /// Remove a breakpoint from a session. Returns `false` if it was not set.
    pub fn remove_breakpoint(
        &self,
        handle: SessionHandle,
        breakpoint: &Breakpoint,
    ) -> EngineResult<bool> {
        self.with_session(handle, |s| Ok(s.remove_breakpoint(breakpoint)))
    }

    /// Breakpoints of a session
    pub fn breakpoints(&self, handle: SessionHandle) -> EngineResult<Vec<Breakpoint>> {
        self.with_session(handle, |s| Ok(s.breakpoints().cloned().collect()))
    }

    /// Remove all breakpoints of a session
    pub fn clear_breakpoints(&self, handle: SessionHandle) -> EngineResult<()> {
        self.with_session(handle, |s| {
            s.clear_breakpoints();
            Ok(())
        })
    }
}
