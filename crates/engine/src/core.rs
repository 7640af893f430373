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

//! Engine configuration and entry point.
//!
//! [`Engine`] wires the collaborators together: a [`JsonRpcTraceProvider`]
//! pointed at a node, a shared [`ContractRegistry`], the [`SessionManager`]
//! and the JSON-RPC server in front of it.

use std::{sync::Arc, time::Duration};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    rpc::{start_debug_server, RpcServerHandle},
    ContractRegistry, JsonRpcTraceProvider, SessionManager,
};

/// Configuration for the debugging engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Node URL serving `debug_traceTransaction`
    pub rpc_url: String,
    /// Port for the JSON-RPC server, `None` to pick 3000 or the next free port
    pub server_port: Option<u16>,
    /// Timeout for a single node request
    pub request_timeout_secs: u64,
    /// Also write logs to a daily rolling file
    pub file_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".into(),
            server_port: None,
            request_timeout_secs: 30,
            file_logging: false,
        }
    }
}

impl EngineConfig {
    /// Set the node URL
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    /// Set the JSON-RPC server port
    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }

    /// Set the node request timeout
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Enable or disable file logging
    pub fn with_file_logging(mut self, enabled: bool) -> Self {
        self.file_logging = enabled;
        self
    }

    /// Node request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The debugging engine
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    registry: Arc<ContractRegistry>,
}

impl Engine {
    /// Create a new engine from configuration
    pub fn new(config: EngineConfig) -> Self {
        Self { config, registry: Arc::new(ContractRegistry::new()) }
    }

    /// Use a pre-populated contract registry
    pub fn with_registry(mut self, registry: Arc<ContractRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Contracts known to the engine
    pub fn registry(&self) -> &Arc<ContractRegistry> {
        &self.registry
    }

    /// Build a session manager fetching traces from the configured node.
    pub fn session_manager(&self) -> Result<SessionManager<JsonRpcTraceProvider>> {
        let provider =
            JsonRpcTraceProvider::new(self.config.rpc_url.clone(), self.config.request_timeout())
                .wrap_err("failed to build trace provider")?;
        Ok(SessionManager::new(Arc::new(provider), self.registry.clone()))
    }

    /// Start the JSON-RPC server against the configured node.
    pub async fn serve(&self) -> Result<RpcServerHandle> {
        info!(rpc_url = %self.config.rpc_url, "Starting debugging engine");

        let manager = Arc::new(self.session_manager()?);
        let handle = start_debug_server(manager, self.config.server_port).await?;
        info!("Debug RPC server started on port {}", handle.port());

        Ok(handle)
    }
}
