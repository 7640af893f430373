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

//! JSON-RPC server command

use std::sync::Arc;

use eyre::Result;
use qdb_engine::{ContractRegistry, Engine, EngineConfig};
use tracing::info;

use super::{load_artifacts, ArtifactArg};

/// Serve debugging sessions until Ctrl+C.
pub async fn start_server(config: EngineConfig, artifacts: &[ArtifactArg]) -> Result<()> {
    let registry = Arc::new(ContractRegistry::new());
    load_artifacts(artifacts, &registry)?;

    let engine = Engine::new(config).with_registry(registry);
    let handle = engine.serve().await?;
    println!("QDB JSON-RPC server listening on http://{}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    handle.shutdown()
}
