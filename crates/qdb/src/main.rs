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

//! QDB - Contract Trace Debugger
//!
//! Step through recorded EVM execution traces at the source level.

use std::path::PathBuf;

use alloy_primitives::{Address, Bytes, TxHash};
use clap::{Parser, Subcommand};
use eyre::Result;
use qdb_engine::EngineConfig;

mod cmd;
mod config;

use cmd::{replay::ReplayArgs, ArtifactArg};
use config::Config;

/// Command-line interface for QDB
#[derive(Debug, Parser)]
#[command(name = "qdb")]
#[command(about = "Contract Trace Debugger - step through recorded EVM execution traces")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.qdb.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Node RPC endpoint serving debug_traceTransaction
    #[arg(long, env = "QDB_RPC_URL", global = true)]
    pub rpc_url: Option<String>,

    /// Node request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Also write logs to a daily rolling file
    #[arg(long, global = true)]
    pub file_logging: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Disassemble EVM bytecode
    Disasm {
        /// Hex bytecode, with or without 0x
        #[arg(required_unless_present = "file")]
        code: Option<String>,

        /// Read the hex bytecode from a file
        #[arg(long, conflicts_with = "code")]
        file: Option<PathBuf>,

        /// Omit program counters
        #[arg(long)]
        no_pc: bool,
    },
    /// Replay a recorded trace in an interactive session
    Replay {
        /// Trace file: a step array or a debug_traceTransaction result
        #[arg(long)]
        trace: PathBuf,

        /// Compiled contract deployed at an address
        #[arg(long = "artifact", value_name = "ADDRESS=FILE")]
        artifacts: Vec<ArtifactArg>,

        /// Contract executing at the outermost depth
        #[arg(long)]
        to: Option<Address>,

        /// Transaction input, used to name the outermost function
        #[arg(long)]
        input: Option<Bytes>,

        /// Transaction hash to label the session with
        #[arg(long)]
        tx_hash: Option<TxHash>,
    },
    /// Serve debugging sessions over JSON-RPC
    Serve {
        /// Port for the JSON-RPC server
        #[arg(long, env = "QDB_PORT")]
        port: Option<u16>,

        /// Compiled contract deployed at an address
        #[arg(long = "artifact", value_name = "ADDRESS=FILE")]
        artifacts: Vec<ArtifactArg>,
    },
}

impl Cli {
    /// Apply command-line flags on top of the file configuration.
    pub fn to_engine_config(&self, file: &Config) -> EngineConfig {
        let mut config = file.engine.clone();
        if let Some(url) = &self.rpc_url {
            config = config.with_rpc_url(url.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_request_timeout_secs(secs);
        }
        if self.file_logging {
            config = config.with_file_logging(true);
        }
        if let Commands::Serve { port: Some(port), .. } = &self.command {
            config = config.with_server_port(*port);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    let file_config = Config::load(cli.config.as_deref())?;
    let engine_config = cli.to_engine_config(&file_config);

    qdb_common::logging::init_logging("qdb", engine_config.file_logging)?;

    match cli.command {
        Commands::Disasm { code, file, no_pc } => {
            cmd::disassemble_command(code.as_deref(), file.as_deref(), !no_pc)
        }
        Commands::Replay { trace, artifacts, to, input, tx_hash } => {
            tracing::info!("Replaying trace file: {}", trace.display());
            cmd::replay_trace(&ReplayArgs { trace, artifacts, to, input, tx_hash }).await
        }
        Commands::Serve { artifacts, .. } => {
            tracing::info!("Using RPC endpoint: {}", engine_config.rpc_url);
            cmd::start_server(engine_config, &artifacts).await
        }
    }
}
