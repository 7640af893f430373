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

//! Command modules for the QDB CLI

pub mod disasm;
pub mod replay;
pub mod server;

pub use disasm::disassemble_command;
pub use replay::replay_trace;
pub use server::start_server;

use std::{fs, path::PathBuf, str::FromStr};

use alloy_primitives::Address;
use eyre::{eyre, Context, Result};
use qdb_engine::{ContractArtifact, ContractRegistry};
use tracing::info;

/// A compiled contract bound to the address it is deployed at (`ADDRESS=FILE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactArg {
    /// Deployment address
    pub address: Address,
    /// Artifact JSON file
    pub path: PathBuf,
}

impl FromStr for ArtifactArg {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let (address, path) =
            s.split_once('=').ok_or_else(|| eyre!("expected ADDRESS=FILE, got '{s}'"))?;
        let address = address.trim().parse().with_context(|| format!("invalid address '{address}'"))?;
        if path.trim().is_empty() {
            return Err(eyre!("missing artifact file in '{s}'"));
        }
        Ok(Self { address, path: PathBuf::from(path.trim()) })
    }
}

/// Register every artifact with the registry.
pub fn load_artifacts(artifacts: &[ArtifactArg], registry: &ContractRegistry) -> Result<()> {
    for ArtifactArg { address, path } in artifacts {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
        let artifact = ContractArtifact::from_json(&json)
            .with_context(|| format!("Invalid artifact: {}", path.display()))?;
        registry
            .register(*address, &artifact)
            .with_context(|| format!("Failed to register {} at {address}", path.display()))?;
        info!(%address, artifact = %path.display(), "registered contract");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use qdb_common::ensure_test_logging;

    #[test]
    fn test_parse_artifact_arg() {
        ensure_test_logging(None);
        let arg: ArtifactArg =
            "0x00000000000000000000000000000000000000bb=out/Counter.json".parse().unwrap();
        assert_eq!(arg.address, address!("0x00000000000000000000000000000000000000bb"));
        assert_eq!(arg.path, PathBuf::from("out/Counter.json"));

        assert!("out/Counter.json".parse::<ArtifactArg>().is_err());
        assert!("0x12=out/Counter.json".parse::<ArtifactArg>().is_err());
        assert!("0x00000000000000000000000000000000000000bb=".parse::<ArtifactArg>().is_err());
    }

    #[test]
    fn test_load_artifacts_reports_bad_files() {
        ensure_test_logging(None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let registry = ContractRegistry::new();
        let args = [ArtifactArg { address: Address::ZERO, path: path.clone() }];
        let err = load_artifacts(&args, &registry).unwrap_err();
        assert!(err.to_string().contains("Invalid artifact"));

        let missing = [ArtifactArg { address: Address::ZERO, path: dir.path().join("absent.json") }];
        assert!(load_artifacts(&missing, &registry).is_err());
    }
}
