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

//! Configuration file handling.
//!
//! Settings are read from a TOML file (`--config`, or `~/.qdb.toml` when it
//! exists) and command-line flags are applied on top.
//!
//! ```toml
//! [engine]
//! rpc_url = "http://localhost:8545"
//! server_port = 3000
//! request_timeout_secs = 30
//! file_logging = false
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use qdb_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the configuration file in the home directory
pub const CONFIG_FILE_NAME: &str = ".qdb.toml";

/// Contents of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine settings
    pub engine: EngineConfig,
}

impl Config {
    /// Default configuration file location
    pub fn config_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    /// Load the configuration.
    ///
    /// An explicitly given file must exist. The default file is optional and
    /// its absence yields the default configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Ok(path) if path.exists() => path,
                _ => {
                    debug!("No configuration file, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        Self::from_file(&path)
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as TOML: {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
