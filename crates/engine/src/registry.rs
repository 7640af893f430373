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

//! Contract registry: compiler artifacts registered per address.
//!
//! For every registered contract the registry holds the instruction index of
//! its runtime code and, when present, of its creation code. Indexes are
//! built once and shared behind [`Arc`]; identical bytecode registered under
//! several addresses reuses the same index. All lookups are concurrent reads.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_json_abi::JsonAbi;
use alloy_primitives::{keccak256, Address, Selector, B256};
use dashmap::DashMap;
use qdb_common::types::{CodeKind, SourceLocation, SourceMapEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    analysis::{CallSiteResolver, FrameOwner, InstructionIndex},
    utils::{disasm::disassemble, LineTable},
    EngineError, EngineResult,
};

/// Output of the compiler collaborator for one contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOutput {
    /// Contract ABI
    #[serde(default)]
    pub abi: JsonAbi,
    /// Creation bytecode (hex)
    #[serde(default)]
    pub bytecode: String,
    /// Runtime bytecode (hex)
    #[serde(default, alias = "deployed_bytecode")]
    pub deployed_bytecode: String,
    /// Source map of the creation bytecode
    #[serde(default, alias = "source_map")]
    pub source_map: String,
    /// Source map of the runtime bytecode
    #[serde(default, alias = "deployed_source_map")]
    pub deployed_source_map: String,
}

/// One source file referenced by a source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Index used by the source map's `file_index` field
    pub index: u32,
    /// Path of the file
    pub path: PathBuf,
    /// File content
    pub content: String,
}

/// A compiled contract together with the sources its source maps point into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractArtifact {
    /// Contract name
    #[serde(default)]
    pub name: Option<String>,
    /// Compiler output
    #[serde(flatten)]
    pub output: CompilerOutput,
    /// Source files
    #[serde(default)]
    pub sources: Vec<SourceFile>,
}

impl ContractArtifact {
    /// Parse an artifact from its JSON form.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidArtifact(e.to_string()))
    }
}

/// Source text of one file with its precomputed line table.
#[derive(Debug)]
struct SourceText {
    path: PathBuf,
    content: String,
    lines: LineTable,
}

/// A registered contract bytecode (runtime or creation).
#[derive(Debug)]
struct ContractCode {
    index: Arc<InstructionIndex>,
    sources: Arc<BTreeMap<u32, SourceText>>,
    selectors: Arc<HashMap<Selector, String>>,
}

/// Registry of compiled contracts keyed by address.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: DashMap<(Address, CodeKind), Arc<ContractCode>>,
    /// Keyed by the hashes of the bytecode and of its source map
    indexes: DashMap<(B256, B256), Arc<InstructionIndex>>,
}

impl ContractRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the artifact of the contract deployed at `address`.
    ///
    /// Builds the runtime index, and the creation index when the artifact
    /// carries creation bytecode. A bytecode whose source map does not match
    /// its instruction count is rejected without touching other contracts.
    pub fn register(&self, address: Address, artifact: &ContractArtifact) -> EngineResult<()> {
        let output = &artifact.output;

        let sources: BTreeMap<u32, SourceText> = artifact
            .sources
            .iter()
            .map(|file| {
                let text = SourceText {
                    path: file.path.clone(),
                    content: file.content.clone(),
                    lines: LineTable::new(&file.content),
                };
                (file.index, text)
            })
            .collect();
        let sources = Arc::new(sources);

        let selectors: HashMap<Selector, String> =
            output.abi.functions().map(|f| (f.selector(), f.name.clone())).collect();
        let selectors = Arc::new(selectors);

        let mut built = Vec::with_capacity(2);
        for (kind, code, map) in [
            (CodeKind::Runtime, &output.deployed_bytecode, &output.deployed_source_map),
            (CodeKind::Creation, &output.bytecode, &output.source_map),
        ] {
            if code.trim().trim_start_matches("0x").is_empty() {
                continue;
            }
            let index = self.index_for(code, map)?;
            built.push((kind, index));
        }

        if built.is_empty() {
            return Err(EngineError::InvalidArtifact(format!(
                "artifact for {address} carries no bytecode"
            )));
        }

        for (kind, index) in built {
            let code = ContractCode {
                index,
                sources: sources.clone(),
                selectors: selectors.clone(),
            };
            self.contracts.insert((address, kind), Arc::new(code));
        }

        info!(
            %address,
            name = artifact.name.as_deref().unwrap_or("<unnamed>"),
            sources = artifact.sources.len(),
            "registered contract"
        );
        Ok(())
    }

    /// Build the index for a bytecode, or reuse the cached one.
    fn index_for(&self, code: &str, source_map: &str) -> EngineResult<Arc<InstructionIndex>> {
        let disassembly = disassemble(code)?;
        let source_map = source_map.trim();
        let code_hash = keccak256(&disassembly.bytecode);
        let key = (code_hash, keccak256(source_map));

        if let Some(index) = self.indexes.get(&key) {
            debug!(%code_hash, "reusing cached instruction index");
            return Ok(index.clone());
        }

        let index = if source_map.is_empty() {
            warn!(%code_hash, "bytecode registered without a source map");
            InstructionIndex::without_source_map(disassembly)
        } else {
            InstructionIndex::from_source_map(disassembly, source_map)?
        };

        let index = Arc::new(index);
        self.indexes.insert(key, index.clone());
        Ok(index)
    }

    /// Remove every bytecode registered for `address`.
    pub fn unregister(&self, address: Address) {
        self.contracts.remove(&(address, CodeKind::Runtime));
        self.contracts.remove(&(address, CodeKind::Creation));
    }

    /// Whether any bytecode is registered for `address`
    pub fn contains(&self, address: Address) -> bool {
        self.contracts.contains_key(&(address, CodeKind::Runtime))
            || self.contracts.contains_key(&(address, CodeKind::Creation))
    }

    /// Number of distinct (bytecode, source map) pairs indexed
    pub fn cached_indexes(&self) -> usize {
        self.indexes.len()
    }

    fn code(&self, owner: &FrameOwner) -> Option<Arc<ContractCode>> {
        let address = owner.address?;
        self.contracts.get(&(address, owner.code_kind)).map(|entry| entry.value().clone())
    }

    /// Instruction index of `address`'s code of the given kind.
    pub fn index(&self, address: Address, kind: CodeKind) -> EngineResult<Arc<InstructionIndex>> {
        self.contracts
            .get(&(address, kind))
            .map(|entry| entry.index.clone())
            .ok_or(EngineError::UnknownContract(address))
    }

    /// Source-map entry of the instruction at `pc`.
    pub fn entry_at(&self, owner: &FrameOwner, pc: u32) -> Option<SourceMapEntry> {
        self.code(owner)?.index.source_at_pc(pc)
    }

    /// Resolve the instruction at `pc` to a file and line.
    ///
    /// `None` for unmapped instructions, unregistered contracts, and source
    /// files that were not supplied with the artifact.
    pub fn location_at(&self, owner: &FrameOwner, pc: u32) -> Option<SourceLocation> {
        let code = self.code(owner)?;
        let entry = code.index.source_at_pc(pc)?;
        if !entry.is_mapped() {
            return None;
        }

        let Some(file) = code.sources.get(&(entry.file_index as u32)) else {
            debug!(file_index = entry.file_index, "source map points at an unknown file");
            return None;
        };
        let offset = entry.offset as usize;
        let (line, column) = file.lines.position(offset)?;

        Some(SourceLocation {
            file_index: entry.file_index as u32,
            path: file.path.clone(),
            offset: entry.offset as u32,
            length: entry.length.max(0) as u32,
            line,
            column,
            jump_kind: entry.jump_kind,
        })
    }

    /// Source text covered by a location in `owner`'s sources.
    pub fn source_text(&self, owner: &FrameOwner, location: &SourceLocation) -> Option<String> {
        let code = self.code(owner)?;
        let file = code.sources.get(&location.file_index)?;
        crate::utils::source_string_at(&file.content, location.offset as usize, location.length as usize)
            .map(str::to_string)
    }

    /// Full content of a registered source file, looked up by path.
    pub fn source_file(&self, path: &Path) -> Option<String> {
        self.contracts.iter().find_map(|entry| {
            entry.sources.values().find(|file| file.path == path).map(|file| file.content.clone())
        })
    }

    /// Function name for a selector in the ABI of `address`.
    pub fn function_name(&self, address: Address, selector: Selector) -> Option<String> {
        self.code(&FrameOwner::runtime(address))
            .or_else(|| self.code(&FrameOwner::creation(Some(address))))?
            .selectors
            .get(&selector)
            .cloned()
    }
}

impl CallSiteResolver for ContractRegistry {
    fn source_entry(&self, owner: &FrameOwner, pc: u32) -> Option<SourceMapEntry> {
        self.entry_at(owner, pc)
    }

    fn source_location(&self, owner: &FrameOwner, pc: u32) -> Option<SourceLocation> {
        self.location_at(owner, pc)
    }

    fn function_name(&self, address: Address, selector: Selector) -> Option<String> {
        Self::function_name(self, address, selector)
    }
}
