//! Data-driven block loading from JSON.
//!
//! Feature-gated behind `data-loader`. Provides JSON deserialization into
//! [`BlockRegistry`] for game content defined in data files.

use crate::block::{BlockRegistry, PowerSpec, RegistryError};
use crate::fixed::f64_to_fixed64;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

/// Top-level block data structure for JSON deserialization.
#[derive(Debug, serde::Deserialize)]
pub struct BlockFile {
    #[serde(default)]
    pub blocks: Vec<BlockData>,
}

/// JSON representation of a block template. Omitted power fields are zero.
#[derive(Debug, serde::Deserialize)]
pub struct BlockData {
    pub name: String,
    #[serde(default)]
    pub consumption: f64,
    #[serde(default)]
    pub production: f64,
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load a block registry from a JSON string.
pub fn load_blocks_json(json: &str) -> Result<BlockRegistry, DataLoadError> {
    let data: BlockFile = serde_json::from_str(json)?;
    build_registry(data)
}

/// Load a block registry from JSON bytes.
pub fn load_blocks_json_bytes(bytes: &[u8]) -> Result<BlockRegistry, DataLoadError> {
    let data: BlockFile = serde_json::from_slice(bytes)?;
    build_registry(data)
}

fn build_registry(data: BlockFile) -> Result<BlockRegistry, DataLoadError> {
    let mut registry = BlockRegistry::new();
    for block in data.blocks {
        let power = PowerSpec {
            consumption: f64_to_fixed64(block.consumption),
            production: f64_to_fixed64(block.production),
        };
        registry.register(&block.name, power)?;
    }
    Ok(registry)
}

// ===========================================================================
// Tests
// ===========================================================================
