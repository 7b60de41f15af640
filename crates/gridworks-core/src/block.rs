//! Block templates and the registry that resolves them.
//!
//! The registry is the read-only context the simulation modules consult to
//! answer "what does the block on this cell want or generate per tick". It
//! is populated during startup (programmatically or via the `data-loader`
//! feature) and never mutated while the simulation runs.

use crate::fixed::Fixed64;
use crate::id::BlockTypeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Power spec
// ---------------------------------------------------------------------------

/// Per-tick power profile of a block template.
///
/// Roles are capability flags derived from the numbers, not subclasses:
/// a block is a consumer if it draws power, a producer if it generates
/// power, both (e.g. a powered pump that also drives a turbine), or
/// neither (walls, conduits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerSpec {
    /// Power required per tick to run at full throughput.
    pub consumption: Fixed64,
    /// Power generated per tick under ideal conditions.
    pub production: Fixed64,
}

impl PowerSpec {
    /// A block that neither draws nor generates power.
    pub fn idle() -> Self {
        Self {
            consumption: Fixed64::from_num(0),
            production: Fixed64::from_num(0),
        }
    }

    /// A pure consumer drawing `amount` per tick.
    pub fn consumer(amount: Fixed64) -> Self {
        Self {
            consumption: amount,
            production: Fixed64::from_num(0),
        }
    }

    /// A pure producer generating `amount` per tick.
    pub fn producer(amount: Fixed64) -> Self {
        Self {
            consumption: Fixed64::from_num(0),
            production: amount,
        }
    }

    /// Whether this block draws power.
    pub fn is_consumer(&self) -> bool {
        self.consumption > Fixed64::from_num(0)
    }

    /// Whether this block generates power.
    pub fn is_producer(&self) -> bool {
        self.production > Fixed64::from_num(0)
    }
}

/// A block template definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDef {
    pub name: String,
    pub power: PowerSpec,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Errors that can occur during block registration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A block with this name is already registered.
    #[error("duplicate block name: {0}")]
    DuplicateBlock(String),
}

/// Registry of block templates, indexed by [`BlockTypeId`] and by name.
///
/// IDs are assigned in registration order and stay stable for the lifetime
/// of the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockRegistry {
    blocks: Vec<BlockDef>,
    name_to_id: HashMap<String, BlockTypeId>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block template. Returns its ID, or an error if the name
    /// is already taken.
    pub fn register(&mut self, name: &str, power: PowerSpec) -> Result<BlockTypeId, RegistryError> {
        if self.name_to_id.contains_key(name) {
            return Err(RegistryError::DuplicateBlock(name.to_string()));
        }
        let id = BlockTypeId(self.blocks.len() as u32);
        self.blocks.push(BlockDef {
            name: name.to_string(),
            power,
        });
        self.name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Look up a block definition by ID.
    pub fn get(&self, id: BlockTypeId) -> Option<&BlockDef> {
        self.blocks.get(id.0 as usize)
    }

    /// Look up a block ID by name.
    pub fn lookup(&self, name: &str) -> Option<BlockTypeId> {
        self.name_to_id.get(name).copied()
    }

    /// Number of registered block templates.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
