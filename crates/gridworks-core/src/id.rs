use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies one grid cell participating in the simulation.
    pub struct NodeId;
}

/// Identifies a block template in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockTypeId(pub u32);
