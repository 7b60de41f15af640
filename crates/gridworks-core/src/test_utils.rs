//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests and, via the `test-utils` feature, in
//! integration tests of downstream crates.

use crate::block::{BlockRegistry, PowerSpec};
use crate::fixed::Fixed64;
use crate::id::BlockTypeId;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Canonical test blocks
// ===========================================================================

// The registry built by `test_registry` assigns these IDs in order.

/// Pure consumer: 0.09 power per tick (5.4 per second at 60 ticks/s).
pub fn water_extractor() -> BlockTypeId {
    BlockTypeId(0)
}

/// Pure producer: 0.0045 power per tick (0.27 per second).
pub fn solar_panel() -> BlockTypeId {
    BlockTypeId(1)
}

/// Pure producer: 0.09 power per tick.
pub fn thermal_generator() -> BlockTypeId {
    BlockTypeId(2)
}

/// Dual role: consumes 0.03 and produces 0.06 per tick.
pub fn pump_station() -> BlockTypeId {
    BlockTypeId(3)
}

/// Neither consumer nor producer.
pub fn wall() -> BlockTypeId {
    BlockTypeId(4)
}

/// Build a registry containing the canonical test blocks.
pub fn test_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry
        .register("water-extractor", PowerSpec::consumer(fixed(0.09)))
        .unwrap();
    registry
        .register("solar-panel", PowerSpec::producer(fixed(0.0045)))
        .unwrap();
    registry
        .register("thermal-generator", PowerSpec::producer(fixed(0.09)))
        .unwrap();
    registry
        .register(
            "pump-station",
            PowerSpec {
                consumption: fixed(0.03),
                production: fixed(0.06),
            },
        )
        .unwrap();
    registry.register("wall", PowerSpec::idle()).unwrap();
    registry
}
