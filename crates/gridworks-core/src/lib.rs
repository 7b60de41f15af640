//! Gridworks Core -- shared substrate for the Gridworks grid simulation.
//!
//! This crate provides the deterministic fixed-point arithmetic, entity
//! identifiers, and the block registry that the per-tick simulation modules
//! (power distribution, and eventually others) are built on.
//!
//! # Key Types
//!
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`id::NodeId`] -- slotmap key identifying one grid cell.
//! - [`block::BlockRegistry`] -- block templates with their per-tick power
//!   profiles, resolved by name or [`id::BlockTypeId`]. Registered during
//!   startup and treated as read-only once the simulation runs.

pub mod block;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod fixed;
pub mod id;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
