//! Power Distribution Module for the Gridworks engine.
//!
//! Models per-tick power distribution across independent power graphs.
//! Each tick the module aggregates how much power a graph's consumers
//! collectively need and its producers collectively supply, then apportions
//! the supply proportionally to demand, writing a satisfaction ratio
//! (0..1 as [`Fixed64`]) into each consumer's [`PowerState`]. Events are
//! emitted on state transitions (brownout/restored), never every tick.
//!
//! # Design
//!
//! - Grid cells are referenced by [`NodeId`]; the graph never owns them.
//! - Membership is a contiguous, duplicate-free list per graph.
//! - Demand and supply are resolved through a [`PowerContext`], so the
//!   graph stays testable with synthetic nodes. [`BlockContext`] is the
//!   registry-backed implementation game code uses.
//! - Aggregates are recomputed fresh on every call; external conditions
//!   (daylight, fuel) may change them between ticks.
//! - Distribution applies one global clamped ratio to every consumer,
//!   never per-member division, so rounding error cannot accumulate.
//! - Topology maintenance (graph merging/splitting as cells connect and
//!   disconnect) happens outside this crate; membership is stable for
//!   the duration of a tick.

use std::collections::HashMap;

use gridworks_core::block::{BlockRegistry, PowerSpec};
use gridworks_core::fixed::{Fixed64, Ticks, checked_div_64, checked_mul_64};
use gridworks_core::id::{BlockTypeId, NodeId};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

// ---------------------------------------------------------------------------
// Graph identifier
// ---------------------------------------------------------------------------

/// Identifies a power graph. Cheap to copy and compare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PowerGraphId(pub u32);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported at the membership boundary. The per-tick hot path
/// (aggregation and distribution) never fails; it clamps instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PowerError {
    /// The node is already a member of the graph.
    #[error("node {0:?} is already a member of the power graph")]
    DuplicateMember(NodeId),
    /// No graph with this ID exists.
    #[error("no power graph with id {0:?}")]
    UnknownGraph(PowerGraphId),
}

// ---------------------------------------------------------------------------
// Per-node power state
// ---------------------------------------------------------------------------

/// Per-node power bookkeeping, read by block simulation to decide
/// operational throughput.
///
/// `satisfaction` is the fraction of the node's demand met by the last
/// distribution. It is written only by [`PowerGraph::distribute_power`]
/// and persists unchanged between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerState {
    /// Fraction of current demand met this tick: 0.0 to 1.0 (Fixed64).
    pub satisfaction: Fixed64,
}

impl Default for PowerState {
    fn default() -> Self {
        // A node that has never been through a distribution has demanded
        // nothing yet, so it starts vacuously satisfied.
        Self {
            satisfaction: Fixed64::from_num(1),
        }
    }
}

impl PowerState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Power context
// ---------------------------------------------------------------------------

/// Read-only per-tick view resolving each member's role and amounts.
///
/// Roles are determined outside the power core (by block type); the graph
/// only branches on capability. All returned amounts must be >= 0; the
/// graph clamps defensively regardless.
pub trait PowerContext {
    /// Whether the node currently draws power.
    fn is_consumer(&self, node: NodeId) -> bool;
    /// How much power the node wants this tick. Zero for non-consumers.
    fn demand(&self, node: NodeId) -> Fixed64;
    /// Whether the node currently generates power.
    fn is_producer(&self, node: NodeId) -> bool;
    /// How much power the node generates this tick. Zero for non-producers.
    fn supply(&self, node: NodeId) -> Fixed64;
}

/// Registry-backed [`PowerContext`]: resolves each node's block template
/// and scales its production by a per-node factor in [0, 1].
///
/// The scale models external conditions opaque to the power core, such as
/// daylight on a solar panel or fuel in a generator. Nodes without an
/// entry run at full production.
pub struct BlockContext<'a> {
    registry: &'a BlockRegistry,
    blocks: &'a SecondaryMap<NodeId, BlockTypeId>,
    production_scale: &'a SecondaryMap<NodeId, Fixed64>,
}

impl<'a> BlockContext<'a> {
    pub fn new(
        registry: &'a BlockRegistry,
        blocks: &'a SecondaryMap<NodeId, BlockTypeId>,
        production_scale: &'a SecondaryMap<NodeId, Fixed64>,
    ) -> Self {
        Self {
            registry,
            blocks,
            production_scale,
        }
    }

    fn spec(&self, node: NodeId) -> Option<PowerSpec> {
        let block = self.blocks.get(node)?;
        self.registry.get(*block).map(|def| def.power)
    }
}

impl PowerContext for BlockContext<'_> {
    fn is_consumer(&self, node: NodeId) -> bool {
        self.spec(node).is_some_and(|s| s.is_consumer())
    }

    fn demand(&self, node: NodeId) -> Fixed64 {
        self.spec(node)
            .map(|s| s.consumption)
            .unwrap_or_else(|| Fixed64::from_num(0))
    }

    fn is_producer(&self, node: NodeId) -> bool {
        self.spec(node).is_some_and(|s| s.is_producer())
    }

    fn supply(&self, node: NodeId) -> Fixed64 {
        let zero = Fixed64::from_num(0);
        let one = Fixed64::from_num(1);
        let Some(spec) = self.spec(node) else {
            return zero;
        };
        let scale = self
            .production_scale
            .get(node)
            .copied()
            .unwrap_or(one)
            .clamp(zero, one);
        checked_mul_64(spec.production, scale).unwrap_or(Fixed64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Power graph
// ---------------------------------------------------------------------------

/// A connected set of grid cells sharing a single power pool for one tick.
///
/// The graph aggregates demand and supply over its members and runs the
/// distribution that writes each consumer's satisfaction. It is driven by
/// the simulation scheduler; it never decides when ticks occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerGraph {
    /// Graph identifier.
    pub id: PowerGraphId,
    /// Member node IDs (contiguous for cache-friendly iteration,
    /// insertion order, no duplicates).
    members: Vec<NodeId>,
    /// Whether this graph was in brownout state after the last tick.
    /// Used to detect transitions for event emission.
    was_brownout: bool,
}

impl PowerGraph {
    /// Create a new empty power graph.
    pub fn new(id: PowerGraphId) -> Self {
        Self {
            id,
            members: Vec::new(),
            was_brownout: false,
        }
    }

    /// Add a node to this graph. Rejects duplicates so a node can never
    /// be double-counted in aggregation.
    pub fn add(&mut self, node: NodeId) -> Result<(), PowerError> {
        if self.members.contains(&node) {
            return Err(PowerError::DuplicateMember(node));
        }
        self.members.push(node);
        Ok(())
    }

    /// Remove a node from this graph. No-op if absent.
    pub fn remove(&mut self, node: NodeId) {
        self.members.retain(|n| *n != node);
    }

    /// Whether the node is a member of this graph.
    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    /// Member nodes in insertion order.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total power the graph's consumers require this tick to run at full
    /// throughput. Recomputed fresh on every call; always >= 0. Zero for
    /// an empty graph or a graph with no consumers.
    pub fn power_needed(&self, ctx: &impl PowerContext) -> Fixed64 {
        let zero = Fixed64::from_num(0);
        self.members
            .iter()
            .filter(|node| ctx.is_consumer(**node))
            .map(|node| ctx.demand(*node).max(zero))
            .fold(zero, |acc, demand| acc + demand)
    }

    /// Total power the graph's producers generate this tick. Recomputed
    /// fresh on every call; always >= 0. Zero for an empty graph or a
    /// graph with no producers.
    pub fn power_produced(&self, ctx: &impl PowerContext) -> Fixed64 {
        let zero = Fixed64::from_num(0);
        self.members
            .iter()
            .filter(|node| ctx.is_producer(**node))
            .map(|node| ctx.supply(*node).max(zero))
            .fold(zero, |acc, supply| acc + supply)
    }

    /// Apportion `produced` units of power across this graph's consumers
    /// proportionally to demand, writing each consumer's satisfaction.
    ///
    /// Equal proportional rationing: under scarcity every consumer gets
    /// the same fraction of its own demand, regardless of absolute size.
    /// Under surplus the ratio is capped at 1. Producer-only and idle
    /// members are never written. Negative inputs are clamped to zero;
    /// a game tick must never crash on a power imbalance.
    pub fn distribute_power(
        &self,
        needed: Fixed64,
        produced: Fixed64,
        ctx: &impl PowerContext,
        states: &mut SecondaryMap<NodeId, PowerState>,
    ) {
        let zero = Fixed64::from_num(0);
        let one = Fixed64::from_num(1);
        let needed = needed.max(zero);
        let produced = produced.max(zero);

        if needed == zero {
            // No one needs anything. Any consumer members necessarily
            // demand zero and are vacuously satisfied. The explicit branch
            // keeps division out of the zero-demand case entirely.
            for &node in &self.members {
                if ctx.is_consumer(node) {
                    write_satisfaction(states, node, one);
                }
            }
            return;
        }

        // One global fulfillment ratio for the whole graph. Every
        // consumer's demand already went into `needed`, so the same ratio
        // applies uniformly and no per-member division error accumulates.
        let ratio = checked_div_64(produced, needed)
            .unwrap_or(zero)
            .clamp(zero, one);

        for &node in &self.members {
            if !ctx.is_consumer(node) {
                continue;
            }
            let satisfaction = if ctx.demand(node) <= zero { one } else { ratio };
            write_satisfaction(states, node, satisfaction);
        }
    }
}

fn write_satisfaction(
    states: &mut SecondaryMap<NodeId, PowerState>,
    node: NodeId,
    value: Fixed64,
) {
    match states.get_mut(node) {
        Some(state) => state.satisfaction = value,
        None => {
            states.insert(node, PowerState { satisfaction: value });
        }
    }
}

// ---------------------------------------------------------------------------
// Power events
// ---------------------------------------------------------------------------

/// Events emitted by the power module on state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    /// Emitted when a graph transitions from satisfied to brownout.
    Brownout {
        graph: PowerGraphId,
        /// The shortfall: needed - produced.
        deficit: Fixed64,
        tick: Ticks,
    },
    /// Emitted when a graph transitions from brownout to fully satisfied.
    Restored { graph: PowerGraphId, tick: Ticks },
}

// ---------------------------------------------------------------------------
// Power module
// ---------------------------------------------------------------------------

/// Manages all power graphs and per-node power state.
///
/// The module is the top-level API for the power system: it owns the
/// graphs, the per-node [`PowerState`] storage, and the per-tick drive
/// loop. One module is advanced by one scheduler thread; operations on a
/// single graph are never interleaved within a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerModule {
    /// All power graphs, keyed by graph ID.
    pub graphs: HashMap<PowerGraphId, PowerGraph>,
    /// Per-node power state.
    pub states: SecondaryMap<NodeId, PowerState>,
    /// Next graph ID to assign.
    next_graph_id: u32,
}

impl Default for PowerModule {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerModule {
    /// Create a new empty power module.
    pub fn new() -> Self {
        Self {
            graphs: HashMap::new(),
            states: SecondaryMap::new(),
            next_graph_id: 0,
        }
    }

    /// Create a new power graph and return its ID.
    pub fn create_graph(&mut self) -> PowerGraphId {
        let id = PowerGraphId(self.next_graph_id);
        self.next_graph_id += 1;
        self.graphs.insert(id, PowerGraph::new(id));
        id
    }

    /// Get a reference to a graph by ID.
    pub fn graph(&self, id: PowerGraphId) -> Option<&PowerGraph> {
        self.graphs.get(&id)
    }

    /// Get a mutable reference to a graph by ID.
    pub fn graph_mut(&mut self, id: PowerGraphId) -> Option<&mut PowerGraph> {
        self.graphs.get_mut(&id)
    }

    /// Remove a power graph entirely. Member states are kept; the nodes
    /// may be re-attached to another graph by the topology manager.
    pub fn remove_graph(&mut self, id: PowerGraphId) {
        self.graphs.remove(&id);
    }

    /// Add a node to a graph, initializing its [`PowerState`] if this is
    /// the first time the module sees it.
    pub fn add_member(&mut self, graph_id: PowerGraphId, node: NodeId) -> Result<(), PowerError> {
        let graph = self
            .graphs
            .get_mut(&graph_id)
            .ok_or(PowerError::UnknownGraph(graph_id))?;
        graph.add(node)?;
        if !self.states.contains_key(node) {
            self.states.insert(node, PowerState::default());
        }
        Ok(())
    }

    /// Remove a node from the power system entirely (all graphs and its
    /// state).
    pub fn remove_node(&mut self, node: NodeId) {
        self.states.remove(node);
        for graph in self.graphs.values_mut() {
            graph.remove(node);
        }
    }

    /// Get the last-computed satisfaction for a node.
    pub fn satisfaction(&self, node: NodeId) -> Option<Fixed64> {
        self.states.get(node).map(|s| s.satisfaction)
    }

    /// Advance all power graphs by one tick.
    ///
    /// For each graph, in ascending graph-id order:
    /// 1. Sum demand over consumer members and supply over producers.
    /// 2. Distribute the supply, writing consumer satisfactions.
    /// 3. Emit brownout/restored events on state transitions.
    ///
    /// Returns the events emitted this tick.
    pub fn tick<C: PowerContext>(&mut self, ctx: &C, current_tick: Ticks) -> Vec<PowerEvent> {
        let ids = self.sorted_graph_ids();
        let totals: Vec<(PowerGraphId, Fixed64, Fixed64)> = ids
            .iter()
            .map(|id| {
                let graph = &self.graphs[id];
                (*id, graph.power_needed(ctx), graph.power_produced(ctx))
            })
            .collect();
        self.apply_totals(&totals, ctx, current_tick)
    }

    /// Like [`PowerModule::tick`], but aggregates disjoint graphs in
    /// parallel. Aggregation is read-only, so this is safe regardless of
    /// membership overlap; distribution and event emission stay serial in
    /// graph-id order, making the result identical to the serial path.
    #[cfg(feature = "parallel")]
    pub fn par_tick<C: PowerContext + Sync>(
        &mut self,
        ctx: &C,
        current_tick: Ticks,
    ) -> Vec<PowerEvent> {
        use rayon::prelude::*;

        let ids = self.sorted_graph_ids();
        let graphs = &self.graphs;
        let totals: Vec<(PowerGraphId, Fixed64, Fixed64)> = ids
            .par_iter()
            .map(|id| {
                let graph = &graphs[id];
                (*id, graph.power_needed(ctx), graph.power_produced(ctx))
            })
            .collect();
        self.apply_totals(&totals, ctx, current_tick)
    }

    fn sorted_graph_ids(&self) -> Vec<PowerGraphId> {
        let mut ids: Vec<PowerGraphId> = self.graphs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Distribution and transition-event phase shared by the serial and
    /// parallel tick paths.
    fn apply_totals(
        &mut self,
        totals: &[(PowerGraphId, Fixed64, Fixed64)],
        ctx: &impl PowerContext,
        current_tick: Ticks,
    ) -> Vec<PowerEvent> {
        let zero = Fixed64::from_num(0);
        let mut events = Vec::new();

        for &(id, needed, produced) in totals {
            let needed = needed.max(zero);
            let produced = produced.max(zero);

            let Some(graph) = self.graphs.get(&id) else {
                continue;
            };
            graph.distribute_power(needed, produced, ctx, &mut self.states);

            let is_brownout = needed > zero && produced < needed;
            let Some(graph) = self.graphs.get_mut(&id) else {
                continue;
            };
            if is_brownout && !graph.was_brownout {
                graph.was_brownout = true;
                events.push(PowerEvent::Brownout {
                    graph: id,
                    deficit: needed - produced,
                    tick: current_tick,
                });
            } else if !is_brownout && graph.was_brownout {
                graph.was_brownout = false;
                events.push(PowerEvent::Restored {
                    graph: id,
                    tick: current_tick,
                });
            }
        }

        events
    }
}

// ===========================================================================
// Tests
// ===========================================================================
