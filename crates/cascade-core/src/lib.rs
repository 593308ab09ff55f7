//! # cascade-core: Water System Modeling Core
//!
//! Fundamental data structures for routing water through a cascading hydro system over a
//! discretized planning horizon.
//!
//! ## Design Philosophy
//!
//! - **Time** is a [`TimeGrid`]: ordered timepoints with durations, partitioned into
//!   horizons once per balancing type. Each horizon has a [`BoundaryType`] describing what
//!   lies past its edges.
//! - **Space** is a [`WaterNetwork`]: a petgraph `DiGraph` whose nodes are junctions or
//!   reservoirs and whose edges are conveyance links with a travel time.
//! - **Parameters** that vary over time (inflows, bounds, ramp limits) live in
//!   [`WaterInputs`], keyed by the typed ids of the two structures above.
//!
//! Everything here is immutable once built; the algorithms in `cascade-algo` derive
//! their maps from it.
//!
//! ## Quick Start
//!
//! ```rust
//! use cascade_core::*;
//!
//! let grid = TimeGrid::builder()
//!     .timepoint(1, 12.0, 1.0)
//!     .timepoint(2, 12.0, 1.0)
//!     .horizon("day", 1, BoundaryType::Circular, [1, 2])
//!     .build()?;
//!
//! let resolver = HorizonResolver::new(&grid);
//! assert_eq!(resolver.next(TimepointId::new(2), "day")?, TimepointId::new(1));
//!
//! let mut network = WaterNetwork::new();
//! let dam = network.add_node("dam", Some(Reservoir::default()))?;
//! let town = network.add_node("town", None)?;
//! network.add_link(WaterLink::new("river", dam, town).with_travel_time(18.0))?;
//! assert_eq!(network.links_to(town).len(), 1);
//! # Ok::<(), CascadeError>(())
//! ```
//!
//! ## Modules
//!
//! - [`time_grid`] - timepoints, horizons and boundary types
//! - [`horizon`] - O(1) successor/predecessor resolution
//! - [`network`] - water nodes and links
//! - [`inputs`] - inflows, flow bounds, ramp limits
//! - [`graph_utils`] - statistics, upstream closure, cycle detection
//! - [`diagnostics`] - advisory validation findings

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod horizon;
pub mod inputs;
pub mod network;
pub mod time_grid;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CascadeError, CascadeResult};
pub use graph_utils::{find_cycles, network_stats, upstream_nodes, NetworkStats};
pub use horizon::{HorizonResolver, StepError};
pub use inputs::{FlowBoundOverride, HorizonFlowBound, RampDirection, RampLimit, WaterInputs};
pub use network::{
    FlowViolationPenalties, LinkId, NodeId, Reservoir, ViolationAllowance, WaterLink, WaterNetwork,
    WaterNode,
};
pub use time_grid::{BoundaryType, Horizon, HorizonKey, TimeGrid, TimeGridBuilder, Timepoint, TimepointId};
pub use units::{FlowRate, Hours, Volume};
