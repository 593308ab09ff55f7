//! # cascade-algo: Routing and Mass-Balance Algorithms
//!
//! Everything here is derived from the immutable structures in `cascade-core`:
//!
//! - [`routing`] - travel-time arrival/departure maps and ramp lookahead windows
//! - [`balance`] - node balance, reservoir release split and storage continuity
//! - [`flow_bounds`] - instantaneous minimum/maximum flow rows
//! - [`ramp`] - ramp rows over the lookahead windows
//! - [`aggregate`] - horizon-average flow bounds with upstream-inflow relaxation
//! - [`model`] - [`WaterSystemModel`], one subproblem with every family above
//!
//! Constraints are produced as [`ConstraintRow`]s over good_lp expressions. No solver
//! backend is enabled by default; the `solver-*` features forward to good_lp.
//!
//! ## Example
//!
//! ```rust
//! use cascade_algo::{ModelOptions, RoutedTimepoint, RoutingOptions, WaterSystemModel};
//! use cascade_core::*;
//!
//! let grid = TimeGrid::builder()
//!     .timepoint(1, 12.0, 1.0)
//!     .timepoint(2, 12.0, 1.0)
//!     .horizon("day", 1, BoundaryType::Circular, [1, 2])
//!     .build()?;
//! let mut network = WaterNetwork::new();
//! let dam = network.add_node("dam", Some(Reservoir::default()))?;
//! let town = network.add_node("town", None)?;
//! let river = network.add_link(WaterLink::new("river", dam, town).with_travel_time(18.0))?;
//!
//! let model = WaterSystemModel::build(
//!     grid,
//!     network,
//!     WaterInputs::new(),
//!     ModelOptions::new(RoutingOptions::new("day")),
//! )?;
//! let tp1 = TimepointId::new(1);
//! assert_eq!(model.arrival(river, tp1), Some(RoutedTimepoint::Within(tp1)));
//! # Ok::<(), CascadeError>(())
//! ```

pub mod aggregate;
pub mod balance;
pub mod expression;
pub mod flow_bounds;
pub mod model;
pub mod ramp;
pub mod routing;
pub mod test_utils;
pub mod variables;

pub use aggregate::{adjusted_maximum, AggregateSummary, HorizonAggregateBounds, HorizonAggregateLimits};
pub use balance::{
    FlowStateValues, ReleaseSplit, ReservoirBalance, ReservoirFlowState,
    DEFAULT_VOLUME_PER_FLOW_HOUR,
};
pub use expression::{evaluate, ConstraintRow, ConstraintSense};
pub use flow_bounds::{flow_bound_constraints, flow_limits, FlowLimits};
pub use model::{ConstraintCounts, ModelOptions, WaterConstraints, WaterSystemModel};
pub use ramp::{ramp_constraints, ramp_limit_constraints};
pub use routing::{
    DepartureArrivalPair, LinkedBoundaryPolicy, RoutedTimepoint, RoutingOptions, TravelTimeRouter,
};
pub use variables::{FlowVariables, ViolationVariable, WaterVariables};
