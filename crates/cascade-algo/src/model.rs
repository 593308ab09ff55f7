//! Subproblem facade: resolver and router built once, every constraint family on demand.

use good_lp::{Expression, ProblemVariables};
use serde::{Deserialize, Serialize};
use tracing::info;

use cascade_core::{
    CascadeResult, HorizonKey, HorizonResolver, LinkId, NodeId, TimeGrid, TimepointId,
    WaterInputs, WaterNetwork,
};

use crate::aggregate::{HorizonAggregateBounds, HorizonAggregateLimits};
use crate::balance::{ReservoirBalance, ReservoirFlowState, DEFAULT_VOLUME_PER_FLOW_HOUR};
use crate::expression::ConstraintRow;
use crate::flow_bounds::flow_bound_constraints;
use crate::ramp::ramp_constraints;
use crate::routing::{RoutedTimepoint, RoutingOptions, TravelTimeRouter};
use crate::variables::{FlowVariables, WaterVariables};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub routing: RoutingOptions,
    /// Storage volume units per flow-hour
    pub volume_per_flow_hour: f64,
    /// Scale routed inflow by departure over arrival duration
    pub volume_weighted_inflow: bool,
}

impl ModelOptions {
    pub fn new(routing: RoutingOptions) -> Self {
        Self {
            routing,
            volume_per_flow_hour: DEFAULT_VOLUME_PER_FLOW_HOUR,
            volume_weighted_inflow: false,
        }
    }
}

/// Every constraint family of the water system, ready for a solver layer.
#[derive(Debug, Clone, Default)]
pub struct WaterConstraints {
    pub balance: Vec<ConstraintRow>,
    pub storage: Vec<ConstraintRow>,
    pub flow_bounds: Vec<ConstraintRow>,
    pub ramps: Vec<ConstraintRow>,
    pub horizon_aggregates: Vec<HorizonAggregateBounds>,
}

impl WaterConstraints {
    /// All rows, aggregate min/max rows flattened in.
    pub fn rows(&self) -> impl Iterator<Item = &ConstraintRow> + '_ {
        self.balance
            .iter()
            .chain(&self.storage)
            .chain(&self.flow_bounds)
            .chain(&self.ramps)
            .chain(
                self.horizon_aggregates
                    .iter()
                    .flat_map(|b| b.min.iter().chain(b.max.iter())),
            )
    }

    pub fn len(&self) -> usize {
        self.rows().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> ConstraintCounts {
        ConstraintCounts {
            balance: self.balance.len(),
            storage: self.storage.len(),
            flow_bounds: self.flow_bounds.len(),
            ramps: self.ramps.len(),
            horizon_aggregates: self
                .horizon_aggregates
                .iter()
                .map(|b| usize::from(b.min.is_some()) + usize::from(b.max.is_some()))
                .sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstraintCounts {
    pub balance: usize,
    pub storage: usize,
    pub flow_bounds: usize,
    pub ramps: usize,
    pub horizon_aggregates: usize,
}

/// One subproblem of the water system.
///
/// Owns the immutable inputs and the maps derived from them. Constraint builders borrow
/// from it and take any [`WaterVariables`] implementation.
#[derive(Debug, Clone)]
pub struct WaterSystemModel {
    grid: TimeGrid,
    network: WaterNetwork,
    inputs: WaterInputs,
    resolver: HorizonResolver,
    router: TravelTimeRouter,
    options: ModelOptions,
}

impl WaterSystemModel {
    pub fn build(
        grid: TimeGrid,
        network: WaterNetwork,
        inputs: WaterInputs,
        options: ModelOptions,
    ) -> CascadeResult<Self> {
        inputs.validate(&grid, &network)?;
        let resolver = HorizonResolver::new(&grid);
        let router = TravelTimeRouter::build(
            &grid,
            &resolver,
            &network,
            inputs.ramp_limits(),
            options.routing.clone(),
        )?;
        info!(
            nodes = network.node_count(),
            links = network.link_count(),
            timepoints = grid.len(),
            horizons = grid.horizons().len(),
            "built water system model"
        );
        Ok(Self {
            grid,
            network,
            inputs,
            resolver,
            router,
            options,
        })
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn network(&self) -> &WaterNetwork {
        &self.network
    }

    pub fn inputs(&self) -> &WaterInputs {
        &self.inputs
    }

    pub fn resolver(&self) -> &HorizonResolver {
        &self.resolver
    }

    pub fn router(&self) -> &TravelTimeRouter {
        &self.router
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn arrival(&self, link: LinkId, departure: TimepointId) -> Option<RoutedTimepoint> {
        self.router.arrival(link, departure)
    }

    pub fn departure(&self, link: LinkId, arrival: TimepointId) -> &[RoutedTimepoint] {
        self.router.departures(link, arrival)
    }

    pub fn ramp_lookahead(&self, link: LinkId, limit: &str, start: TimepointId) -> &[RoutedTimepoint] {
        self.router.ramp_lookahead(link, limit, start)
    }

    pub fn balance(&self) -> ReservoirBalance<'_> {
        ReservoirBalance::new(
            &self.grid,
            &self.resolver,
            &self.network,
            &self.inputs,
            &self.router,
        )
        .with_volume_per_flow_hour(self.options.volume_per_flow_hour)
        .with_volume_weighted_inflow(self.options.volume_weighted_inflow)
    }

    pub fn aggregate_limits(&self) -> HorizonAggregateLimits<'_> {
        HorizonAggregateLimits::new(&self.grid, &self.network, &self.inputs)
    }

    /// Declare the stock flow, release, spill and storage variables.
    pub fn declare_variables(&self, vars: &mut ProblemVariables) -> FlowVariables {
        FlowVariables::declare(vars, &self.grid, &self.network)
    }

    pub fn gross_inflow<V: WaterVariables>(&self, vars: &V, node: NodeId, timepoint: TimepointId) -> Expression {
        self.balance().gross_inflow(vars, node, timepoint)
    }

    pub fn gross_outflow<V: WaterVariables>(&self, vars: &V, node: NodeId, timepoint: TimepointId) -> Expression {
        self.balance().gross_outflow(vars, node, timepoint)
    }

    pub fn flow_states<V: WaterVariables>(&self, vars: &V) -> Vec<ReservoirFlowState> {
        self.balance().flow_states(vars)
    }

    /// Min and max aggregate rows of `link` over the horizon `(balancing_type, horizon)`.
    pub fn horizon_aggregate_bounds<V: WaterVariables>(
        &self,
        vars: &V,
        link: LinkId,
        balancing_type: &str,
        horizon: u32,
    ) -> (Option<ConstraintRow>, Option<ConstraintRow>) {
        let key = HorizonKey::new(balancing_type, horizon);
        self.aggregate_limits()
            .bounds(vars, link, &key)
            .map(|b| (b.min, b.max))
            .unwrap_or((None, None))
    }

    /// Build every constraint family.
    pub fn constraints<V: WaterVariables>(&self, vars: &V) -> CascadeResult<WaterConstraints> {
        let balance = self.balance();
        let constraints = WaterConstraints {
            balance: balance.balance_constraints(vars),
            storage: balance.storage_constraints(
                vars,
                &self.options.routing.balancing_type,
                self.options.routing.linked_policy,
            )?,
            flow_bounds: flow_bound_constraints(&self.grid, &self.network, &self.inputs, vars),
            ramps: ramp_constraints(
                &self.grid,
                &self.resolver,
                &self.router,
                self.inputs.ramp_limits(),
                vars,
            ),
            horizon_aggregates: self.aggregate_limits().all_bounds(vars),
        };
        let counts = constraints.counts();
        info!(
            balance = counts.balance,
            storage = counts.storage,
            flow_bounds = counts.flow_bounds,
            ramps = counts.ramps,
            horizon_aggregates = counts.horizon_aggregates,
            "generated water constraints"
        );
        Ok(constraints)
    }
}
