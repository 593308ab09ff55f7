//! # Reservoir and Node Mass Balance
//!
//! Gross inflow and outflow of every water node as linear expressions over the flow
//! variables, and the constraint rows that tie them together.
//!
//! ```text
//! inflow(n, t)  = exogenous(n, t) + sum over links into n of
//!                 sum over d in departure(link, t) of flow(link, d)
//! outflow(n, t) = sum over links out of n of flow(link, t)
//!
//! junction:   inflow(n, t) == outflow(n, t)   (outlets without outbound links excepted)
//! reservoir:  outflow(n, t) == release(n, t) + spill(n, t)
//!             storage(n, next(t)) == storage(n, t)
//!                                  + (inflow - release - spill)(n, t) * h(t) * k
//! ```
//!
//! `k` converts one flow-hour into storage volume units. With
//! [`ReservoirBalance::with_volume_weighted_inflow`] each routed term is scaled by
//! `h(d) / h(t)` instead, so departures landing in an arrival timepoint of a different
//! length contribute their volume rather than their rate.

use good_lp::{Expression, Variable};
use serde::Serialize;
use tracing::{debug, warn};

use cascade_core::{
    BoundaryType, CascadeError, CascadeResult, FlowRate, HorizonResolver, NodeId, StepError,
    TimeGrid, TimepointId, WaterInputs, WaterNetwork,
};

use crate::expression::{evaluate, ConstraintRow};
use crate::routing::{LinkedBoundaryPolicy, RoutedTimepoint, TravelTimeRouter};
use crate::variables::WaterVariables;

/// Default volume units per flow-hour (cubic meters per m3/s-hour).
pub const DEFAULT_VOLUME_PER_FLOW_HOUR: f64 = 3600.0;

/// Symbolic flow quantities of one node in one timepoint.
#[derive(Debug, Clone)]
pub struct ReservoirFlowState {
    pub node: NodeId,
    pub timepoint: TimepointId,
    pub exogenous_inflow: FlowRate,
    pub endogenous_inflow: Expression,
    pub gross_inflow: Expression,
    pub gross_outflow: Expression,
    /// Present only for reservoir nodes
    pub release: Option<ReleaseSplit>,
}

#[derive(Debug, Clone)]
pub struct ReleaseSplit {
    pub release: Expression,
    pub spill: Expression,
}

/// A [`ReservoirFlowState`] evaluated against variable values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowStateValues {
    pub node: NodeId,
    pub timepoint: TimepointId,
    pub exogenous_inflow: f64,
    pub endogenous_inflow: f64,
    pub gross_inflow: f64,
    pub gross_outflow: f64,
    pub release: Option<f64>,
    pub spill: Option<f64>,
}

impl ReservoirFlowState {
    pub fn evaluate<F>(&self, value_of: F) -> FlowStateValues
    where
        F: Fn(Variable) -> f64,
    {
        FlowStateValues {
            node: self.node,
            timepoint: self.timepoint,
            exogenous_inflow: self.exogenous_inflow.value(),
            endogenous_inflow: evaluate(&self.endogenous_inflow, &value_of),
            gross_inflow: evaluate(&self.gross_inflow, &value_of),
            gross_outflow: evaluate(&self.gross_outflow, &value_of),
            release: self.release.as_ref().map(|r| evaluate(&r.release, &value_of)),
            spill: self.release.as_ref().map(|r| evaluate(&r.spill, &value_of)),
        }
    }
}

/// Mass-balance builder for one subproblem.
#[derive(Debug, Clone, Copy)]
pub struct ReservoirBalance<'a> {
    grid: &'a TimeGrid,
    resolver: &'a HorizonResolver,
    network: &'a WaterNetwork,
    inputs: &'a WaterInputs,
    router: &'a TravelTimeRouter,
    volume_per_flow_hour: f64,
    volume_weighted_inflow: bool,
}

impl<'a> ReservoirBalance<'a> {
    pub fn new(
        grid: &'a TimeGrid,
        resolver: &'a HorizonResolver,
        network: &'a WaterNetwork,
        inputs: &'a WaterInputs,
        router: &'a TravelTimeRouter,
    ) -> Self {
        Self {
            grid,
            resolver,
            network,
            inputs,
            router,
            volume_per_flow_hour: DEFAULT_VOLUME_PER_FLOW_HOUR,
            volume_weighted_inflow: false,
        }
    }

    pub fn with_volume_per_flow_hour(mut self, factor: f64) -> Self {
        self.volume_per_flow_hour = factor;
        self
    }

    /// Scale each routed flow by `h(departure) / h(arrival)`.
    pub fn with_volume_weighted_inflow(mut self, weighted: bool) -> Self {
        self.volume_weighted_inflow = weighted;
        self
    }

    /// Routed inflow arriving at `node` during `timepoint`.
    pub fn endogenous_inflow<V: WaterVariables>(&self, vars: &V, node: NodeId, timepoint: TimepointId) -> Expression {
        let mut inflow = Expression::from(0.0);
        let arrival_hours = self.grid.duration(timepoint);
        if arrival_hours.value() <= 0.0 {
            return inflow;
        }
        for link in self.network.links_to(node) {
            for departure in self.router.departures(link, timepoint) {
                let RoutedTimepoint::Within(d) = departure else {
                    continue;
                };
                if self.volume_weighted_inflow {
                    inflow += vars.link_flow(link, *d) * (self.grid.duration(*d) / arrival_hours);
                } else {
                    inflow += vars.link_flow(link, *d);
                }
            }
        }
        inflow
    }

    pub fn gross_inflow<V: WaterVariables>(&self, vars: &V, node: NodeId, timepoint: TimepointId) -> Expression {
        let exogenous = self.inputs.exogenous_inflow(node, timepoint).value();
        self.endogenous_inflow(vars, node, timepoint) + exogenous
    }

    pub fn gross_outflow<V: WaterVariables>(&self, vars: &V, node: NodeId, timepoint: TimepointId) -> Expression {
        let mut outflow = Expression::from(0.0);
        for link in self.network.links_from(node) {
            outflow += vars.link_flow(link, timepoint);
        }
        outflow
    }

    pub fn flow_state<V: WaterVariables>(&self, vars: &V, node: NodeId, timepoint: TimepointId) -> ReservoirFlowState {
        let endogenous_inflow = self.endogenous_inflow(vars, node, timepoint);
        let exogenous_inflow = self.inputs.exogenous_inflow(node, timepoint);
        let is_reservoir = self
            .network
            .node(node)
            .map(|n| n.has_reservoir())
            .unwrap_or(false);
        ReservoirFlowState {
            node,
            timepoint,
            exogenous_inflow,
            gross_inflow: endogenous_inflow.clone() + exogenous_inflow.value(),
            endogenous_inflow,
            gross_outflow: self.gross_outflow(vars, node, timepoint),
            release: is_reservoir.then(|| ReleaseSplit {
                release: vars.reservoir_release(node, timepoint),
                spill: vars.reservoir_spill(node, timepoint),
            }),
        }
    }

    /// Flow state of every node in every timepoint, in (node, timepoint) order.
    pub fn flow_states<V: WaterVariables>(&self, vars: &V) -> Vec<ReservoirFlowState> {
        self.network
            .nodes()
            .flat_map(|node| {
                self.grid
                    .timepoint_ids()
                    .map(move |tp| self.flow_state(vars, node.id, tp))
            })
            .collect()
    }

    /// Junction balance and reservoir release rows for every node and timepoint.
    ///
    /// Junctions without outbound links are system outlets and get no balance row.
    pub fn balance_constraints<V: WaterVariables>(&self, vars: &V) -> Vec<ConstraintRow> {
        let mut rows = Vec::new();
        for node in self.network.nodes() {
            if !node.has_reservoir() && self.network.links_from(node.id).is_empty() {
                continue;
            }
            for tp in self.grid.timepoint_ids() {
                let outflow = self.gross_outflow(vars, node.id, tp);
                if node.has_reservoir() {
                    let released =
                        vars.reservoir_release(node.id, tp) + vars.reservoir_spill(node.id, tp);
                    rows.push(ConstraintRow::equal(
                        format!("release[{},{}]", node.name, tp.value()),
                        outflow,
                        released,
                    ));
                } else {
                    rows.push(ConstraintRow::equal(
                        format!("balance[{},{}]", node.name, tp.value()),
                        self.gross_inflow(vars, node.id, tp),
                        outflow,
                    ));
                }
            }
        }
        debug!(rows = rows.len(), "built node balance constraints");
        rows
    }

    /// Storage continuity and initial-storage rows for every reservoir node.
    pub fn storage_constraints<V: WaterVariables>(
        &self,
        vars: &V,
        balancing_type: &str,
        policy: LinkedBoundaryPolicy,
    ) -> CascadeResult<Vec<ConstraintRow>> {
        let mut rows = Vec::new();
        let mut linked_skipped = 0usize;
        for node in self.network.nodes().filter(|n| n.has_reservoir()) {
            let initial = node.reservoir.as_ref().and_then(|r| r.initial_storage);
            for tp in self.grid.timepoint_ids() {
                if let (Some(volume), true) = (initial, self.pins_initial_storage(tp, balancing_type)) {
                    rows.push(ConstraintRow::equal(
                        format!("initial_storage[{},{}]", node.name, tp.value()),
                        vars.reservoir_storage(node.id, tp),
                        Expression::from(volume.value()),
                    ));
                }

                let next = match self.resolver.next(tp, balancing_type) {
                    Ok(next) => next,
                    Err(StepError::NoSuccessor(_)) => continue,
                    Err(err @ StepError::RequiresLinkedHorizon { .. }) => match policy {
                        LinkedBoundaryPolicy::Fallback => {
                            linked_skipped += 1;
                            continue;
                        }
                        LinkedBoundaryPolicy::Strict => return Err(err.into()),
                    },
                    Err(err) => return Err(CascadeError::from(err)),
                };

                let factor = self.grid.duration(tp).value() * self.volume_per_flow_hour;
                let net = self.gross_inflow(vars, node.id, tp)
                    - vars.reservoir_release(node.id, tp)
                    - vars.reservoir_spill(node.id, tp);
                rows.push(ConstraintRow::equal(
                    format!("storage[{},{}]", node.name, tp.value()),
                    vars.reservoir_storage(node.id, next),
                    vars.reservoir_storage(node.id, tp) + net * factor,
                ));
            }
        }
        if linked_skipped > 0 {
            warn!(
                count = linked_skipped,
                "storage continuity omitted at linked horizon boundaries"
            );
        }
        debug!(rows = rows.len(), "built storage continuity constraints");
        Ok(rows)
    }

    /// Initial storage applies to the first timepoint of a horizon that does not wrap.
    fn pins_initial_storage(&self, timepoint: TimepointId, balancing_type: &str) -> bool {
        if !self.resolver.is_first(timepoint, balancing_type) {
            return false;
        }
        self.resolver
            .horizon_of(timepoint, balancing_type)
            .and_then(|key| self.resolver.boundary(key))
            .map(|boundary| boundary != BoundaryType::Circular)
            .unwrap_or(false)
    }
}
