//! # Horizon Aggregate Flow Limits
//!
//! Average-flow bounds over a whole horizon, written as flow-hour sums over the
//! departure timepoints of that horizon:
//!
//! ```text
//! min:  sum_d flow(link, d) * h(d) >= min          * total_hours
//! max:  sum_d flow(link, d) * h(d) <= adjusted_max * total_hours
//!
//! adjusted_max = max + max(0, upstream_avg - threshold)
//! upstream_avg = sum over upstream nodes n, timepoints t of the horizon of
//!                exogenous(n, t) * h(t) / total_hours
//! ```
//!
//! The adjustment lets a link pass through high-inflow periods without forcing a
//! violation; it is zero when the link has no upstream mapping or no threshold.

use good_lp::Expression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cascade_core::{
    FlowRate, HorizonFlowBound, HorizonKey, Hours, LinkId, TimeGrid, WaterInputs, WaterNetwork,
};

use crate::expression::ConstraintRow;
use crate::variables::WaterVariables;

/// Configured maximum raised by whatever the upstream average exceeds the threshold by.
pub fn adjusted_maximum(max: FlowRate, upstream_average: FlowRate, threshold: Option<FlowRate>) -> FlowRate {
    match threshold {
        Some(threshold) => max + (upstream_average - threshold).max(FlowRate::ZERO),
        None => max,
    }
}

/// Aggregate rows for one (link, horizon).
#[derive(Debug, Clone)]
pub struct HorizonAggregateBounds {
    pub link: LinkId,
    pub horizon: HorizonKey,
    pub total_hours: Hours,
    pub upstream_average: FlowRate,
    pub adjusted_max: Option<FlowRate>,
    pub min: Option<ConstraintRow>,
    pub max: Option<ConstraintRow>,
}

/// Plain-data view of a [`HorizonAggregateBounds`] for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub link: String,
    pub horizon: String,
    pub total_hours: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub adjusted_max: Option<f64>,
    pub upstream_average: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct HorizonAggregateLimits<'a> {
    grid: &'a TimeGrid,
    network: &'a WaterNetwork,
    inputs: &'a WaterInputs,
}

impl<'a> HorizonAggregateLimits<'a> {
    pub fn new(grid: &'a TimeGrid, network: &'a WaterNetwork, inputs: &'a WaterInputs) -> Self {
        Self {
            grid,
            network,
            inputs,
        }
    }

    /// Duration-weighted average exogenous inflow into the upstream nodes of `link`.
    pub fn upstream_average(&self, link: LinkId, horizon: &HorizonKey) -> FlowRate {
        let total = self.grid.horizon_hours(horizon);
        let Some(h) = self.grid.horizon(horizon) else {
            return FlowRate::ZERO;
        };
        if total.value() <= 0.0 {
            return FlowRate::ZERO;
        }
        let mut flow_hours = 0.0;
        for node in self.inputs.upstream_nodes(link) {
            for tp in h.timepoints() {
                flow_hours += self
                    .inputs
                    .exogenous_inflow(*node, *tp)
                    .over(self.grid.duration(*tp));
            }
        }
        FlowRate(flow_hours / total.value())
    }

    /// Flow-hours on `link` summed over the departure timepoints of `horizon`.
    pub fn flow_hours<V: WaterVariables>(&self, vars: &V, link: LinkId, horizon: &HorizonKey) -> Expression {
        let mut total = Expression::from(0.0);
        if let Some(h) = self.grid.horizon(horizon) {
            for tp in h.timepoints() {
                total += vars.link_flow(link, *tp) * self.grid.duration(*tp).value();
            }
        }
        total
    }

    /// Bounds for `link` over `horizon`; `None` when none are configured.
    pub fn bounds<V: WaterVariables>(
        &self,
        vars: &V,
        link: LinkId,
        horizon: &HorizonKey,
    ) -> Option<HorizonAggregateBounds> {
        let configured = self.inputs.horizon_bound(link, horizon)?;
        Some(self.bounds_for(vars, link, horizon, configured))
    }

    fn bounds_for<V: WaterVariables>(
        &self,
        vars: &V,
        link: LinkId,
        horizon: &HorizonKey,
        configured: &HorizonFlowBound,
    ) -> HorizonAggregateBounds {
        let total_hours = self.grid.horizon_hours(horizon);
        let upstream_average = self.upstream_average(link, horizon);
        let adjusted_max = configured
            .max
            .map(|max| adjusted_maximum(max, upstream_average, configured.inflow_threshold));
        let penalties = self
            .network
            .link(link)
            .map(|l| l.penalties)
            .unwrap_or_default();
        let link_name = self
            .network
            .link(link)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| format!("#{}", link.value()));
        let flow_hours = self.flow_hours(vars, link, horizon);

        let min = configured.min.map(|min| {
            ConstraintRow::greater_or_equal(
                format!("min_horizon_flow[{},{}]", link_name, horizon),
                flow_hours.clone(),
                Expression::from(min.over(total_hours)),
            )
            .with_violation(penalties.min_horizon_avg)
        });
        let max = adjusted_max.filter(|m| m.is_finite()).map(|max| {
            ConstraintRow::less_or_equal(
                format!("max_horizon_flow[{},{}]", link_name, horizon),
                flow_hours.clone(),
                Expression::from(max.over(total_hours)),
            )
            .with_violation(penalties.max_horizon_avg)
        });

        HorizonAggregateBounds {
            link,
            horizon: horizon.clone(),
            total_hours,
            upstream_average,
            adjusted_max,
            min,
            max,
        }
    }

    /// Bounds for every configured (link, horizon).
    pub fn all_bounds<V: WaterVariables>(&self, vars: &V) -> Vec<HorizonAggregateBounds> {
        let bounds: Vec<HorizonAggregateBounds> = self
            .inputs
            .horizon_bounds()
            .map(|(link, key, configured)| self.bounds_for(vars, link, key, configured))
            .collect();
        debug!(count = bounds.len(), "built horizon aggregate bounds");
        bounds
    }

    pub fn summary(&self, bounds: &HorizonAggregateBounds) -> AggregateSummary {
        let configured = self.inputs.horizon_bound(bounds.link, &bounds.horizon);
        AggregateSummary {
            link: self
                .network
                .link(bounds.link)
                .map(|l| l.name.clone())
                .unwrap_or_default(),
            horizon: bounds.horizon.to_string(),
            total_hours: bounds.total_hours.value(),
            min: configured.and_then(|c| c.min).map(FlowRate::value),
            max: configured.and_then(|c| c.max).map(FlowRate::value),
            adjusted_max: bounds.adjusted_max.map(FlowRate::value),
            upstream_average: bounds.upstream_average.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::FlowVariables;
    use cascade_core::{
        BoundaryType, FlowViolationPenalties, TimepointId, ViolationAllowance, WaterLink,
    };
    use good_lp::{variables, Variable};
    use std::collections::HashMap;

    #[test]
    fn test_adjusted_maximum() {
        let max = FlowRate(200.0);
        let threshold = Some(FlowRate(100.0));
        assert_eq!(adjusted_maximum(max, FlowRate(150.0), threshold), FlowRate(250.0));
        assert_eq!(adjusted_maximum(max, FlowRate(80.0), threshold), max);
        assert_eq!(adjusted_maximum(max, FlowRate(500.0), None), max);
    }

    fn setup() -> (TimeGrid, WaterNetwork, WaterInputs) {
        let grid = TimeGrid::builder()
            .timepoint(1, 6.0, 1.0)
            .timepoint(2, 18.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [1, 2])
            .build()
            .unwrap();
        let mut network = WaterNetwork::new();
        let creek = network.add_node("creek", None).unwrap();
        let dam = network.add_node("dam", None).unwrap();
        let town = network.add_node("town", None).unwrap();
        network.add_link(WaterLink::new("creek_in", creek, dam)).unwrap();
        network
            .add_link(WaterLink::new("release", dam, town).with_penalties(FlowViolationPenalties {
                max_horizon_avg: ViolationAllowance::penalized(10.0),
                ..Default::default()
            }))
            .unwrap();
        let mut inputs = WaterInputs::new();
        inputs.set_exogenous_inflow(creek, TimepointId::new(1), 300.0);
        inputs.set_exogenous_inflow(creek, TimepointId::new(2), 100.0);
        inputs.set_upstream_nodes(LinkId::new(1), vec![creek]);
        inputs.set_horizon_bound(
            LinkId::new(1),
            HorizonKey::new("day", 1),
            HorizonFlowBound {
                min: Some(FlowRate(10.0)),
                max: Some(FlowRate(120.0)),
                inflow_threshold: Some(FlowRate(100.0)),
            },
        );
        (grid, network, inputs)
    }

    #[test]
    fn test_upstream_average_is_duration_weighted() {
        let (grid, network, inputs) = setup();
        let limits = HorizonAggregateLimits::new(&grid, &network, &inputs);
        let key = HorizonKey::new("day", 1);
        // (300 * 6 + 100 * 18) / 24
        assert_eq!(limits.upstream_average(LinkId::new(1), &key), FlowRate(150.0));
        assert_eq!(limits.upstream_average(LinkId::new(0), &key), FlowRate::ZERO);
    }

    #[test]
    fn test_bounds_over_departures() {
        let (grid, network, inputs) = setup();
        let limits = HorizonAggregateLimits::new(&grid, &network, &inputs);
        let mut vars = variables!();
        let registry = FlowVariables::declare(&mut vars, &grid, &network);
        let key = HorizonKey::new("day", 1);
        let link = LinkId::new(1);

        let bounds = limits.bounds(&registry, link, &key).unwrap();
        assert_eq!(bounds.total_hours, Hours(24.0));
        assert_eq!(bounds.adjusted_max, Some(FlowRate(170.0)));
        let max_row = bounds.max.as_ref().unwrap();
        assert!(max_row.is_violatable());
        assert!(!bounds.min.as_ref().unwrap().is_violatable());

        // average 160 over the day fits under the relaxed 170
        let f1 = registry.link_flow_var(link, TimepointId::new(1)).unwrap();
        let f2 = registry.link_flow_var(link, TimepointId::new(2)).unwrap();
        let values: HashMap<Variable, f64> = [(f1, 100.0), (f2, 180.0)].into_iter().collect();
        let value_of = |v: Variable| values.get(&v).copied().unwrap_or(0.0);
        assert!(max_row.is_satisfied(value_of, 1e-6));
        assert!(bounds.min.as_ref().unwrap().is_satisfied(value_of, 1e-6));

        assert!(limits.bounds(&registry, LinkId::new(0), &key).is_none());
        assert_eq!(limits.all_bounds(&registry).len(), 1);
        let summary = limits.summary(&bounds);
        assert_eq!(summary.link, "release");
        assert_eq!(summary.horizon, "day/1");
    }
}
