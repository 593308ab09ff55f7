//! Instantaneous minimum and maximum flow on each link.
//!
//! Per-timepoint overrides in [`WaterInputs`] take precedence over the link defaults. A
//! minimum of zero and an unbounded maximum produce no row.

use tracing::debug;

use cascade_core::{
    FlowRate, LinkId, TimeGrid, TimepointId, ViolationAllowance, WaterInputs, WaterNetwork,
};
use good_lp::Expression;

use crate::expression::ConstraintRow;
use crate::variables::WaterVariables;

/// Resolved limits for one (link, timepoint).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowLimits {
    pub min: FlowRate,
    pub max: FlowRate,
    pub min_violation: ViolationAllowance,
    pub max_violation: ViolationAllowance,
}

/// Limits of `link` in `timepoint`; `None` for an unknown link.
pub fn flow_limits(
    network: &WaterNetwork,
    inputs: &WaterInputs,
    link: LinkId,
    timepoint: TimepointId,
) -> Option<FlowLimits> {
    let water_link = network.link(link)?;
    let overrides = inputs.flow_override(link, timepoint);
    Some(FlowLimits {
        min: overrides.min.unwrap_or(water_link.min_flow),
        max: overrides.max.unwrap_or(water_link.max_flow),
        min_violation: water_link.penalties.min_flow,
        max_violation: water_link.penalties.max_flow,
    })
}

/// Minimum and maximum flow rows for every link and timepoint.
pub fn flow_bound_constraints<V: WaterVariables>(
    grid: &TimeGrid,
    network: &WaterNetwork,
    inputs: &WaterInputs,
    vars: &V,
) -> Vec<ConstraintRow> {
    let mut rows = Vec::new();
    for link in network.links() {
        for tp in grid.timepoint_ids() {
            let Some(limits) = flow_limits(network, inputs, link.id, tp) else {
                continue;
            };
            let flow = vars.link_flow(link.id, tp);
            if limits.min > FlowRate::ZERO {
                rows.push(
                    ConstraintRow::greater_or_equal(
                        format!("min_flow[{},{}]", link.name, tp.value()),
                        flow.clone(),
                        Expression::from(limits.min.value()),
                    )
                    .with_violation(limits.min_violation),
                );
            }
            if limits.max.is_finite() {
                rows.push(
                    ConstraintRow::less_or_equal(
                        format!("max_flow[{},{}]", link.name, tp.value()),
                        flow,
                        Expression::from(limits.max.value()),
                    )
                    .with_violation(limits.max_violation),
                );
            }
        }
    }
    debug!(rows = rows.len(), "built instantaneous flow bounds");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::FlowVariables;
    use cascade_core::{BoundaryType, FlowBoundOverride, FlowViolationPenalties, WaterLink};
    use good_lp::variables;

    fn setup() -> (TimeGrid, WaterNetwork) {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1, 2])
            .build()
            .unwrap();
        let mut network = WaterNetwork::new();
        let a = network.add_node("a", None).unwrap();
        let b = network.add_node("b", None).unwrap();
        network
            .add_link(
                WaterLink::new("penstock", a, b)
                    .with_flow_limits(2.0, 50.0)
                    .with_penalties(FlowViolationPenalties {
                        min_flow: ViolationAllowance::penalized(1000.0),
                        ..Default::default()
                    }),
            )
            .unwrap();
        network.add_link(WaterLink::new("canal", a, b)).unwrap();
        (grid, network)
    }

    #[test]
    fn test_override_takes_precedence() {
        let (_, network) = setup();
        let mut inputs = WaterInputs::new();
        let link = LinkId::new(0);
        inputs.set_flow_override(
            link,
            TimepointId::new(2),
            FlowBoundOverride {
                min: None,
                max: Some(FlowRate(20.0)),
            },
        );
        let limits = flow_limits(&network, &inputs, link, TimepointId::new(2)).unwrap();
        assert_eq!(limits.min, FlowRate(2.0));
        assert_eq!(limits.max, FlowRate(20.0));
        assert!(limits.min_violation.allowed);
        assert!(!limits.max_violation.allowed);
        assert!(flow_limits(&network, &inputs, LinkId::new(7), TimepointId::new(1)).is_none());
    }

    #[test]
    fn test_unbounded_link_has_no_rows() {
        let (grid, network) = setup();
        let inputs = WaterInputs::new();
        let mut vars = variables!();
        let registry = FlowVariables::declare(&mut vars, &grid, &network);
        let rows = flow_bound_constraints(&grid, &network, &inputs, &registry);
        // penstock: min and max in both timepoints; canal: none
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.name.contains("penstock")));
        assert!(rows[0].is_violatable());
        assert!(!rows[1].is_violatable());
    }
}
