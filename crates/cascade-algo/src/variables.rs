//! Decision variables the water constraints are written over.
//!
//! The constraint builders only need to ask "what is the flow on this link in this
//! timepoint" as a linear expression, which is what [`WaterVariables`] captures. A
//! consuming model that already owns its variables implements the trait itself;
//! [`FlowVariables`] is the stock registry that declares them on a good_lp
//! [`ProblemVariables`].

use good_lp::{variable, Expression, ProblemVariables, Variable};
use std::collections::HashMap;

use cascade_core::{LinkId, NodeId, TimeGrid, TimepointId, WaterNetwork};

use crate::expression::ConstraintRow;

/// Linear expressions for the per-timepoint water quantities.
///
/// Unknown (link, timepoint) or (node, timepoint) pairs yield the zero expression.
pub trait WaterVariables {
    /// Average flow rate on `link` during `timepoint`, indexed by departure.
    fn link_flow(&self, link: LinkId, timepoint: TimepointId) -> Expression;

    /// Controlled release from the reservoir at `node`.
    fn reservoir_release(&self, node: NodeId, timepoint: TimepointId) -> Expression;

    /// Uncontrolled spill from the reservoir at `node`.
    fn reservoir_spill(&self, node: NodeId, timepoint: TimepointId) -> Expression;

    /// Stored volume at the start of `timepoint`.
    fn reservoir_storage(&self, node: NodeId, timepoint: TimepointId) -> Expression;
}

/// Non-negative slack attached to a violatable constraint row.
#[derive(Debug, Clone)]
pub struct ViolationVariable {
    pub constraint: String,
    pub variable: Variable,
    pub penalty: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FlowVariables {
    link_flow: HashMap<(LinkId, TimepointId), Variable>,
    release: HashMap<(NodeId, TimepointId), Variable>,
    spill: HashMap<(NodeId, TimepointId), Variable>,
    storage: HashMap<(NodeId, TimepointId), Variable>,
    violations: Vec<ViolationVariable>,
}

fn lookup<K: std::hash::Hash + Eq>(map: &HashMap<K, Variable>, key: &K) -> Expression {
    map.get(key)
        .map(|v| Expression::from(*v))
        .unwrap_or_else(|| Expression::from(0.0))
}

impl FlowVariables {
    /// Declare flow variables for every link and release, spill and storage variables for
    /// every reservoir node, in every timepoint of `grid`.
    pub fn declare(vars: &mut ProblemVariables, grid: &TimeGrid, network: &WaterNetwork) -> Self {
        let mut registry = FlowVariables::default();
        for tp in grid.timepoint_ids() {
            for link in network.links() {
                registry
                    .link_flow
                    .insert((link.id, tp), vars.add(variable().min(0.0)));
            }
            for node in network.nodes().filter(|n| n.has_reservoir()) {
                registry
                    .release
                    .insert((node.id, tp), vars.add(variable().min(0.0)));
                registry
                    .spill
                    .insert((node.id, tp), vars.add(variable().min(0.0)));
                registry
                    .storage
                    .insert((node.id, tp), vars.add(variable().min(0.0)));
            }
        }
        registry
    }

    pub fn link_flow_var(&self, link: LinkId, timepoint: TimepointId) -> Option<Variable> {
        self.link_flow.get(&(link, timepoint)).copied()
    }

    pub fn release_var(&self, node: NodeId, timepoint: TimepointId) -> Option<Variable> {
        self.release.get(&(node, timepoint)).copied()
    }

    pub fn spill_var(&self, node: NodeId, timepoint: TimepointId) -> Option<Variable> {
        self.spill.get(&(node, timepoint)).copied()
    }

    pub fn storage_var(&self, node: NodeId, timepoint: TimepointId) -> Option<Variable> {
        self.storage.get(&(node, timepoint)).copied()
    }

    /// Declare a slack for `row` if it may be violated.
    pub fn add_violation(&mut self, vars: &mut ProblemVariables, row: &ConstraintRow) -> Option<Variable> {
        if !row.is_violatable() {
            return None;
        }
        let slack = vars.add(variable().min(0.0));
        self.violations.push(ViolationVariable {
            constraint: row.name.clone(),
            variable: slack,
            penalty: row.violation.penalty,
        });
        Some(slack)
    }

    pub fn violations(&self) -> &[ViolationVariable] {
        &self.violations
    }

    /// Sum of penalty times slack over every declared violation variable.
    pub fn violation_penalty(&self) -> Expression {
        let mut total = Expression::from(0.0);
        for v in &self.violations {
            total += v.penalty * v.variable;
        }
        total
    }

    /// Number of declared variables, violation slacks included.
    pub fn len(&self) -> usize {
        self.link_flow.len()
            + self.release.len()
            + self.spill.len()
            + self.storage.len()
            + self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WaterVariables for FlowVariables {
    fn link_flow(&self, link: LinkId, timepoint: TimepointId) -> Expression {
        lookup(&self.link_flow, &(link, timepoint))
    }

    fn reservoir_release(&self, node: NodeId, timepoint: TimepointId) -> Expression {
        lookup(&self.release, &(node, timepoint))
    }

    fn reservoir_spill(&self, node: NodeId, timepoint: TimepointId) -> Expression {
        lookup(&self.spill, &(node, timepoint))
    }

    fn reservoir_storage(&self, node: NodeId, timepoint: TimepointId) -> Expression {
        lookup(&self.storage, &(node, timepoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::evaluate;
    use cascade_core::{BoundaryType, Reservoir, ViolationAllowance, WaterLink};
    use good_lp::variables;

    fn setup() -> (TimeGrid, WaterNetwork) {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [1, 2])
            .build()
            .unwrap();
        let mut network = WaterNetwork::new();
        let dam = network.add_node("dam", Some(Reservoir::default())).unwrap();
        let town = network.add_node("town", None).unwrap();
        network.add_link(WaterLink::new("river", dam, town)).unwrap();
        (grid, network)
    }

    #[test]
    fn test_declares_expected_counts() {
        let (grid, network) = setup();
        let mut vars = variables!();
        let registry = FlowVariables::declare(&mut vars, &grid, &network);
        // 1 link x 2 timepoints + 3 reservoir quantities x 2 timepoints
        assert_eq!(registry.len(), 8);
        let tp = TimepointId::new(1);
        assert!(registry.link_flow_var(LinkId::new(0), tp).is_some());
        assert!(registry.release_var(NodeId::new(0), tp).is_some());
        assert!(registry.storage_var(NodeId::new(1), tp).is_none());
    }

    #[test]
    fn test_unknown_entries_are_zero() {
        let (grid, network) = setup();
        let mut vars = variables!();
        let registry = FlowVariables::declare(&mut vars, &grid, &network);
        let expr = registry.reservoir_spill(NodeId::new(1), TimepointId::new(1));
        assert_eq!(evaluate(&expr, |_| 100.0), 0.0);
        let flow = registry.link_flow(LinkId::new(0), TimepointId::new(2));
        assert_eq!(evaluate(&flow, |_| 7.0), 7.0);
    }

    #[test]
    fn test_violation_slack_only_for_soft_rows() {
        let (grid, network) = setup();
        let mut vars = variables!();
        let mut registry = FlowVariables::declare(&mut vars, &grid, &network);
        let hard = ConstraintRow::less_or_equal("hard", Expression::from(0.0), Expression::from(1.0));
        assert!(registry.add_violation(&mut vars, &hard).is_none());
        let soft = hard.clone().with_violation(ViolationAllowance::penalized(25.0));
        let slack = registry.add_violation(&mut vars, &soft).unwrap();
        assert_eq!(registry.violations().len(), 1);
        let penalty = evaluate(&registry.violation_penalty(), |v| if v == slack { 2.0 } else { 0.0 });
        assert_eq!(penalty, 50.0);
    }
}
