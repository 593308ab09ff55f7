//! End-to-end mass balance over a small cascade

use cascade_algo::test_utils::{chain_network, reservoir_chain, uniform_grid, ValueMap};
use cascade_algo::{
    evaluate, ConstraintSense, LinkedBoundaryPolicy, ModelOptions, RoutedTimepoint, RoutingOptions,
    WaterSystemModel,
};
use cascade_core::{
    BoundaryType, CascadeError, FlowRate, HorizonFlowBound, HorizonKey, LinkId, NodeId,
    TimepointId, WaterInputs,
};
use good_lp::{default_solver, variables, Expression, Solution, SolverModel};

fn tp(id: u32) -> TimepointId {
    TimepointId::new(id)
}

/// dam -(2h)-> gauge -(0h)-> sea over a circular day of four 2 h timepoints
fn cascade_model(boundary: BoundaryType, routing: RoutingOptions) -> Result<WaterSystemModel, CascadeError> {
    let grid = uniform_grid("day", boundary, 1, 4, 2.0);
    let network = reservoir_chain(&[2.0, 0.0], Some(1000.0));
    let mut inputs = WaterInputs::new();
    for id in 1..=4 {
        inputs.set_exogenous_inflow(NodeId::new(0), tp(id), 10.0);
        inputs.set_exogenous_inflow(NodeId::new(1), tp(id), 1.0);
    }
    let mut options = ModelOptions::new(routing);
    options.volume_per_flow_hour = 1.0;
    WaterSystemModel::build(grid, network, inputs, options)
}

#[test]
fn junction_balance_holds_for_routed_release() {
    let model = cascade_model(BoundaryType::Circular, RoutingOptions::new("day")).unwrap();
    let mut vars = variables!();
    let registry = model.declare_variables(&mut vars);
    let river = LinkId::new(0);
    let outlet = LinkId::new(1);

    // release 10, 20, 30, 40 arrives one timepoint later at the gauge
    let mut values = ValueMap::new();
    let releases = [10.0, 20.0, 30.0, 40.0];
    for (i, q) in releases.iter().enumerate() {
        let id = i as u32 + 1;
        values.set(registry.link_flow_var(river, tp(id)).unwrap(), *q);
        values.set(registry.release_var(NodeId::new(0), tp(id)).unwrap(), *q);
        let upstream = releases[(i + 3) % 4];
        values.set(registry.link_flow_var(outlet, tp(id)).unwrap(), upstream + 1.0);
    }

    let gauge = NodeId::new(1);
    for id in 1..=4 {
        let inflow = evaluate(&model.gross_inflow(&registry, gauge, tp(id)), values.value_of());
        let outflow = evaluate(&model.gross_outflow(&registry, gauge, tp(id)), values.value_of());
        assert!((inflow - outflow).abs() < 1e-9, "timepoint {}: {} != {}", id, inflow, outflow);
    }

    let constraints = model.constraints(&registry).unwrap();
    for row in &constraints.balance {
        assert!(row.is_satisfied(values.value_of(), 1e-9), "{} violated", row);
    }
}

#[test]
fn storage_continuity_tracks_net_inflow() {
    let model = cascade_model(BoundaryType::Linear, RoutingOptions::new("day")).unwrap();
    let mut vars = variables!();
    let registry = model.declare_variables(&mut vars);
    let dam = NodeId::new(0);

    // inflow 10, release 15 for 2 h each timepoint: storage drops by 10 per step
    let mut values = ValueMap::new();
    for id in 1..=4u32 {
        values.set(registry.release_var(dam, tp(id)).unwrap(), 15.0);
        values.set(
            registry.storage_var(dam, tp(id)).unwrap(),
            1000.0 - 10.0 * f64::from(id - 1),
        );
    }

    let constraints = model.constraints(&registry).unwrap();
    // initial pin plus three continuity rows on a linear day
    assert_eq!(constraints.storage.len(), 4);
    for row in &constraints.storage {
        assert_eq!(row.sense, ConstraintSense::Equal);
        assert!(row.is_satisfied(values.value_of(), 1e-9), "{} violated", row);
    }

    values.set(registry.storage_var(dam, tp(3)).unwrap(), 900.0);
    assert!(constraints
        .storage
        .iter()
        .any(|row| !row.is_satisfied(values.value_of(), 1e-9)));
}

#[test]
fn linked_day_respects_policy() {
    let fallback = cascade_model(BoundaryType::Linked, RoutingOptions::new("day")).unwrap();
    assert_eq!(
        fallback.arrival(LinkId::new(0), tp(4)),
        Some(RoutedTimepoint::OutsideHorizon)
    );
    assert_eq!(fallback.options().routing.linked_policy, LinkedBoundaryPolicy::Fallback);

    let strict = cascade_model(BoundaryType::Linked, RoutingOptions::new("day").strict());
    assert!(matches!(
        strict,
        Err(CascadeError::UnresolvedLinkedBoundary { .. })
    ));
}

#[test]
fn horizon_maximum_relaxes_with_upstream_inflow() {
    let grid = uniform_grid("day", BoundaryType::Circular, 1, 2, 12.0);
    let network = reservoir_chain(&[0.0], None);
    let key = HorizonKey::new("day", 1);
    let link = LinkId::new(0);

    let build = |upstream_inflow: f64| {
        let mut inputs = WaterInputs::new();
        for id in 1..=2 {
            inputs.set_exogenous_inflow(NodeId::new(0), tp(id), upstream_inflow);
        }
        inputs.set_upstream_nodes(link, vec![NodeId::new(0)]);
        inputs.set_horizon_bound(
            link,
            key.clone(),
            HorizonFlowBound {
                min: None,
                max: Some(FlowRate(120.0)),
                inflow_threshold: Some(FlowRate(100.0)),
            },
        );
        WaterSystemModel::build(
            grid.clone(),
            network.clone(),
            inputs,
            ModelOptions::new(RoutingOptions::new("day")),
        )
        .unwrap()
    };

    let wet = build(150.0);
    let mut vars = variables!();
    let registry = wet.declare_variables(&mut vars);
    let bounds = wet.aggregate_limits().bounds(&registry, link, &key).unwrap();
    assert_eq!(bounds.adjusted_max, Some(FlowRate(170.0)));
    let (_, max) = wet.horizon_aggregate_bounds(&registry, link, "day", 1);
    assert_eq!(evaluate(&max.unwrap().rhs, |_| 0.0), 170.0 * 24.0);

    let dry = build(80.0);
    let mut vars = variables!();
    let registry = dry.declare_variables(&mut vars);
    let bounds = dry.aggregate_limits().bounds(&registry, link, &key).unwrap();
    assert_eq!(bounds.adjusted_max, Some(FlowRate(120.0)));
}

#[test]
fn default_solver_meets_junction_balance() {
    // n0 -(0h)-> n1 -(0h)-> n2: n0 and n1 pass their inflow straight on
    let grid = uniform_grid("day", BoundaryType::Circular, 1, 3, 4.0);
    let network = chain_network(&[0.0, 0.0]);
    let mut inputs = WaterInputs::new();
    for (id, flow) in [(1, 10.0), (2, 20.0), (3, 5.0)] {
        inputs.set_exogenous_inflow(NodeId::new(0), tp(id), flow);
    }
    inputs.set_exogenous_inflow(NodeId::new(1), tp(2), 1.0);
    let model = WaterSystemModel::build(
        grid,
        network,
        inputs,
        ModelOptions::new(RoutingOptions::new("day")),
    )
    .unwrap();

    let mut vars = variables!();
    let registry = model.declare_variables(&mut vars);
    let constraints = model.constraints(&registry).unwrap();
    let mut total = Expression::from(0.0);
    for link in [LinkId::new(0), LinkId::new(1)] {
        for id in 1..=3 {
            total += registry.link_flow_var(link, tp(id)).unwrap();
        }
    }
    let mut problem = vars.minimise(total).using(default_solver);
    for row in constraints.rows() {
        problem = problem.with(row.to_constraint());
    }
    let solution = problem.solve().unwrap();

    let lower = registry.link_flow_var(LinkId::new(1), tp(2)).unwrap();
    assert!((solution.value(lower) - 21.0).abs() < 1e-6);
    let upper = registry.link_flow_var(LinkId::new(0), tp(3)).unwrap();
    assert!((solution.value(upper) - 5.0).abs() < 1e-6);
}
