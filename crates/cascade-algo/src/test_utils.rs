//! Fixtures shared by unit and integration tests.

use good_lp::Variable;
use std::collections::HashMap;

use cascade_core::{BoundaryType, Reservoir, TimeGrid, Volume, WaterLink, WaterNetwork};

/// `horizons` consecutive horizons of `per_horizon` timepoints each, all lasting `hours`.
///
/// Timepoints are numbered from 1 in order.
pub fn uniform_grid(
    balancing_type: &str,
    boundary: BoundaryType,
    horizons: u32,
    per_horizon: u32,
    hours: f64,
) -> TimeGrid {
    let mut builder = TimeGrid::builder();
    let mut next_id = 1;
    for horizon in 1..=horizons {
        let ids: Vec<u32> = (next_id..next_id + per_horizon).collect();
        for id in &ids {
            builder.add_timepoint(*id, hours, 1.0);
        }
        builder.add_horizon(balancing_type, horizon, boundary, ids);
        next_id += per_horizon;
    }
    builder
        .build()
        .unwrap_or_else(|e| panic!("invalid fixture grid: {}", e))
}

/// Grid with one horizon whose timepoints have the given durations.
pub fn grid_with_durations(balancing_type: &str, boundary: BoundaryType, durations: &[f64]) -> TimeGrid {
    let mut builder = TimeGrid::builder();
    let ids: Vec<u32> = (1..=durations.len() as u32).collect();
    for (id, hours) in ids.iter().zip(durations) {
        builder.add_timepoint(*id, *hours, 1.0);
    }
    builder.add_horizon(balancing_type, 1, boundary, ids);
    builder
        .build()
        .unwrap_or_else(|e| panic!("invalid fixture grid: {}", e))
}

/// Straight river `n0 -> n1 -> ... -> nk`, one link per travel time.
pub fn chain_network(travel_times: &[f64]) -> WaterNetwork {
    build_chain(travel_times, None)
}

/// Like [`chain_network`], with a reservoir at the head node.
pub fn reservoir_chain(travel_times: &[f64], initial_storage: Option<f64>) -> WaterNetwork {
    build_chain(
        travel_times,
        Some(Reservoir {
            initial_storage: initial_storage.map(Volume),
        }),
    )
}

fn build_chain(travel_times: &[f64], head: Option<Reservoir>) -> WaterNetwork {
    let mut network = WaterNetwork::new();
    let mut previous = network
        .add_node("n0", head)
        .unwrap_or_else(|e| panic!("fixture node: {}", e));
    for (i, hours) in travel_times.iter().enumerate() {
        let node = network
            .add_node(format!("n{}", i + 1), None)
            .unwrap_or_else(|e| panic!("fixture node: {}", e));
        network
            .add_link(WaterLink::new(format!("l{}", i), previous, node).with_travel_time(*hours))
            .unwrap_or_else(|e| panic!("fixture link: {}", e));
        previous = node;
    }
    network
}

/// Variable assignment for evaluating expressions and rows.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    values: HashMap<Variable, f64>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, var: Variable, value: f64) -> &mut Self {
        self.values.insert(var, value);
        self
    }

    pub fn get(&self, var: Variable) -> f64 {
        self.values.get(&var).copied().unwrap_or(0.0)
    }

    /// Closure form accepted by `evaluate` and the row checks.
    pub fn value_of(&self) -> impl Fn(Variable) -> f64 + Copy + '_ {
        move |var| self.get(var)
    }
}
