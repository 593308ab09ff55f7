use crate::network::{NodeId, WaterNetwork};
use crate::units::Hours;
use petgraph::algo::{connected_components, tarjan_scc};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{BTreeSet, VecDeque};

/// Size summary used by `cascade inspect`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkStats {
    pub node_count: usize,
    pub reservoir_count: usize,
    pub link_count: usize,
    /// Weakly connected components (independent river systems)
    pub river_systems: usize,
    pub max_travel_time: Hours,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nodes ({} reservoirs), {} links, {} river system(s), longest travel time {}",
            self.node_count,
            self.reservoir_count,
            self.link_count,
            self.river_systems,
            self.max_travel_time
        )
    }
}

pub fn network_stats(network: &WaterNetwork) -> NetworkStats {
    NetworkStats {
        node_count: network.node_count(),
        reservoir_count: network.nodes().filter(|n| n.has_reservoir()).count(),
        link_count: network.link_count(),
        river_systems: connected_components(&network.graph),
        max_travel_time: network
            .links()
            .map(|l| l.travel_time)
            .fold(Hours::ZERO, Hours::max),
    }
}

/// Every node from which water can reach `node` (breadth-first over inbound links).
///
/// `node` itself is only included when it sits on a cycle.
pub fn upstream_nodes(network: &WaterNetwork, node: NodeId) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::new();
    if node.value() >= network.node_count() {
        return seen;
    }
    let mut queue = VecDeque::from([NodeIndex::new(node.value())]);
    while let Some(current) = queue.pop_front() {
        for parent in network
            .graph
            .neighbors_directed(current, Direction::Incoming)
        {
            if seen.insert(NodeId::new(parent.index())) {
                queue.push_back(parent);
            }
        }
    }
    seen
}

/// Groups of nodes that water can circulate through (strongly connected components
/// with more than one node, plus self-loops). Each group is sorted.
pub fn find_cycles(network: &WaterNetwork) -> Vec<Vec<NodeId>> {
    let mut cycles: Vec<Vec<NodeId>> = tarjan_scc(&network.graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .map(|idx| network.graph.contains_edge(*idx, *idx))
                    .unwrap_or(false)
        })
        .map(|component| {
            let mut ids: Vec<NodeId> = component
                .into_iter()
                .map(|idx| NodeId::new(idx.index()))
                .collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    cycles
}
