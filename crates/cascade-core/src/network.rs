//! Water node/link network.
//!
//! The cascade is a directed graph: nodes are junctions or reservoirs, edges are
//! conveyance links (rivers, canals, penstocks) with a travel time. Link direction is
//! the direction water moves.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::diagnostics::Diagnostics;
use crate::error::{CascadeError, CascadeResult};
use crate::graph_utils;
use crate::units::{FlowRate, Hours, Volume};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(usize);

impl NodeId {
    #[inline]
    pub fn new(value: usize) -> Self {
        NodeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LinkId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LinkId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Storage attached to a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reservoir {
    /// Volume at the start of the first timepoint of a linear horizon, when known
    pub initial_storage: Option<Volume>,
}

#[derive(Debug, Clone)]
pub struct WaterNode {
    pub id: NodeId,
    pub name: String,
    pub reservoir: Option<Reservoir>,
}

impl WaterNode {
    pub fn has_reservoir(&self) -> bool {
        self.reservoir.is_some()
    }
}

/// Whether a flow bound may be violated and at what per-unit cost.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViolationAllowance {
    #[serde(default)]
    pub allowed: bool,
    #[serde(default)]
    pub penalty: f64,
}

impl ViolationAllowance {
    pub fn hard() -> Self {
        Self::default()
    }

    pub fn penalized(penalty: f64) -> Self {
        Self {
            allowed: true,
            penalty,
        }
    }
}

/// Violation settings for the four flow-bound families of a link.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowViolationPenalties {
    #[serde(default)]
    pub min_flow: ViolationAllowance,
    #[serde(default)]
    pub max_flow: ViolationAllowance,
    #[serde(default)]
    pub min_horizon_avg: ViolationAllowance,
    #[serde(default)]
    pub max_horizon_avg: ViolationAllowance,
}

#[derive(Debug, Clone)]
pub struct WaterLink {
    pub id: LinkId,
    pub name: String,
    pub from: NodeId,
    pub to: NodeId,
    /// Hours for water leaving `from` to reach `to`
    pub travel_time: Hours,
    /// Default minimum flow in every timepoint
    pub min_flow: FlowRate,
    /// Default maximum flow in every timepoint
    pub max_flow: FlowRate,
    pub penalties: FlowViolationPenalties,
}

impl WaterLink {
    /// New link with zero travel time and no flow limits.
    pub fn new(name: impl Into<String>, from: NodeId, to: NodeId) -> Self {
        Self {
            id: LinkId(0),
            name: name.into(),
            from,
            to,
            travel_time: Hours::ZERO,
            min_flow: FlowRate::ZERO,
            max_flow: FlowRate::UNBOUNDED,
            penalties: FlowViolationPenalties::default(),
        }
    }

    pub fn with_travel_time(mut self, hours: f64) -> Self {
        self.travel_time = Hours(hours);
        self
    }

    pub fn with_flow_limits(mut self, min_flow: f64, max_flow: f64) -> Self {
        self.min_flow = FlowRate(min_flow);
        self.max_flow = FlowRate(max_flow);
        self
    }

    pub fn with_penalties(mut self, penalties: FlowViolationPenalties) -> Self {
        self.penalties = penalties;
        self
    }
}

/// The cascade graph. Node and link ids are their graph indices.
#[derive(Debug, Clone, Default)]
pub struct WaterNetwork {
    pub graph: DiGraph<WaterNode, WaterLink>,
    node_names: HashMap<String, NodeId>,
    link_names: HashMap<String, LinkId>,
}

impl WaterNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        reservoir: Option<Reservoir>,
    ) -> CascadeResult<NodeId> {
        let name = name.into();
        if self.node_names.contains_key(&name) {
            return Err(CascadeError::Duplicate { kind: "water node", name });
        }
        let id = NodeId(self.graph.node_count());
        self.graph.add_node(WaterNode {
            id,
            name: name.clone(),
            reservoir,
        });
        self.node_names.insert(name, id);
        Ok(id)
    }

    pub fn add_link(&mut self, mut link: WaterLink) -> CascadeResult<LinkId> {
        if self.link_names.contains_key(&link.name) {
            return Err(CascadeError::Duplicate {
                kind: "water link",
                name: link.name,
            });
        }
        if !(link.travel_time.value() >= 0.0) || !link.travel_time.is_finite() {
            return Err(CascadeError::NegativeTravelTime {
                link: link.name,
                hours: link.travel_time.value(),
            });
        }
        for endpoint in [link.from, link.to] {
            if endpoint.0 >= self.graph.node_count() {
                return Err(CascadeError::UnknownReference {
                    kind: "water node",
                    name: format!("#{} (link '{}')", endpoint.0, link.name),
                });
            }
        }
        if link.min_flow > link.max_flow {
            return Err(CascadeError::Config(format!(
                "link '{}' minimum flow {} exceeds maximum flow {}",
                link.name, link.min_flow, link.max_flow
            )));
        }
        let id = LinkId(self.graph.edge_count());
        link.id = id;
        let name = link.name.clone();
        self.graph
            .add_edge(NodeIndex::new(link.from.0), NodeIndex::new(link.to.0), link);
        self.link_names.insert(name, id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&WaterNode> {
        self.graph.node_weight(NodeIndex::new(id.0))
    }

    pub fn link(&self, id: LinkId) -> Option<&WaterLink> {
        self.graph.edge_weight(EdgeIndex::new(id.0))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    pub fn link_id(&self, name: &str) -> Option<LinkId> {
        self.link_names.get(name).copied()
    }

    /// Look up a node by name, failing with a configuration error.
    pub fn require_node(&self, name: &str) -> CascadeResult<NodeId> {
        self.node_id(name).ok_or_else(|| CascadeError::UnknownReference {
            kind: "water node",
            name: name.to_string(),
        })
    }

    /// Look up a link by name, failing with a configuration error.
    pub fn require_link(&self, name: &str) -> CascadeResult<LinkId> {
        self.link_id(name).ok_or_else(|| CascadeError::UnknownReference {
            kind: "water link",
            name: name.to_string(),
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &WaterNode> + '_ {
        self.graph.node_weights()
    }

    pub fn links(&self) -> impl Iterator<Item = &WaterLink> + '_ {
        self.graph.edge_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Links whose destination is `node` (water arriving).
    pub fn links_to(&self, node: NodeId) -> Vec<LinkId> {
        self.adjacent(node, Direction::Incoming)
    }

    /// Links whose source is `node` (water leaving).
    pub fn links_from(&self, node: NodeId) -> Vec<LinkId> {
        self.adjacent(node, Direction::Outgoing)
    }

    fn adjacent(&self, node: NodeId, direction: Direction) -> Vec<LinkId> {
        if node.0 >= self.graph.node_count() {
            return Vec::new();
        }
        let mut links: Vec<LinkId> = self
            .graph
            .edges_directed(NodeIndex::new(node.0), direction)
            .map(|edge| edge.weight().id)
            .collect();
        links.sort();
        links
    }

    /// Validate topology, recording findings in `diag`.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.graph.node_count() == 0 {
            diag.add_error("structure", "Water network has no nodes");
            return;
        }
        if self.graph.edge_count() == 0 {
            diag.add_warning("structure", "Water network has no links");
        }

        for node in self.nodes() {
            let inbound = self.links_to(node.id).len();
            let outbound = self.links_from(node.id).len();
            if inbound == 0 && outbound == 0 {
                diag.add_warning_with_entity("topology", "Node is not connected to any link", &node.name);
            }
            if node.has_reservoir() && outbound == 0 {
                diag.add_warning_with_entity(
                    "topology",
                    "Reservoir has no outgoing link; releases leave the system",
                    &node.name,
                );
            }
        }

        for link in self.links() {
            if link.from == link.to {
                diag.add_error_with_entity("topology", "Link starts and ends at the same node", &link.name);
            }
        }

        for cycle in graph_utils::find_cycles(self) {
            let names: Vec<&str> = cycle
                .iter()
                .filter_map(|id| self.node(*id).map(|n| n.name.as_str()))
                .collect();
            diag.add_warning(
                "topology",
                &format!("Water circulates through a cycle: {}", names.join(" -> ")),
            );
        }
    }
}
