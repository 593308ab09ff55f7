//! Time-indexed parameters attached to the water network.
//!
//! [`WaterInputs`] gathers everything the routing and balance layers read besides the
//! grid and the graph: exogenous inflows, per-timepoint flow bound overrides,
//! horizon-average bounds, the upstream-node mapping used by the maximum-flow
//! adjustment, and ramp limits. Every lookup falls back to a declared default (zero
//! inflow, the link's own limits, no bound) rather than failing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{CascadeError, CascadeResult};
use crate::horizon::HorizonResolver;
use crate::network::{LinkId, NodeId, WaterNetwork};
use crate::time_grid::{HorizonKey, TimeGrid, TimepointId};
use crate::units::{FlowRate, Hours};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RampDirection {
    Up,
    Down,
}

impl RampDirection {
    /// +1 for up, -1 for down.
    pub fn sign(self) -> f64 {
        match self {
            RampDirection::Up => 1.0,
            RampDirection::Down => -1.0,
        }
    }
}

/// Limit on how much a link's flow may change within a window of hours.
#[derive(Debug, Clone, PartialEq)]
pub struct RampLimit {
    pub link: LinkId,
    pub name: String,
    pub direction: RampDirection,
    pub window: Hours,
    /// Allowed change per horizon; projected onto timepoints by taking the minimum.
    pub allowed_delta: BTreeMap<HorizonKey, FlowRate>,
}

impl RampLimit {
    pub fn new(link: LinkId, name: impl Into<String>, direction: RampDirection, window: f64) -> Self {
        Self {
            link,
            name: name.into(),
            direction,
            window: Hours(window),
            allowed_delta: BTreeMap::new(),
        }
    }

    pub fn with_delta(mut self, key: HorizonKey, delta: f64) -> Self {
        self.allowed_delta.insert(key, FlowRate(delta));
        self
    }

    /// Most binding allowed change over every horizon that covers `timepoint`;
    /// `None` when no covering horizon configures one.
    pub fn allowed_delta_at(&self, resolver: &HorizonResolver, timepoint: TimepointId) -> Option<FlowRate> {
        resolver
            .horizons_covering(timepoint)
            .filter_map(|key| self.allowed_delta.get(key).copied())
            .reduce(FlowRate::min)
    }
}

/// Horizon-average bounds on a link's flow.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HorizonFlowBound {
    #[serde(default)]
    pub min: Option<FlowRate>,
    #[serde(default)]
    pub max: Option<FlowRate>,
    /// Upstream inflow average above which the maximum is relaxed
    #[serde(default)]
    pub inflow_threshold: Option<FlowRate>,
}

/// Per-timepoint override of a link's instantaneous limits.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowBoundOverride {
    pub min: Option<FlowRate>,
    pub max: Option<FlowRate>,
}

#[derive(Debug, Clone, Default)]
pub struct WaterInputs {
    exogenous_inflow: HashMap<(NodeId, TimepointId), FlowRate>,
    flow_overrides: HashMap<(LinkId, TimepointId), FlowBoundOverride>,
    horizon_bounds: BTreeMap<(LinkId, HorizonKey), HorizonFlowBound>,
    upstream: HashMap<LinkId, Vec<NodeId>>,
    ramp_limits: Vec<RampLimit>,
}

impl WaterInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exogenous_inflow(&mut self, node: NodeId, timepoint: TimepointId, rate: f64) {
        self.exogenous_inflow.insert((node, timepoint), FlowRate(rate));
    }

    /// Exogenous inflow rate; zero when not configured.
    pub fn exogenous_inflow(&self, node: NodeId, timepoint: TimepointId) -> FlowRate {
        self.exogenous_inflow
            .get(&(node, timepoint))
            .copied()
            .unwrap_or(FlowRate::ZERO)
    }

    pub fn set_flow_override(&mut self, link: LinkId, timepoint: TimepointId, bounds: FlowBoundOverride) {
        self.flow_overrides.insert((link, timepoint), bounds);
    }

    pub fn flow_override(&self, link: LinkId, timepoint: TimepointId) -> FlowBoundOverride {
        self.flow_overrides
            .get(&(link, timepoint))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_horizon_bound(&mut self, link: LinkId, key: HorizonKey, bound: HorizonFlowBound) {
        self.horizon_bounds.insert((link, key), bound);
    }

    pub fn horizon_bound(&self, link: LinkId, key: &HorizonKey) -> Option<&HorizonFlowBound> {
        self.horizon_bounds.get(&(link, key.clone()))
    }

    /// Every configured (link, horizon) bound, ordered by link then horizon.
    pub fn horizon_bounds(&self) -> impl Iterator<Item = (LinkId, &HorizonKey, &HorizonFlowBound)> {
        self.horizon_bounds
            .iter()
            .map(|((link, key), bound)| (*link, key, bound))
    }

    pub fn set_upstream_nodes(&mut self, link: LinkId, nodes: Vec<NodeId>) {
        self.upstream.insert(link, nodes);
    }

    /// Nodes whose exogenous inflow feeds the maximum-flow adjustment of `link`.
    pub fn upstream_nodes(&self, link: LinkId) -> &[NodeId] {
        self.upstream.get(&link).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_ramp_limit(&mut self, limit: RampLimit) {
        self.ramp_limits.push(limit);
    }

    pub fn ramp_limits(&self) -> &[RampLimit] {
        &self.ramp_limits
    }

    pub fn ramp_limit(&self, link: LinkId, name: &str) -> Option<&RampLimit> {
        self.ramp_limits
            .iter()
            .find(|limit| limit.link == link && limit.name == name)
    }

    /// Check every reference against the grid and network.
    pub fn validate(&self, grid: &TimeGrid, network: &WaterNetwork) -> CascadeResult<()> {
        let unknown_node = |node: NodeId| CascadeError::UnknownReference {
            kind: "water node",
            name: format!("#{}", node.value()),
        };
        let unknown_link = |link: LinkId| CascadeError::UnknownReference {
            kind: "water link",
            name: format!("#{}", link.value()),
        };
        let unknown_timepoint = |tp: TimepointId| CascadeError::UnknownReference {
            kind: "timepoint",
            name: tp.value().to_string(),
        };

        for (node, tp) in self.exogenous_inflow.keys() {
            network.node(*node).ok_or_else(|| unknown_node(*node))?;
            if !grid.contains(*tp) {
                return Err(unknown_timepoint(*tp));
            }
        }
        for (link, tp) in self.flow_overrides.keys() {
            network.link(*link).ok_or_else(|| unknown_link(*link))?;
            if !grid.contains(*tp) {
                return Err(unknown_timepoint(*tp));
            }
        }
        for ((link, key), bound) in &self.horizon_bounds {
            network.link(*link).ok_or_else(|| unknown_link(*link))?;
            if grid.horizon(key).is_none() {
                return Err(CascadeError::UnknownReference {
                    kind: "horizon",
                    name: key.to_string(),
                });
            }
            if let (Some(min), Some(max)) = (bound.min, bound.max) {
                if min > max {
                    return Err(CascadeError::Config(format!(
                        "horizon {} bound on link #{}: minimum {} exceeds maximum {}",
                        key,
                        link.value(),
                        min,
                        max
                    )));
                }
            }
        }
        for (link, nodes) in &self.upstream {
            network.link(*link).ok_or_else(|| unknown_link(*link))?;
            for node in nodes {
                network.node(*node).ok_or_else(|| unknown_node(*node))?;
            }
        }
        for (idx, limit) in self.ramp_limits.iter().enumerate() {
            network.link(limit.link).ok_or_else(|| unknown_link(limit.link))?;
            if !(limit.window.value() >= 0.0) || !limit.window.is_finite() {
                return Err(CascadeError::Config(format!(
                    "ramp limit '{}' has invalid window {}",
                    limit.name, limit.window
                )));
            }
            if self.ramp_limits[..idx]
                .iter()
                .any(|other| other.link == limit.link && other.name == limit.name)
            {
                return Err(CascadeError::Duplicate {
                    kind: "ramp limit",
                    name: limit.name.clone(),
                });
            }
            for key in limit.allowed_delta.keys() {
                if grid.horizon(key).is_none() {
                    return Err(CascadeError::UnknownReference {
                        kind: "horizon",
                        name: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
