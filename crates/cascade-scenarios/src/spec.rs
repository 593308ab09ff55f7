use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use cascade_algo::LinkedBoundaryPolicy;
use cascade_core::{BoundaryType, FlowViolationPenalties, RampDirection};

/// A complete water system description: time grid, network and time-varying inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSpec {
    pub version: Option<u32>,
    pub description: Option<String>,
    pub routing: RoutingSpec,
    pub timepoints: Vec<TimepointSpec>,
    pub horizons: Vec<HorizonSpec>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub inflows: Vec<InflowSpec>,
    #[serde(default)]
    pub flow_overrides: Vec<FlowOverrideSpec>,
    #[serde(default)]
    pub horizon_bounds: Vec<HorizonBoundSpec>,
    #[serde(default)]
    pub ramp_limits: Vec<RampLimitSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSpec {
    pub balancing_type: String,
    #[serde(default)]
    pub linked_policy: LinkedBoundaryPolicy,
    #[serde(default = "default_volume_per_flow_hour")]
    pub volume_per_flow_hour: f64,
    /// Scale routed inflow by departure over arrival duration
    #[serde(default)]
    pub volume_weighted_inflow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimepointSpec {
    pub id: u32,
    pub hours: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonSpec {
    pub balancing_type: String,
    pub horizon: u32,
    /// `linear`, `circular` or `linked`
    #[serde(default = "default_boundary")]
    pub boundary: String,
    pub timepoints: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub reservoir: bool,
    pub initial_storage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub travel_time: f64,
    #[serde(default)]
    pub min_flow: f64,
    /// Omitted means unbounded
    pub max_flow: Option<f64>,
    #[serde(default)]
    pub penalties: FlowViolationPenalties,
    /// Nodes whose exogenous inflow relaxes this link's horizon maximum
    #[serde(default)]
    pub upstream_nodes: Vec<String>,
    /// Use every node upstream of `from` (and `from` itself) instead of `upstream_nodes`
    #[serde(default)]
    pub infer_upstream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflowSpec {
    pub node: String,
    pub timepoint: u32,
    pub flow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOverrideSpec {
    pub link: String,
    pub timepoint: u32,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonBoundSpec {
    pub link: String,
    pub balancing_type: String,
    pub horizon: u32,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub inflow_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RampLimitSpec {
    pub link: String,
    pub name: String,
    pub direction: RampDirection,
    pub window_hours: f64,
    #[serde(default)]
    pub allowed_delta: Vec<RampDeltaSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RampDeltaSpec {
    pub balancing_type: String,
    pub horizon: u32,
    pub delta: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_boundary() -> String {
    BoundaryType::Circular.to_string()
}

fn default_volume_per_flow_hour() -> f64 {
    cascade_algo::DEFAULT_VOLUME_PER_FLOW_HOUR
}

pub fn load_spec_from_path(path: &Path) -> Result<SystemSpec> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading system spec '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing system spec yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing system spec json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing system spec"),
    }
}

/// Document-level checks that do not need the built structures: names, counts, numbers.
pub fn validate(spec: &SystemSpec) -> Result<()> {
    if spec.routing.balancing_type.trim().is_empty() {
        return Err(anyhow!("routing.balancing_type cannot be empty"));
    }
    if !(spec.routing.volume_per_flow_hour.is_finite() && spec.routing.volume_per_flow_hour > 0.0) {
        return Err(anyhow!(
            "routing.volume_per_flow_hour must be positive, got {}",
            spec.routing.volume_per_flow_hour
        ));
    }
    if spec.timepoints.is_empty() {
        return Err(anyhow!("system spec declares no timepoints"));
    }
    if spec.nodes.is_empty() {
        return Err(anyhow!("system spec declares no water nodes"));
    }
    let mut names = HashSet::new();
    for node in &spec.nodes {
        if node.name.trim().is_empty() {
            return Err(anyhow!("water node name cannot be empty"));
        }
        if !names.insert(node.name.as_str()) {
            return Err(anyhow!("duplicate water node '{}' in spec", node.name));
        }
        if node.initial_storage.is_some() && !node.reservoir {
            return Err(anyhow!(
                "water node '{}' sets initial_storage but has no reservoir",
                node.name
            ));
        }
    }
    let mut links = HashSet::new();
    for link in &spec.links {
        if !links.insert(link.name.as_str()) {
            return Err(anyhow!("duplicate water link '{}' in spec", link.name));
        }
        if link.infer_upstream && !link.upstream_nodes.is_empty() {
            return Err(anyhow!(
                "water link '{}' sets both upstream_nodes and infer_upstream",
                link.name
            ));
        }
    }
    for ramp in &spec.ramp_limits {
        if !(ramp.window_hours.is_finite() && ramp.window_hours >= 0.0) {
            return Err(anyhow!(
                "ramp limit '{}' on '{}' has invalid window {}",
                ramp.name,
                ramp.link,
                ramp.window_hours
            ));
        }
    }
    Ok(())
}
