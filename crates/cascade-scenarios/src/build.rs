use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use cascade_algo::{ModelOptions, RoutingOptions, WaterSystemModel};
use cascade_core::{
    find_cycles, upstream_nodes, BoundaryType, Diagnostics, FlowBoundOverride, FlowRate,
    HorizonFlowBound, HorizonKey, LinkId, NodeId, RampLimit, Reservoir, TimeGrid, TimepointId,
    Volume, WaterInputs, WaterLink, WaterNetwork,
};

use crate::spec::{validate, LinkSpec, SystemSpec};

/// Core structures built from a [`SystemSpec`].
#[derive(Debug, Clone)]
pub struct SystemInputs {
    pub grid: TimeGrid,
    pub network: WaterNetwork,
    pub inputs: WaterInputs,
    pub options: ModelOptions,
}

impl SystemInputs {
    pub fn into_model(self) -> Result<WaterSystemModel> {
        WaterSystemModel::build(self.grid, self.network, self.inputs, self.options)
            .context("building water system model")
    }

    /// Advisory topology findings plus any input reference errors.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();
        self.network.validate_into(&mut diag);
        if let Err(err) = self.inputs.validate(&self.grid, &self.network) {
            diag.add_error("inputs", &err.to_string());
        }
        if self
            .grid
            .horizons_of(&self.options.routing.balancing_type)
            .next()
            .is_none()
        {
            diag.add_error_with_entity(
                "time",
                "Routing balancing type has no horizons",
                &self.options.routing.balancing_type,
            );
        }
        for horizon in self.grid.horizons() {
            if horizon.boundary == BoundaryType::Linked {
                diag.add_warning_with_entity(
                    "time",
                    "Linked horizon boundary resolved by policy",
                    &horizon.key.to_string(),
                );
            }
        }
        diag
    }
}

/// Validate `spec` and build the grid, network and inputs it describes.
pub fn build_system(spec: &SystemSpec) -> Result<SystemInputs> {
    validate(spec)?;
    let grid = build_grid(spec)?;
    let network = build_network(spec)?;
    let inputs = build_inputs(spec, &network)?;
    let options = ModelOptions {
        routing: RoutingOptions {
            balancing_type: spec.routing.balancing_type.clone(),
            linked_policy: spec.routing.linked_policy,
        },
        volume_per_flow_hour: spec.routing.volume_per_flow_hour,
        volume_weighted_inflow: spec.routing.volume_weighted_inflow,
    };
    info!(
        timepoints = grid.len(),
        horizons = grid.horizons().len(),
        nodes = network.node_count(),
        links = network.link_count(),
        "loaded water system"
    );
    Ok(SystemInputs {
        grid,
        network,
        inputs,
        options,
    })
}

fn build_grid(spec: &SystemSpec) -> Result<TimeGrid> {
    let mut builder = TimeGrid::builder();
    for tp in &spec.timepoints {
        builder.add_timepoint(tp.id, tp.hours, tp.weight);
    }
    for horizon in &spec.horizons {
        let boundary: BoundaryType = horizon.boundary.parse().with_context(|| {
            format!(
                "horizon {}/{}",
                horizon.balancing_type, horizon.horizon
            )
        })?;
        builder.add_horizon(
            &horizon.balancing_type,
            horizon.horizon,
            boundary,
            horizon.timepoints.iter().copied(),
        );
    }
    builder.build().context("building time grid")
}

fn build_network(spec: &SystemSpec) -> Result<WaterNetwork> {
    let mut network = WaterNetwork::new();
    for node in &spec.nodes {
        let reservoir = node.reservoir.then(|| Reservoir {
            initial_storage: node.initial_storage.map(Volume),
        });
        network
            .add_node(node.name.clone(), reservoir)
            .with_context(|| format!("adding water node '{}'", node.name))?;
    }
    for link in &spec.links {
        let from = network
            .require_node(&link.from)
            .with_context(|| format!("water link '{}'", link.name))?;
        let to = network
            .require_node(&link.to)
            .with_context(|| format!("water link '{}'", link.name))?;
        let water_link = WaterLink::new(link.name.clone(), from, to)
            .with_travel_time(link.travel_time)
            .with_flow_limits(link.min_flow, link.max_flow.unwrap_or(f64::INFINITY))
            .with_penalties(link.penalties);
        network
            .add_link(water_link)
            .with_context(|| format!("adding water link '{}'", link.name))?;
    }
    for cycle in find_cycles(&network) {
        debug!(nodes = cycle.len(), "water network contains a cycle");
    }
    Ok(network)
}

fn timepoint(id: u32) -> TimepointId {
    TimepointId::new(id)
}

fn build_inputs(spec: &SystemSpec, network: &WaterNetwork) -> Result<WaterInputs> {
    let mut inputs = WaterInputs::new();
    for inflow in &spec.inflows {
        let node = network
            .require_node(&inflow.node)
            .context("exogenous inflow")?;
        inputs.set_exogenous_inflow(node, timepoint(inflow.timepoint), inflow.flow);
    }
    for entry in &spec.flow_overrides {
        let link = network.require_link(&entry.link).context("flow override")?;
        inputs.set_flow_override(
            link,
            timepoint(entry.timepoint),
            FlowBoundOverride {
                min: entry.min.map(FlowRate),
                max: entry.max.map(FlowRate),
            },
        );
    }
    for bound in &spec.horizon_bounds {
        let link = network.require_link(&bound.link).context("horizon bound")?;
        inputs.set_horizon_bound(
            link,
            HorizonKey::new(bound.balancing_type.clone(), bound.horizon),
            HorizonFlowBound {
                min: bound.min.map(FlowRate),
                max: bound.max.map(FlowRate),
                inflow_threshold: bound.inflow_threshold.map(FlowRate),
            },
        );
    }
    for link in &spec.links {
        let id = network.require_link(&link.name)?;
        let upstream = resolve_upstream(link, id, network)?;
        if !upstream.is_empty() {
            inputs.set_upstream_nodes(id, upstream);
        }
    }
    for ramp in &spec.ramp_limits {
        let link = network.require_link(&ramp.link).context("ramp limit")?;
        let mut limit = RampLimit::new(link, ramp.name.clone(), ramp.direction, ramp.window_hours);
        for delta in &ramp.allowed_delta {
            limit = limit.with_delta(
                HorizonKey::new(delta.balancing_type.clone(), delta.horizon),
                delta.delta,
            );
        }
        if inputs.ramp_limit(link, &ramp.name).is_some() {
            return Err(anyhow!(
                "duplicate ramp limit '{}' on water link '{}'",
                ramp.name,
                ramp.link
            ));
        }
        inputs.add_ramp_limit(limit);
    }
    Ok(inputs)
}

fn resolve_upstream(spec: &LinkSpec, link: LinkId, network: &WaterNetwork) -> Result<Vec<NodeId>> {
    if spec.infer_upstream {
        let from = network
            .link(link)
            .map(|l| l.from)
            .ok_or_else(|| anyhow!("water link '{}' vanished from the network", spec.name))?;
        let mut nodes = upstream_nodes(network, from);
        nodes.insert(from);
        return Ok(nodes.into_iter().collect());
    }
    spec.upstream_nodes
        .iter()
        .map(|name| {
            network
                .require_node(name)
                .with_context(|| format!("upstream nodes of water link '{}'", spec.name))
        })
        .collect()
}
