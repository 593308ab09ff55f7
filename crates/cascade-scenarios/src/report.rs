use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;

use cascade_algo::{
    AggregateSummary, ConstraintCounts, RoutedTimepoint, WaterSystemModel, WaterVariables,
};

/// Routing outcome of one departure timepoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub departure: u32,
    /// `None` when the water leaves the horizon first
    pub arrival: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRouteReport {
    pub link: String,
    pub travel_time_hours: f64,
    pub routes: Vec<RouteEntry>,
    pub departed_outside: usize,
}

/// Everything `cascade route` reports for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingReport {
    pub balancing_type: String,
    pub linked_fallbacks: usize,
    pub links: Vec<LinkRouteReport>,
    pub aggregates: Vec<AggregateSummary>,
    pub constraint_counts: ConstraintCounts,
}

/// Summarize routing and constraint generation for `model` using `vars`.
pub fn routing_report<V: WaterVariables>(model: &WaterSystemModel, vars: &V) -> Result<RoutingReport> {
    let router = model.router();
    let links = model
        .network()
        .links()
        .map(|link| LinkRouteReport {
            link: link.name.clone(),
            travel_time_hours: link.travel_time.value(),
            routes: router
                .pairs(link.id)
                .map(|pair| RouteEntry {
                    departure: pair.departure.value(),
                    arrival: match pair.arrival {
                        RoutedTimepoint::Within(tp) => Some(tp.value()),
                        RoutedTimepoint::OutsideHorizon => None,
                    },
                })
                .collect(),
            departed_outside: router.departed_outside(link.id).len(),
        })
        .collect();

    let constraints = model.constraints(vars).context("generating water constraints")?;
    let limits = model.aggregate_limits();
    let aggregates = constraints
        .horizon_aggregates
        .iter()
        .map(|bounds| limits.summary(bounds))
        .collect();

    Ok(RoutingReport {
        balancing_type: router.options().balancing_type.clone(),
        linked_fallbacks: router.linked_fallbacks(),
        links,
        aggregates,
        constraint_counts: constraints.counts(),
    })
}

pub fn write_report(path: &Path, report: &RoutingReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory '{}'", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("creating routing report '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("writing routing report '{}'", path.display()))?;
    Ok(())
}

pub fn load_report(path: &Path) -> Result<RoutingReport> {
    let file = File::open(path)
        .with_context(|| format!("opening routing report '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing routing report '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_system;
    use crate::spec::SystemSpec;
    use good_lp::variables;
    use tempfile::tempdir;

    const SPEC: &str = r#"
routing:
  balancing_type: day
timepoints:
  - { id: 1, hours: 12 }
  - { id: 2, hours: 12 }
horizons:
  - { balancing_type: day, horizon: 1, boundary: linear, timepoints: [1, 2] }
nodes:
  - { name: dam, reservoir: true }
  - { name: town }
links:
  - { name: river, from: dam, to: town, travel_time: 12 }
"#;

    #[test]
    fn writes_and_reads_report() {
        let spec: SystemSpec = serde_yaml::from_str(SPEC).unwrap();
        let model = build_system(&spec).unwrap().into_model().unwrap();
        let mut vars = variables!();
        let registry = model.declare_variables(&mut vars);
        let report = routing_report(&model, &registry).unwrap();

        assert_eq!(report.links.len(), 1);
        assert_eq!(
            report.links[0].routes,
            vec![
                RouteEntry { departure: 1, arrival: Some(2) },
                RouteEntry { departure: 2, arrival: None },
            ]
        );
        assert_eq!(report.links[0].departed_outside, 1);
        // two release rows at the dam; town is an outlet
        assert_eq!(report.constraint_counts.balance, 2);

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("routes.json");
        write_report(&path, &report).unwrap();
        let loaded = load_report(&path).unwrap();
        assert_eq!(loaded.links[0].routes, report.links[0].routes);
        assert_eq!(loaded.balancing_type, "day");
    }
}
