use std::path::Path;

use anyhow::Result;
use cascade_scenarios::{routing_report, write_report};
use good_lp::variables;
use tracing::info;

use super::load_system;

pub fn handle(spec: &Path, out: Option<&Path>) -> Result<()> {
    let model = load_system(spec)?.into_model()?;
    let mut vars = variables!();
    let registry = model.declare_variables(&mut vars);
    let report = routing_report(&model, &registry)?;
    info!(
        links = report.links.len(),
        linked_fallbacks = report.linked_fallbacks,
        "routed water system"
    );

    match out {
        Some(path) => {
            write_report(path, &report)?;
            println!("Routing report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
