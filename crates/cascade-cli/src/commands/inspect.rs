//! `cascade inspect`: network statistics and time grid layout.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use cascade_core::{network_stats, TimeGrid};
use cascade_cli::cli::OutputFormat;
use serde::Serialize;
use tabwriter::TabWriter;

use super::load_system;

#[derive(Debug, Serialize)]
struct HorizonRow {
    balancing_type: String,
    horizon: u32,
    boundary: String,
    timepoints: usize,
    hours: f64,
}

#[derive(Debug, Serialize)]
struct InspectSummary {
    nodes: usize,
    reservoirs: usize,
    links: usize,
    river_systems: usize,
    max_travel_time_hours: f64,
    timepoints: usize,
    horizons: Vec<HorizonRow>,
}

fn horizon_rows(grid: &TimeGrid) -> Vec<HorizonRow> {
    grid.horizons()
        .iter()
        .map(|h| HorizonRow {
            balancing_type: h.key.balancing_type.clone(),
            horizon: h.key.horizon,
            boundary: h.boundary.to_string(),
            timepoints: h.len(),
            hours: grid.horizon_hours(&h.key).value(),
        })
        .collect()
}

pub fn handle(spec: &Path, format: OutputFormat) -> Result<()> {
    let system = load_system(spec)?;
    let stats = network_stats(&system.network);
    let summary = InspectSummary {
        nodes: stats.node_count,
        reservoirs: stats.reservoir_count,
        links: stats.link_count,
        river_systems: stats.river_systems,
        max_travel_time_hours: stats.max_travel_time.value(),
        timepoints: system.grid.len(),
        horizons: horizon_rows(&system.grid),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            println!("Water system {}:", spec.display());
            println!("  Network    : {}", stats);
            println!("  Timepoints : {}", summary.timepoints);
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "BALANCING TYPE\tHORIZON\tBOUNDARY\tTIMEPOINTS\tHOURS")?;
            for row in &summary.horizons {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}",
                    row.balancing_type, row.horizon, row.boundary, row.timepoints, row.hours
                )?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
