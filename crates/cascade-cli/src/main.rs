use anyhow::Result;
use clap::Parser;
use tracing_subscriber::FmtSubscriber;

use cascade_cli::{Cli, Commands};

mod commands;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Inspect { spec, format } => commands::inspect::handle(spec, *format),
        Commands::Validate { spec } => commands::validate::handle(spec),
        Commands::Route { spec, out } => commands::route::handle(spec, out.as_deref()),
    }
}
