use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cascade", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize the network and time grid of a system spec
    Inspect {
        /// Path to the system spec (YAML or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        spec: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Check a system spec and report topology and input diagnostics
    Validate {
        /// Path to the system spec (YAML or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        spec: PathBuf,
    },
    /// Route every link and report departure/arrival pairs and constraint counts
    Route {
        /// Path to the system spec (YAML or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        spec: PathBuf,
        /// Write the JSON report here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_route_with_output() {
        let cli = Cli::parse_from(["cascade", "--log-level", "debug", "route", "sys.yaml", "-o", "r.json"]);
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        match cli.command {
            Commands::Route { spec, out } => {
                assert_eq!(spec, PathBuf::from("sys.yaml"));
                assert_eq!(out, Some(PathBuf::from("r.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
