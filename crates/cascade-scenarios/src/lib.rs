pub mod build;
pub mod report;
pub mod spec;

pub use build::{build_system, SystemInputs};
pub use report::{load_report, routing_report, write_report, RouteEntry, RoutingReport};
pub use spec::{load_spec_from_path, validate, SystemSpec};
