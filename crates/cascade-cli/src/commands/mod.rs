pub mod inspect;
pub mod route;
pub mod validate;

use std::path::Path;

use anyhow::Result;
use cascade_scenarios::{build_system, load_spec_from_path, SystemInputs};
use tracing::info;

/// Load the spec at `path` and build its core structures.
pub fn load_system(path: &Path) -> Result<SystemInputs> {
    info!("Loading system spec {}", path.display());
    let spec = load_spec_from_path(path)?;
    build_system(&spec)
}
