use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use super::load_system;

pub fn handle(spec: &Path) -> Result<()> {
    let system = load_system(spec)?;
    let diagnostics = system.diagnostics();
    print!("{}", diagnostics);
    if diagnostics.has_errors() {
        bail!("{} failed validation: {}", spec.display(), diagnostics.summary());
    }
    info!("Validation successful!");
    Ok(())
}
