use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::resolve::resolve_base_dir;
use crate::orchestrator::copy_dir_all;
use crate::orchestrator::registry::InstanceRegistry;

/// Installation directory; its `resources/` folder seeds a new base dir.
pub const INSTALL_HOME_ENV: &str = "SRVRIG_HOME";
pub const RESOURCES_DIR: &str = "resources";

pub fn run(base_dir: Option<&Path>) -> Result<()> {
    let base = resolve_base_dir(base_dir)?;
    if base.exists() {
        warn!(base = %base.display(), "base directory already exists, leaving it in place");
    } else {
        let install_home = std::env::var_os(INSTALL_HOME_ENV)
            .map(PathBuf::from)
            .with_context(|| format!("{INSTALL_HOME_ENV} is not set -- point it at the srvrig installation"))?;
        seed(&install_home.join(RESOURCES_DIR), &base)?;
        println!("Initialized {}", base.display());
    }
    ensure_registry(&base)
}

/// Copy the installation resources into a fresh base directory.
pub fn seed(resources: &Path, base: &Path) -> Result<()> {
    if !resources.is_dir() {
        bail!("resources folder {} not found", resources.display());
    }
    copy_dir_all(resources, base)
        .with_context(|| format!("failed to copy {} to {}", resources.display(), base.display()))
}

fn ensure_registry(base: &Path) -> Result<()> {
    let path = InstanceRegistry::path_in(base);
    if !path.exists() {
        InstanceRegistry::create(&path)?;
    }
    Ok(())
}
