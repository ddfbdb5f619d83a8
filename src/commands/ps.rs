use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::config::model::PortsConfig;
use crate::config::resolve::require_base_dir;
use crate::config::CONFIG_FILE;
use crate::orchestrator::ports::check_port_available;
use crate::orchestrator::registry::InstanceRegistry;
use crate::ui::summary::print_instances;

pub fn run(base_dir: Option<&Path>) -> Result<()> {
    let base = require_base_dir(base_dir)?;
    let registry = InstanceRegistry::load(&InstanceRegistry::path_in(&base))?;
    let host = probe_host(&base);
    print_instances(registry.list(), |record| {
        !check_port_available(&host, record.server_port)
    });
    Ok(())
}

/// The probe host from `srvrig.toml`, or the default when the config is
/// missing or unreadable.
fn probe_host(base: &Path) -> String {
    match crate::config::load_config(&base.join(CONFIG_FILE)) {
        Ok((config, _)) => config.ports.probe_host,
        Err(e) => {
            debug!(error = %e, "using default probe host");
            PortsConfig::default().probe_host
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn probe_host_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(probe_host(tmp.path()), "0.0.0.0");
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "[ports]\nprobe_host = \"127.0.0.1\"\n",
        )
        .unwrap();
        assert_eq!(probe_host(tmp.path()), "127.0.0.1");
    }
}
