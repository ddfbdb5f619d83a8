use std::path::{Path, PathBuf};

/// Default base directory name under the user's home.
pub const BASE_DIR_NAME: &str = ".srvrig";

/// Resolve the base directory that holds config, registry and instances.
///
/// An explicit `cli_dir` (from `--home` or `SRVRIG_BASE`) wins; otherwise
/// `~/.srvrig` is used.
pub fn resolve_base_dir(cli_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = cli_dir {
        return Ok(dir.to_path_buf());
    }
    let home = crate::platform::home_dir()
        .ok_or_else(|| anyhow::anyhow!("cannot determine the user home directory"))?;
    Ok(home.join(BASE_DIR_NAME))
}

/// Resolve the base directory and check that `srvrig init` has been run.
pub fn require_base_dir(cli_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let base = resolve_base_dir(cli_dir)?;
    if !base.is_dir() {
        anyhow::bail!(
            "base directory {} does not exist -- run `srvrig init` first",
            base.display()
        );
    }
    Ok(base)
}
