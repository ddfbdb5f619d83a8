use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::warn;

use crate::config::resolve::resolve_base_dir;
use crate::orchestrator::registry::InstanceRegistry;

pub fn run(base_dir: Option<&Path>, yes: bool) -> Result<()> {
    let base = resolve_base_dir(base_dir)?;
    if !base.exists() {
        println!("Nothing to clean: {} does not exist.", base.display());
        return Ok(());
    }

    if let Ok(registry) = InstanceRegistry::load(&InstanceRegistry::path_in(&base)) {
        for record in registry.list() {
            warn!(instance = %record.name, "instance is still registered");
        }
    }

    if !yes {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        if !confirm(&mut stdin.lock(), &mut stdout, &base)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    std::fs::remove_dir_all(&base)
        .with_context(|| format!("failed to remove {}", base.display()))?;
    println!("Removed {}", base.display());
    Ok(())
}

fn confirm(input: &mut impl BufRead, output: &mut impl Write, base: &Path) -> Result<bool> {
    write!(output, "Remove {} and every instance in it? [y/N] ", base.display())?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
