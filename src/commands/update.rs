use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::model::DEFAULT_ENV;
use crate::config::resolve::require_base_dir;
use crate::config::Settings;
use crate::orchestrator::instance_home;
use crate::orchestrator::registry::InstanceRegistry;

/// Where JSP sources live inside a project.
pub const JSP_SOURCE_DIR: &str = "src/main/webapp";

/// Upper bound on copies in flight.
pub const MAX_CONCURRENT_COPIES: usize = 100;

pub async fn run(base_dir: Option<&Path>, app: &str) -> Result<()> {
    let base = require_base_dir(base_dir)?;
    let config = crate::config::load_validated(&base)?;
    let settings = Settings::resolve(&config, app, Some(DEFAULT_ENV))?;

    let registry = InstanceRegistry::load(&InstanceRegistry::path_in(&base))?;
    if !registry.contains(app) {
        bail!("instance '{app}' is not running -- start it with `srvrig start {app}`");
    }

    let source = Path::new(&settings.app.project_path).join(JSP_SOURCE_DIR);
    let dest = instance_home(&base, app)
        .join("webapps")
        .join(&settings.app.context_file_name);
    let copied = copy_jsp_files(&source, &dest, MAX_CONCURRENT_COPIES).await?;
    println!("Copied {} JSP files to {}", copied, dest.display());
    Ok(())
}

/// Copy every `*.jsp` under `source` into `dest`, keeping relative paths.
/// Returns how many files were copied.
pub async fn copy_jsp_files(source: &Path, dest: &Path, permits: usize) -> Result<usize> {
    let files = find_jsp_files(source)
        .with_context(|| format!("failed to scan {}", source.display()))?;

    let semaphore = Arc::new(Semaphore::new(permits));
    let mut set = JoinSet::new();
    for file in files {
        let relative = file.strip_prefix(source).unwrap_or(&file).to_path_buf();
        let target = dest.join(&relative);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&file, &target)
                .await
                .with_context(|| format!("failed to copy {}", file.display()))?;
            debug!(file = %relative.display(), "copied");
            anyhow::Ok(())
        });
    }

    let mut copied = 0;
    let mut failed = 0;
    while let Some(joined) = set.join_next().await {
        match joined? {
            Ok(()) => copied += 1,
            Err(e) => {
                warn!("{e:#}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} JSP files could not be copied");
    }
    Ok(copied)
}

fn find_jsp_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == "jsp") {
                found.push(path);
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn copies_only_jsp_files_preserving_layout() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("webapp");
        std::fs::create_dir_all(source.join("WEB-INF/views")).unwrap();
        std::fs::write(source.join("index.jsp"), "<%= 1 %>").unwrap();
        std::fs::write(source.join("WEB-INF/views/list.jsp"), "<%= 2 %>").unwrap();
        std::fs::write(source.join("WEB-INF/web.xml"), "<web-app/>").unwrap();
        let dest = tmp.path().join("webapps/billing");

        let copied = copy_jsp_files(&source, &dest, 2).await.unwrap();

        assert_eq!(copied, 2);
        assert!(dest.join("index.jsp").exists());
        assert_eq!(
            std::fs::read_to_string(dest.join("WEB-INF/views/list.jsp")).unwrap(),
            "<%= 2 %>"
        );
        assert!(!dest.join("WEB-INF/web.xml").exists());
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = copy_jsp_files(&tmp.path().join("nope"), &tmp.path().join("out"), 4)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to scan"));
    }
}
