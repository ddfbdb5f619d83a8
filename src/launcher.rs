use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Inputs for one application build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSpec {
    pub tool: String,
    pub project_path: PathBuf,
    pub settings: PathBuf,
    pub profile: String,
}

impl BuildSpec {
    pub fn args(&self) -> Vec<String> {
        vec![
            "clean".to_string(),
            "install".to_string(),
            "-f".to_string(),
            self.project_path.display().to_string(),
            "-s".to_string(),
            self.settings.display().to_string(),
            format!("-Denv={}", self.profile),
            "-DskipTests".to_string(),
        ]
    }
}

/// Everything the server process needs. The environment is set on the child
/// command only; the manager's own environment is never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub instance_home: PathBuf,
    pub script: PathBuf,
    pub java_home: PathBuf,
    pub jre_home: PathBuf,
    pub java_opts: String,
}

impl LaunchSpec {
    pub fn for_instance(
        instance_home: &Path,
        java_home: PathBuf,
        jre_home: PathBuf,
        java_opts: String,
    ) -> Self {
        Self {
            instance_home: instance_home.to_path_buf(),
            script: instance_home
                .join("bin")
                .join(crate::platform::launch_script_name()),
            java_home,
            jre_home,
            java_opts,
        }
    }

    /// Variables for the child. Empty values are left out so the child
    /// inherits whatever the user's shell provides.
    pub fn envs(&self) -> Vec<(&'static str, String)> {
        [
            ("JAVA_HOME", self.java_home.display().to_string()),
            ("JRE_HOME", self.jre_home.display().to_string()),
            ("CATALINA_HOME", self.instance_home.display().to_string()),
            ("JAVA_OPTS", self.java_opts.clone()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }
}

/// The external collaborators a start drives: the build tool and the server
/// launch script.
pub trait Launcher: Send + Sync {
    fn build(&self, spec: &BuildSpec) -> impl Future<Output = Result<()>> + Send;

    fn launch(&self, spec: &LaunchSpec) -> Result<Child>;
}

/// Runs the real build tool and server script.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    async fn build(&self, spec: &BuildSpec) -> Result<()> {
        let args = spec.args();
        info!("building: {} {}", spec.tool, args.join(" "));

        let mut cmd = Command::new(&spec.tool);
        cmd.args(&args);
        cmd.kill_on_drop(true);
        let status = cmd
            .status()
            .await
            .with_context(|| format!("failed to run {}", spec.tool))?;
        if !status.success() {
            bail!("build of {} failed ({status})", spec.project_path.display());
        }
        Ok(())
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Child> {
        info!(home = %spec.instance_home.display(), "launching: {} run", spec.script.display());

        let mut cmd = Command::new(&spec.script);
        cmd.arg("run");
        cmd.current_dir(&spec.instance_home);
        cmd.envs(spec.envs());
        cmd.kill_on_drop(true);
        crate::platform::configure_process_group(&mut cmd);

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to launch {}", spec.script.display()))?;
        debug!(pid = ?child.id(), "server spawned");
        Ok(child)
    }
}
