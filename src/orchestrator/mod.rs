pub mod ports;
pub mod registry;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::launcher::{BuildSpec, LaunchSpec, Launcher, ProcessLauncher};
use crate::templates::generator::ConfigGenerator;
use crate::templates::{SubstitutionMap, TemplateTarget};
use crate::ui::summary::print_startup_summary;

use ports::{allocate_set, PortCategory, PortSet};
use registry::{InstanceRecord, InstanceRegistry};

/// Prefix of every instance folder inside the base directory.
pub const INSTANCE_PREFIX: &str = "srvrig-";

/// Server skeleton copied into each new instance folder.
pub const SERVER_SKELETON_DIR: &str = "server";

/// Per-app context fragments, one `<context_file_name>.xml` each.
pub const CONTEXTS_DIR: &str = "contexts";

/// Where a start currently is. `Interrupted` can follow any phase once
/// ports are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPhase {
    Requested,
    Pruned,
    PortsAllocated,
    Provisioned,
    Configured,
    Launched,
    Registered,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The server exited on its own.
    Stopped,
    /// A signal cancelled the start or the running server.
    Interrupted,
}

/// Drives one instance from request to shutdown.
///
/// Steps, in order:
///   prune dead registry entries and stale instance folders,
///   allocate five ports (cleanup is armed from here on),
///   copy the server skeleton and build the substitution map,
///   render every configuration target,
///   build and deploy the application archive,
///   launch the server and register it,
///   wait for the server to exit or for cancellation, then deregister.
pub struct Controller<L = ProcessLauncher> {
    settings: Settings,
    base_dir: PathBuf,
    launcher: L,
    cancel: CancellationToken,
    skip_build: bool,
    phase: StartPhase,
}

impl Controller {
    pub fn new(settings: Settings, base_dir: PathBuf, cancel: CancellationToken) -> Self {
        Self::with_launcher(settings, base_dir, ProcessLauncher, cancel)
    }
}

impl<L: Launcher> Controller<L> {
    pub fn with_launcher(
        settings: Settings,
        base_dir: PathBuf,
        launcher: L,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            base_dir,
            launcher,
            cancel,
            skip_build: false,
            phase: StartPhase::Requested,
        }
    }

    pub fn skip_build(mut self, skip: bool) -> Self {
        self.skip_build = skip;
        self
    }

    pub fn phase(&self) -> StartPhase {
        self.phase
    }

    pub fn instance_home(&self) -> PathBuf {
        instance_home(&self.base_dir, &self.settings.name)
    }

    pub async fn start(&mut self) -> Result<StartOutcome> {
        let name = self.settings.name.clone();
        self.phase = StartPhase::Requested;
        info!(instance = %name, env = %self.settings.env_name, "starting instance");

        let mut registry = InstanceRegistry::load(&InstanceRegistry::path_in(&self.base_dir))?;
        self.prune(&mut registry)?;
        self.phase = StartPhase::Pruned;
        if self.cancel.is_cancelled() {
            return Ok(self.interrupted());
        }

        let ports = allocate_set(
            &registry.used_ports(),
            &self.settings.ports,
            &self.settings.ports.probe_host,
        )?;
        self.phase = StartPhase::PortsAllocated;
        debug!(instance = %name, "cleanup armed");

        let result = self.run_armed(&mut registry, ports).await;

        match registry.remove(&name) {
            Ok(true) => info!(instance = %name, "deregistered"),
            Ok(false) => debug!(instance = %name, "was not registered"),
            Err(e) => warn!(instance = %name, error = %e, "failed to deregister"),
        }

        match result {
            Ok(StartOutcome::Interrupted) => Ok(self.interrupted()),
            other => other,
        }
    }

    fn interrupted(&mut self) -> StartOutcome {
        info!(instance = %self.settings.name, phase = ?self.phase, "start interrupted");
        self.phase = StartPhase::Interrupted;
        StartOutcome::Interrupted
    }

    /// Drop dead registry entries and any instance folder that no longer has
    /// one, then refuse to start twice.
    fn prune(&self, registry: &mut InstanceRegistry) -> Result<()> {
        if registry.prune_unreachable(&self.settings.ports.probe_host)? {
            info!("removed unreachable instances from the registry");
        }

        let entries = std::fs::read_dir(&self.base_dir)
            .with_context(|| format!("failed to list {}", self.base_dir.display()))?;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(instance) = file_name.to_str().and_then(|n| n.strip_prefix(INSTANCE_PREFIX))
            else {
                continue;
            };
            if registry.contains(instance) || !entry.path().is_dir() {
                continue;
            }
            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => debug!(folder = %entry.path().display(), "removed stale instance folder"),
                Err(e) => warn!(folder = %entry.path().display(), error = %e, "failed to remove stale instance folder"),
            }
        }

        if let Some(record) = registry.get(&self.settings.name) {
            bail!(
                "instance '{}' is already running (server port {})",
                record.name,
                record.server_port
            );
        }
        Ok(())
    }

    async fn run_armed(
        &mut self,
        registry: &mut InstanceRegistry,
        ports: PortSet,
    ) -> Result<StartOutcome> {
        let home = self.instance_home();

        let skeleton = self.base_dir.join(SERVER_SKELETON_DIR);
        let copy = {
            let home = home.clone();
            tokio::task::spawn_blocking(move || copy_dir_all(&skeleton, &home))
        };
        let Some(copied) = or_cancel(&self.cancel, copy).await else {
            return Ok(StartOutcome::Interrupted);
        };
        copied
            .context("provisioning task failed")?
            .with_context(|| format!("failed to provision {}", home.display()))?;
        let map = Arc::new(self.substitution_map(&home, &ports));
        self.phase = StartPhase::Provisioned;

        let generator = ConfigGenerator::new(self.settings.retry_delay);
        let targets = self.targets(&home);
        let Some(generated) = or_cancel(&self.cancel, generator.generate(targets, Arc::clone(&map))).await
        else {
            return Ok(StartOutcome::Interrupted);
        };
        generated.context("configuration generation failed")?;
        self.phase = StartPhase::Configured;

        if self.skip_build {
            info!("skipping build");
        } else {
            let spec = self.build_spec();
            let Some(built) = or_cancel(&self.cancel, self.launcher.build(&spec)).await else {
                return Ok(StartOutcome::Interrupted);
            };
            built?;
        }
        self.deploy_artifact(&home)?;

        let launch = self.launch_spec(&home, &map);
        let mut child = self.launcher.launch(&launch)?;
        let child_pid = child.id();
        self.phase = StartPhase::Launched;

        if let Err(e) = registry.commit(InstanceRecord::new(&self.settings.name, ports)) {
            warn!(instance = %self.settings.name, error = %e, "failed to register, stopping server");
            crate::platform::terminate_child(&mut child, child_pid).await;
            return Err(e.into());
        }
        self.phase = StartPhase::Registered;
        print_startup_summary(&self.settings.name, &self.settings.env_name, &home, &ports);

        tokio::select! {
            status = child.wait() => {
                let status = status.context("failed to wait for the server process")?;
                if status.success() {
                    info!(instance = %self.settings.name, %status, "server exited");
                } else {
                    warn!(instance = %self.settings.name, %status, "server exited with failure");
                }
                Ok(StartOutcome::Stopped)
            }
            _ = self.cancel.cancelled() => {
                eprintln!("\nShutting down...");
                crate::platform::terminate_child(&mut child, child_pid).await;
                Ok(StartOutcome::Interrupted)
            }
        }
    }

    fn substitution_map(&self, home: &Path, ports: &PortSet) -> SubstitutionMap {
        let app = &self.settings.app;
        let mut builder = SubstitutionMap::builder();
        for (category, port) in ports.iter() {
            builder = builder.insert(&category.key(), port);
        }
        builder
            .insert("db_resources", &self.settings.datasource.resource)
            .insert("db_context", &self.settings.datasource.context)
            .insert("deploy_path", home.join("deploy").display())
            .insert("war_name", &app.war_name)
            .insert("project_path", &app.project_path)
            .insert("catalina_home", home.display())
            .insert("context_file_name", &app.context_file_name)
            .build()
    }

    /// One target per output file.
    fn targets(&self, home: &Path) -> Vec<TemplateTarget> {
        let app = &self.settings.app;
        let context_file = format!("{}.xml", app.context_file_name);
        let server_keys = [
            PortCategory::Main.key(),
            PortCategory::Server.key(),
            PortCategory::Connector.key(),
            PortCategory::Redirect.key(),
        ];
        let mut server_keys: Vec<&str> = server_keys.iter().map(String::as_str).collect();
        server_keys.push("db_resources");

        let mut targets = vec![
            TemplateTarget::in_place("server descriptor", home.join("conf/server.xml"), &server_keys),
            TemplateTarget::in_place("context descriptor", home.join("conf/context.xml"), &["db_context"]),
            TemplateTarget::copied(
                "app context",
                self.base_dir.join(CONTEXTS_DIR).join(&context_file),
                home.join("conf/Catalina/localhost").join(&context_file),
                &["deploy_path", "war_name"],
            ),
            TemplateTarget::in_place(
                "app config",
                home.join("apps-config/backend.properties"),
                &["project_path"],
            )
            .optional(app.with_apps_config),
        ];
        if let Some(index) = &app.index_file {
            targets.push(
                TemplateTarget::copied(
                    "index page",
                    self.base_dir.join(index),
                    home.join("deploy").join(index),
                    &["server_port"],
                )
                .optional(true),
            );
        }
        targets
    }

    fn build_spec(&self) -> BuildSpec {
        BuildSpec {
            tool: self.settings.env.build_tool.clone(),
            project_path: PathBuf::from(&self.settings.app.project_path),
            settings: under_base(&self.base_dir, &self.settings.env.build_settings),
            profile: self.settings.env.build_profile.clone(),
        }
    }

    fn launch_spec(&self, home: &Path, map: &SubstitutionMap) -> LaunchSpec {
        let opts = format!("{} {}", self.settings.env.java_opts, self.settings.app.java_opts);
        LaunchSpec::for_instance(
            home,
            under_base(&self.base_dir, &self.settings.env.java_home),
            under_base(&self.base_dir, &self.settings.env.jre_home),
            map.render(opts.trim()),
        )
    }

    /// Copy the newest matching archive into the instance's deploy folder.
    fn deploy_artifact(&self, home: &Path) -> Result<()> {
        let app = &self.settings.app;
        let dir = Path::new(&app.project_path).join(&app.target_suffix);
        let war = newest_archive(&dir, &app.war_name)?.with_context(|| {
            format!("no {}*.war found in {}", app.war_name, dir.display())
        })?;

        let deploy_dir = home.join("deploy");
        std::fs::create_dir_all(&deploy_dir)
            .with_context(|| format!("failed to create {}", deploy_dir.display()))?;
        let dest = deploy_dir.join(format!("{}.war", app.war_name));
        std::fs::copy(&war, &dest).with_context(|| {
            format!("failed to deploy {} to {}", war.display(), dest.display())
        })?;
        info!(artifact = %war.display(), "deployed");
        Ok(())
    }
}

/// Folder of instance `name` under `base_dir`.
pub fn instance_home(base_dir: &Path, name: &str) -> PathBuf {
    base_dir.join(format!("{INSTANCE_PREFIX}{name}"))
}

/// Relative config paths are taken from the base directory.
fn under_base(base_dir: &Path, value: &str) -> PathBuf {
    if value.is_empty() {
        return PathBuf::new();
    }
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn newest_archive(dir: &Path, war_name: &str) -> Result<Option<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let matches = path.extension().is_some_and(|e| e == "war")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(war_name));
        if !matches {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Recursively copy `src` into `dst`, creating `dst` as needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

async fn or_cancel<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        value = fut => Some(value),
    }
}

/// Cancel `cancel` on the first SIGINT or SIGTERM (Ctrl-C elsewhere).
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
