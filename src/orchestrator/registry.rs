use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ports::{check_port_available, PortSet};

/// File name of the registry inside the base directory.
pub const REGISTRY_FILE: &str = "running-instances.json";

/// One running server instance and the ports it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub name: String,
    pub main_port: u16,
    pub server_port: u16,
    pub debug_port: u16,
    pub connector_port: u16,
    pub redirect_port: u16,
    pub started_at: DateTime<Utc>,
}

impl InstanceRecord {
    pub fn new(name: impl Into<String>, ports: PortSet) -> Self {
        Self {
            name: name.into(),
            main_port: ports.main,
            server_port: ports.server,
            debug_port: ports.debug,
            connector_port: ports.connector,
            redirect_port: ports.redirect,
            started_at: Utc::now(),
        }
    }

    pub fn ports(&self) -> PortSet {
        PortSet {
            main: self.main_port,
            server: self.server_port,
            debug: self.debug_port,
            connector: self.connector_port,
            redirect: self.redirect_port,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("instance registry {} not found -- run `srvrig init` first", path.display())]
    Missing { path: PathBuf },
    #[error("instance registry {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("port {port} is already held by instance '{owner}'")]
    PortConflict { port: u16, owner: String },
    #[error("failed to {action} instance registry {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    instances: Vec<InstanceRecord>,
}

/// Durable set of running instances, keyed by name.
///
/// Every mutation takes an exclusive lock on `<file>.lock`, re-reads the file,
/// applies the change and rewrites the whole snapshot through a temp file and
/// a rename, so readers only ever see complete snapshots.
#[derive(Debug)]
pub struct InstanceRegistry {
    path: PathBuf,
    instances: Vec<InstanceRecord>,
}

impl InstanceRegistry {
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(REGISTRY_FILE)
    }

    /// Load the registry at `path`. Missing or unparsable files are errors.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let instances = read_snapshot(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            instances,
        })
    }

    /// Load the registry at `path`, writing an empty one first if absent.
    pub fn create(path: &Path) -> Result<Self, RegistryError> {
        if path.exists() {
            return Self::load(path);
        }
        let registry = Self {
            path: path.to_path_buf(),
            instances: Vec::new(),
        };
        registry.save()?;
        info!(path = %path.display(), "created empty instance registry");
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn get(&self, name: &str) -> Option<&InstanceRecord> {
        self.instances.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every port held by any registered instance, across all categories.
    pub fn used_ports(&self) -> HashSet<u16> {
        self.instances
            .iter()
            .flat_map(|r| r.ports().into_iter().map(|(_, p)| p))
            .collect()
    }

    /// Drop every record whose management port is free, i.e. whose server
    /// died without deregistering. Returns whether anything was removed.
    pub fn prune_unreachable(&mut self, probe_host: &str) -> Result<bool, RegistryError> {
        self.mutate(|instances| {
            let before = instances.len();
            instances.retain(|r| {
                let dead = check_port_available(probe_host, r.server_port);
                if dead {
                    info!(
                        instance = %r.name,
                        port = r.server_port,
                        "removing stale instance (management port is free)"
                    );
                }
                !dead
            });
            let changed = instances.len() != before;
            (changed, changed)
        })
    }

    /// Record a launched instance. A record with the same name is replaced.
    /// Fails without writing if any of its ports is held by another record.
    pub fn commit(&mut self, record: InstanceRecord) -> Result<(), RegistryError> {
        self.mutate(|instances| {
            if let Some(conflict) = port_conflict(instances, &record) {
                return (Err(conflict), false);
            }
            match instances.iter_mut().find(|r| r.name == record.name) {
                Some(existing) => *existing = record,
                None => instances.push(record),
            }
            (Ok(()), true)
        })?
    }

    /// Remove the record called `name`. Removing an absent name is a no-op.
    pub fn remove(&mut self, name: &str) -> Result<bool, RegistryError> {
        self.mutate(|instances| {
            let before = instances.len();
            instances.retain(|r| r.name != name);
            let removed = instances.len() != before;
            if !removed {
                debug!(instance = name, "instance not registered, nothing to remove");
            }
            (removed, removed)
        })
    }

    /// Lock, reload, apply `f`, and persist when `f` reports a change.
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut Vec<InstanceRecord>) -> (T, bool),
    ) -> Result<T, RegistryError> {
        let _lock = self.lock()?;
        self.instances = read_snapshot(&self.path)?;
        let (out, changed) = f(&mut self.instances);
        if changed {
            self.save()?;
        }
        Ok(out)
    }

    fn save(&self) -> Result<(), RegistryError> {
        let io_err = |action, source| RegistryError::Io {
            action,
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err("create directory for", e))?;
        }
        let snapshot = Snapshot {
            instances: self.instances.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| io_err("encode", std::io::Error::other(e)))?;
        // Atomic write: write to tmp file then rename
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content).map_err(|e| io_err("write", e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| io_err("replace", e))?;
        Ok(())
    }

    /// Acquire an exclusive file lock on `<file>.lock`.
    /// Returns the lock file handle (lock released on drop).
    fn lock(&self) -> Result<File, RegistryError> {
        let lock_path = self.path.with_extension("json.lock");
        let lock_file = File::create(&lock_path).map_err(|source| RegistryError::Io {
            action: "lock",
            path: self.path.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: fd is valid for the lifetime of lock_file
            let rc = unsafe { libc::flock(lock_file.as_raw_fd(), libc::LOCK_EX) };
            if rc == -1 {
                return Err(RegistryError::Io {
                    action: "lock",
                    path: self.path.clone(),
                    source: std::io::Error::last_os_error(),
                });
            }
        }

        Ok(lock_file)
    }
}

/// First port of `record` already held by a differently named record.
fn port_conflict(instances: &[InstanceRecord], record: &InstanceRecord) -> Option<RegistryError> {
    instances
        .iter()
        .filter(|other| other.name != record.name)
        .find_map(|other| {
            let held: HashSet<u16> = other.ports().into_iter().map(|(_, p)| p).collect();
            record
                .ports()
                .into_iter()
                .map(|(_, p)| p)
                .find(|p| held.contains(p))
                .map(|port| RegistryError::PortConflict {
                    port,
                    owner: other.name.clone(),
                })
        })
}

fn read_snapshot(path: &Path) -> Result<Vec<InstanceRecord>, RegistryError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RegistryError::Missing {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(RegistryError::Io {
                action: "read",
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let snapshot: Snapshot =
        serde_json::from_str(&content).map_err(|source| RegistryError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(snapshot.instances)
}
