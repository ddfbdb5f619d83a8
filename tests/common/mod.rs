#![allow(dead_code)]
use assert_cmd::Command;
use std::net::TcpListener;
use std::path::PathBuf;
use tempfile::TempDir;

pub const BILLING_CONFIG: &str = r#"
[ports]
probe_host = "127.0.0.1"

[datasources.dev]
resource = "<Resource name=\"jdbc/app\"/>"
context = "<ResourceLink name=\"jdbc/app\"/>"

[apps.billing]
context_file_name = "billing"
war_name = "billing-web"
project_path = "/src/billing"
"#;

/// A base directory with a config file and an empty registry.
pub struct TestBase {
    pub dir: TempDir,
    pub base: PathBuf,
}

impl TestBase {
    pub fn new(config_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("srvrig.toml"), config_toml).unwrap();
        srvrig::orchestrator::registry::InstanceRegistry::create(
            &srvrig::orchestrator::registry::InstanceRegistry::path_in(&base),
        )
        .unwrap();
        Self { dir, base }
    }

    /// `srvrig --home <base>` ready for more arguments.
    pub fn cmd(&self) -> Command {
        let mut cmd = srvrig();
        cmd.arg("--home").arg(&self.base);
        cmd
    }
}

pub fn srvrig() -> Command {
    let mut cmd = Command::cargo_bin("srvrig").unwrap();
    cmd.env_remove("SRVRIG_BASE").env_remove("SRVRIG_HOME");
    cmd
}

pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
