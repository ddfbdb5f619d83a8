use serde::Deserialize;
use std::collections::BTreeMap;

/// Environment used when `--env` is missing or not recognised.
pub const DEFAULT_ENV: &str = "dev";

/// Environments accepted by `srvrig start --env`.
pub const VALID_ENVS: &[&str] = &["dev", "sit"];

#[derive(Debug, Clone, Deserialize)]
pub struct SrvrigConfig {
    #[serde(default)]
    pub env: EnvConfig,
    #[serde(default)]
    pub ports: PortsConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub datasources: BTreeMap<String, DatasourceConfig>,
    #[serde(default)]
    pub apps: BTreeMap<String, AppConfig>,
}

/// Machine-wide settings shared by every instance.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EnvConfig {
    #[serde(default)]
    pub java_home: String,
    #[serde(default)]
    pub jre_home: String,
    #[serde(default)]
    pub java_opts: String,
    #[serde(default = "default_build_tool")]
    pub build_tool: String,
    #[serde(default)]
    pub build_settings: String,
    #[serde(default = "default_build_profile")]
    pub build_profile: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            java_home: String::new(),
            jre_home: String::new(),
            java_opts: String::new(),
            build_tool: default_build_tool(),
            build_settings: String::new(),
            build_profile: default_build_profile(),
        }
    }
}

fn default_build_tool() -> String {
    if cfg!(windows) {
        "mvn.cmd".to_string()
    } else {
        "mvn".to_string()
    }
}

fn default_build_profile() -> String {
    "tom".to_string()
}

fn default_main_port() -> u16 {
    9000
}

fn default_server_port() -> u16 {
    8000
}

fn default_debug_port() -> u16 {
    5000
}

fn default_connector_port() -> u16 {
    8100
}

fn default_redirect_port() -> u16 {
    8400
}

fn default_scan_limit() -> u16 {
    1000
}

fn default_probe_host() -> String {
    "0.0.0.0".to_string()
}

/// Where each port category starts scanning, and how far.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PortsConfig {
    #[serde(default = "default_main_port")]
    pub main: u16,
    #[serde(default = "default_server_port")]
    pub server: u16,
    #[serde(default = "default_debug_port")]
    pub debug: u16,
    #[serde(default = "default_connector_port")]
    pub connector: u16,
    #[serde(default = "default_redirect_port")]
    pub redirect: u16,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u16,
    #[serde(default = "default_probe_host")]
    pub probe_host: String,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            main: default_main_port(),
            server: default_server_port(),
            debug: default_debug_port(),
            connector: default_connector_port(),
            redirect: default_redirect_port(),
            scan_limit: default_scan_limit(),
            probe_host: default_probe_host(),
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// JNDI snippets injected into `server.xml` and `context.xml` for one env.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DatasourceConfig {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub context: String,
}

fn default_target_suffix() -> String {
    "target".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    pub context_file_name: String,
    pub war_name: String,
    pub project_path: String,
    #[serde(default = "default_target_suffix")]
    pub target_suffix: String,
    #[serde(default)]
    pub java_opts: String,
    #[serde(default)]
    pub with_apps_config: bool,
    #[serde(default)]
    pub index_file: Option<String>,
}

impl SrvrigConfig {
    /// Pick the datasource for `env`, falling back to [`DEFAULT_ENV`].
    pub fn datasource_for(&self, env: &str) -> DatasourceConfig {
        if let Some(ds) = self.datasources.get(env) {
            return ds.clone();
        }
        if env != DEFAULT_ENV {
            tracing::warn!(env, "no datasource for env, using {}", DEFAULT_ENV);
        }
        match self.datasources.get(DEFAULT_ENV) {
            Some(ds) => ds.clone(),
            None => {
                tracing::warn!("no datasource configured, database placeholders will be blank");
                DatasourceConfig::default()
            }
        }
    }
}
