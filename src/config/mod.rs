pub mod model;
pub mod resolve;
pub mod validate;

use std::path::Path;

use anyhow::bail;
use model::{AppConfig, DatasourceConfig, EnvConfig, PortsConfig, SrvrigConfig, DEFAULT_ENV, VALID_ENVS};

/// Name of the configuration file inside the base directory.
pub const CONFIG_FILE: &str = "srvrig.toml";

/// Read and parse a config file. Returns the parsed config and the raw source
/// so validation can point back into it.
pub fn load_config(path: &Path) -> anyhow::Result<(SrvrigConfig, String)> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: SrvrigConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
    Ok((config, content))
}

/// Load and validate the config found in `base_dir`.
pub fn load_validated(base_dir: &Path) -> anyhow::Result<SrvrigConfig> {
    let path = base_dir.join(CONFIG_FILE);
    let (config, source) = load_config(&path)?;
    if let Err(errors) = validate::validate(&config, &source, CONFIG_FILE) {
        for err in errors {
            let report: miette::Report = err.into();
            eprintln!("{:?}", report);
        }
        bail!("{} is invalid", path.display());
    }
    Ok(config)
}

/// Immutable inputs for one instance start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub name: String,
    pub env_name: String,
    pub app: AppConfig,
    pub env: EnvConfig,
    pub datasource: DatasourceConfig,
    pub ports: PortsConfig,
    pub retry_delay: std::time::Duration,
}

impl Settings {
    /// Select `app` and `env` from a loaded config.
    ///
    /// Unknown apps are an error (with a suggestion when one is close);
    /// unknown or missing envs fall back to [`DEFAULT_ENV`].
    pub fn resolve(config: &SrvrigConfig, app: &str, env: Option<&str>) -> anyhow::Result<Self> {
        let app_config = match config.apps.get(app) {
            Some(a) => a.clone(),
            None => {
                let known: Vec<String> = config.apps.keys().cloned().collect();
                let diag = validate::unknown_app(app, &known);
                let advice = miette::Diagnostic::help(&diag)
                    .map(|h| h.to_string())
                    .unwrap_or_default();
                bail!("{diag}; {advice}");
            }
        };

        let env_name = match env {
            Some(e) if VALID_ENVS.contains(&e) => e.to_string(),
            Some(e) => {
                tracing::warn!(env = e, "unknown env, using {}", DEFAULT_ENV);
                DEFAULT_ENV.to_string()
            }
            None => {
                tracing::warn!("no env flag, using {}", DEFAULT_ENV);
                DEFAULT_ENV.to_string()
            }
        };

        Ok(Self {
            name: app.to_string(),
            datasource: config.datasource_for(&env_name),
            env_name,
            app: app_config,
            env: config.env.clone(),
            ports: config.ports.clone(),
            retry_delay: std::time::Duration::from_millis(config.generator.retry_delay_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SrvrigConfig {
        toml::from_str(
            r#"
[datasources.dev]
resource = "dev-res"
[datasources.sit]
resource = "sit-res"

[apps.billing]
context_file_name = "billing"
war_name = "billing-web"
project_path = "/src/billing"
"#,
        )
        .unwrap()
    }

    #[test]
    fn resolve_selects_env_datasource() {
        let settings = Settings::resolve(&sample(), "billing", Some("sit")).unwrap();
        assert_eq!(settings.env_name, "sit");
        assert_eq!(settings.datasource.resource, "sit-res");
        assert_eq!(settings.retry_delay.as_millis(), 250);
    }

    #[test]
    fn resolve_unknown_env_uses_dev() {
        let settings = Settings::resolve(&sample(), "billing", Some("prod")).unwrap();
        assert_eq!(settings.env_name, "dev");
        assert_eq!(settings.datasource.resource, "dev-res");
    }

    #[test]
    fn resolve_unknown_app_suggests() {
        let err = Settings::resolve(&sample(), "biling", None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("did you mean `billing`?"), "got: {msg}");
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "[apps.billing\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
