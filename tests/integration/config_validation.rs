use crate::common::{TestBase, BILLING_CONFIG};
use srvrig::config::validate::{validate, ConfigDiagnostic};
use srvrig::config::{load_config, CONFIG_FILE};

fn check(toml: &str) -> Result<(), Vec<ConfigDiagnostic>> {
    let base = TestBase::new(toml);
    let (config, source) = load_config(&base.base.join(CONFIG_FILE)).unwrap();
    validate(&config, &source, CONFIG_FILE)
}

#[test]
fn sample_config_is_valid() {
    assert!(check(BILLING_CONFIG).is_ok());
}

#[test]
fn duplicate_port_starts_are_rejected() {
    let errors = check(
        r#"
[ports]
main = 9000
server = 9000
"#,
    )
    .unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigDiagnostic::DuplicatePortStart { port: 9000, .. })));
}

#[test]
fn empty_app_fields_are_rejected() {
    let errors = check(
        r#"
[apps.billing]
context_file_name = ""
war_name = "billing-web"
project_path = "/src/billing"
"#,
    )
    .unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigDiagnostic::EmptyField { field, .. } if field == "context_file_name"
    )));
}

#[test]
fn invalid_config_blocks_start() {
    let base = TestBase::new("[ports]\nscan_limit = 0\n");
    base.cmd()
        .args(["start", "billing"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("is invalid"));
}
