use predicates::prelude::*;
use srvrig::orchestrator::ports::PortSet;
use srvrig::orchestrator::registry::{InstanceRecord, InstanceRegistry};

use crate::common::{free_port, srvrig, TestBase, BILLING_CONFIG};

#[test]
fn ps_on_empty_registry() {
    let base = TestBase::new(BILLING_CONFIG);
    base.cmd()
        .arg("ps")
        .assert()
        .success()
        .stdout(predicate::str::contains("No running instances"));
}

#[test]
fn ps_lists_registered_instances() {
    let base = TestBase::new(BILLING_CONFIG);
    let port = free_port();
    let mut registry = InstanceRegistry::load(&InstanceRegistry::path_in(&base.base)).unwrap();
    registry
        .commit(InstanceRecord::new(
            "billing",
            PortSet {
                main: port,
                server: port,
                debug: port,
                connector: port,
                redirect: port,
            },
        ))
        .unwrap();

    base.cmd()
        .arg("ps")
        .assert()
        .success()
        .stdout(predicate::str::contains("billing").and(predicate::str::contains(port.to_string())));
}

#[test]
fn ps_before_init_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    srvrig()
        .arg("--home")
        .arg(dir.path().join("missing"))
        .arg("ps")
        .assert()
        .failure()
        .stderr(predicate::str::contains("srvrig init"));
}

#[test]
fn corrupt_registry_is_fatal() {
    let base = TestBase::new(BILLING_CONFIG);
    std::fs::write(InstanceRegistry::path_in(&base.base), "{not json").unwrap();
    base.cmd()
        .arg("ps")
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupt"));
}
