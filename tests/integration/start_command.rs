use predicates::prelude::*;

use crate::common::{TestBase, BILLING_CONFIG};

#[test]
fn unknown_app_suggests_close_name() {
    let base = TestBase::new(BILLING_CONFIG);
    base.cmd()
        .args(["start", "biling"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did you mean `billing`?"));
}

#[test]
fn update_requires_running_instance() {
    let base = TestBase::new(BILLING_CONFIG);
    base.cmd()
        .args(["update", "billing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not running"));
}

#[test]
fn start_with_missing_skeleton_leaves_registry_clean() {
    let base = TestBase::new(BILLING_CONFIG);
    base.cmd()
        .args(["start", "billing", "--skip-build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to provision"));

    let registry = srvrig::orchestrator::registry::InstanceRegistry::load(
        &srvrig::orchestrator::registry::InstanceRegistry::path_in(&base.base),
    )
    .unwrap();
    assert!(registry.list().is_empty());
}
