use assert_fs::prelude::*;
use predicates::prelude::*;

use crate::common::srvrig;

#[test]
fn init_seeds_base_and_clean_removes_it() {
    let install = assert_fs::TempDir::new().unwrap();
    install
        .child("resources/server/conf/server.xml")
        .write_str("<Server port=\"{{server_port}}\"/>")
        .unwrap();
    install.child("resources/srvrig.toml").write_str("").unwrap();
    let home = assert_fs::TempDir::new().unwrap();
    let base = home.child("rig");

    srvrig()
        .env("SRVRIG_HOME", install.path())
        .arg("--home")
        .arg(base.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    base.child("server/conf/server.xml")
        .assert(predicate::str::contains("{{server_port}}"));
    base.child("running-instances.json")
        .assert(predicate::str::contains("instances"));

    srvrig()
        .arg("--home")
        .arg(base.path())
        .args(["clean", "--yes"])
        .assert()
        .success();
    base.assert(predicate::path::missing());
}

#[test]
fn init_without_install_home_fails() {
    let home = assert_fs::TempDir::new().unwrap();
    srvrig()
        .arg("--home")
        .arg(home.child("rig").path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SRVRIG_HOME"));
}

#[test]
fn clean_declined_keeps_base() {
    let home = assert_fs::TempDir::new().unwrap();
    home.child("rig/marker").write_str("x").unwrap();

    srvrig()
        .arg("--home")
        .arg(home.child("rig").path())
        .arg("clean")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Aborted"));
    home.child("rig/marker").assert(predicate::path::exists());
}
