use crate::common::srvrig;
use predicates::prelude::*;

#[test]
fn help_lists_every_command() {
    srvrig()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("clean"))
                .and(predicate::str::contains("start"))
                .and(predicate::str::contains("update"))
                .and(predicate::str::contains("ps"))
                .and(predicate::str::contains("--home")),
        );
}

#[test]
fn start_help_shows_flags() {
    srvrig()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--env").and(predicate::str::contains("--skip-build")));
}

#[test]
fn unknown_command_fails() {
    srvrig().arg("launch").assert().failure();
}
