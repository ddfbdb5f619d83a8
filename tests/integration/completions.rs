use clap::CommandFactory;
use clap_complete::aot::{generate, Shell};
use predicates::prelude::*;

fn completions_for(shell: Shell) -> String {
    let mut buf = Vec::new();
    generate(shell, &mut srvrig::cli::Cli::command(), "srvrig", &mut buf);
    String::from_utf8(buf).unwrap()
}

#[test]
fn every_shell_gets_completions() {
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        let output = completions_for(shell);
        assert!(output.contains("srvrig"), "{shell} completions should reference srvrig");
    }
}

#[test]
fn completions_command_prints_script() {
    crate::common::srvrig()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_srvrig"));
}
