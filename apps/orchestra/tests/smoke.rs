use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn help_exits_successfully() {
  let mut cmd = Command::cargo_bin("orchestra").expect("compile bin");
  cmd
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("spawn"))
    .stdout(predicate::str::contains("daemon"));
}

#[test]
fn no_args_prints_help() {
  let mut cmd = Command::cargo_bin("orchestra").expect("compile bin");
  cmd
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn shutdown_without_target_is_a_usage_error() {
  let mut cmd = Command::cargo_bin("orchestra").expect("compile bin");
  cmd.arg("shutdown").assert().failure().code(2);
}
