use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("esi")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("conversations"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_conversations_help_shows_subcommands() {
    cargo_bin_cmd!("esi")
        .args(["conversations", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_out_of_range_verbosity_is_rejected() {
    cargo_bin_cmd!("esi")
        .args(["--verbosity", "7", "ask", "-p", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("verbosity"));
}
