//! The `lineage` binary end to end

#![cfg(unix)]

mod common;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::File;
use std::process::{Command, Stdio};

use common::TestRepo;
use lineage::git::VersionControl;

fn lineage(repo: &TestRepo) -> Command {
    let mut cmd = Command::cargo_bin("lineage").unwrap();
    cmd.arg("-C")
        .arg(repo.path())
        .env_remove("LINEAGE_STORE")
        .env_remove("LINEAGE_LOCK_WAIT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_run_exits_with_command_status() {
    let repo = TestRepo::with_files(&[("a.txt", "alpha\n")]);

    lineage(&repo)
        .args(["run", "--", "cp", "a.txt", "b.txt"])
        .assert()
        .success();
    assert_eq!(repo.read("b.txt"), "alpha\n");

    lineage(&repo)
        .args(["run", "--", "sh", "-c", "echo x > c.txt; exit 4"])
        .assert()
        .code(4);
    assert_eq!(repo.commit_count(), 3);
}

#[test]
fn test_dirty_tree_exit_code() {
    let repo = TestRepo::with_files(&[("a.txt", "alpha\n")]);
    repo.write("a.txt", "edited\n");

    lineage(&repo)
        .args(["run", "--", "cp", "a.txt", "b.txt"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("hint:"));
    assert!(!repo.join("b.txt").exists());
}

#[test]
fn test_log_show_and_trace() {
    let repo = TestRepo::with_files(&[("a.txt", "b\na\n")]);
    lineage(&repo)
        .args(["run", "--stdout", "sorted.txt", "--", "sort", "a.txt"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    lineage(&repo)
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("sort a.txt > sorted.txt"));

    lineage(&repo)
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("step 1 ("))
        .stdout(predicate::str::contains("  output sorted.txt"));

    lineage(&repo)
        .args(["show", "1", "--cwl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cwlVersion"))
        .stdout(predicate::str::contains("stdout: sorted.txt"));

    lineage(&repo)
        .args(["trace", "sorted.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sort a.txt"));

    lineage(&repo).args(["show", "999999999"]).assert().code(1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_stderr_redirected_into_repository_holds_only_command_output() {
    let repo = TestRepo::with_files(&[("a.txt", "alpha\n")]);
    let err_log = File::create(repo.join("err.log")).unwrap();

    let status = lineage(&repo)
        .args(["run", "--", "sh", "-c", "echo oops >&2"])
        .stdin(Stdio::null())
        .stderr(err_log)
        .status()
        .unwrap();

    assert!(status.success());
    assert_eq!(repo.read("err.log"), "oops\n");
    assert!(repo.git.is_clean().unwrap());
    assert_eq!(repo.commit_count(), 2);

    let diagnostics =
        std::fs::read_to_string(repo.git.state_dir().join("lineage/lineage.log")).unwrap();
    assert!(diagnostics.contains("[lineage] step 1"));

    lineage(&repo)
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("err.log"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_stdout_redirected_into_repository_is_recorded() {
    let repo = TestRepo::with_files(&[("a.txt", "b\na\n")]);
    let out = File::create(repo.join("sorted.txt")).unwrap();

    let status = lineage(&repo)
        .args(["run", "--", "sort", "a.txt"])
        .stdin(Stdio::null())
        .stdout(out)
        .status()
        .unwrap();

    assert!(status.success());
    assert_eq!(repo.read("sorted.txt"), "a\nb\n");
    assert!(repo.git.is_clean().unwrap());

    lineage(&repo)
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("sort a.txt > sorted.txt"));
}

#[test]
fn test_store_inside_working_tree_is_a_config_error() {
    let repo = TestRepo::with_files(&[
        ("a.txt", "alpha\n"),
        (".lineage.toml", "[store]\npath = \"workflow.jsonl\"\n"),
    ]);

    lineage(&repo)
        .args(["run", "--", "cp", "a.txt", "b0.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("store.path"));
    assert!(!repo.join("b0.txt").exists());
    assert!(!repo.join("workflow.jsonl").exists());
    assert_eq!(repo.commit_count(), 1);
}

#[test]
fn test_store_in_git_directory_allows_consecutive_runs() {
    let repo = TestRepo::with_files(&[
        ("a.txt", "alpha\n"),
        (".lineage.toml", "[store]\npath = \".git/steps.jsonl\"\n"),
    ]);

    for target in ["b0.txt", "b1.txt"] {
        lineage(&repo)
            .args(["run", "--", "cp", "a.txt", target])
            .assert()
            .success();
    }
    assert!(repo.git.is_clean().unwrap());
    assert_eq!(repo.commit_count(), 3);
    assert!(repo.git.state_dir().join("steps.jsonl").exists());
}
