// tests/cli_test.rs

//! Command-line behavior of the pkg-mgr binary

mod common;

use assert_cmd::Command;
use assert_cmd::cargo;
use common::{Item, Layout, build_package};
use predicates::prelude::*;
use std::fs;

/// A command with every path pointed into `layout` and empty config files
fn pkg_mgr(layout: &Layout) -> Command {
    let conf = layout.dir.path().join("empty.conf");
    fs::write(&conf, "# no options\n").unwrap();

    let mut cmd = Command::new(cargo::cargo_bin!("pkg-mgr"));
    cmd.env("TMPDIR", &layout.hooks)
        .env_remove("RUST_LOG")
        .arg("-g")
        .arg(&conf)
        .arg("-u")
        .arg(&conf)
        .arg("-s")
        .arg(&layout.root)
        .arg("-l")
        .arg(&layout.library)
        .arg("-i")
        .arg(&layout.index);
    cmd
}

#[test]
fn test_missing_mode_fails() {
    let layout = Layout::new();
    pkg_mgr(&layout)
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires a mode"));
}

#[test]
fn test_invalid_mode_fails() {
    let layout = Layout::new();
    pkg_mgr(&layout)
        .args(["-m", "reinstall", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mode"));
}

#[test]
fn test_list_mode_rejects_packages() {
    let layout = Layout::new();
    pkg_mgr(&layout)
        .args(["-m", "la", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not take any packages"));
}

#[test]
fn test_install_mode_requires_packages() {
    let layout = Layout::new();
    pkg_mgr(&layout)
        .args(["-m", "install"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires at least one package"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let layout = Layout::new();
    Command::new(cargo::cargo_bin!("pkg-mgr"))
        .env_remove("RUST_LOG")
        .args(["-m", "la", "-g"])
        .arg(layout.dir.path().join("absent.conf"))
        .assert()
        .failure();
}

#[test]
fn test_verbosity_zero_is_silent() {
    let layout = Layout::new();
    pkg_mgr(&layout)
        .args(["-v", "0", "-m", "la", "hello"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_list_all() {
    let layout = Layout::new();
    build_package(&layout.library, "zeta.tar", &[Item::Dir("z/")]);
    build_package(&layout.library, "alpha.tar.gz", &[Item::Dir("a/")]);

    pkg_mgr(&layout)
        .args(["-m", "list-all"])
        .assert()
        .success()
        .stdout("alpha\nzeta\n");
}

#[test]
fn test_install_list_uninstall() {
    let layout = Layout::new();
    build_package(
        &layout.library,
        "hello.tar",
        &[Item::Dir("a/"), Item::File("a/b.txt", "hi\n", 0o644)],
    );

    pkg_mgr(&layout).args(["-m", "i", "hello"]).assert().success();
    assert_eq!(fs::read_to_string(layout.root.join("a/b.txt")).unwrap(), "hi\n");
    assert!(layout.index.join("hello").exists());

    pkg_mgr(&layout)
        .args(["-m", "li"])
        .assert()
        .success()
        .stdout("hello\n");

    pkg_mgr(&layout).args(["-m", "u", "hello"]).assert().success();
    assert!(!layout.root.join("a").exists());
    assert!(!layout.index.join("hello").exists());
}

#[test]
fn test_config_file_supplies_system_root() {
    let layout = Layout::new();
    let other_root = layout.dir.path().join("other-root");
    fs::create_dir(&other_root).unwrap();
    let conf = layout.dir.path().join("root.conf");
    fs::write(&conf, format!("systemRoot={}\n", other_root.display())).unwrap();
    build_package(&layout.library, "hello.tar", &[Item::File("f.txt", "f", 0o644)]);

    Command::new(cargo::cargo_bin!("pkg-mgr"))
        .env("TMPDIR", &layout.hooks)
        .env_remove("RUST_LOG")
        .arg("-g")
        .arg(&conf)
        .arg("-u")
        .arg(&conf)
        .arg("-l")
        .arg(&layout.library)
        .arg("-i")
        .arg(&layout.index)
        .args(["-m", "i", "hello"])
        .assert()
        .success();

    assert!(other_root.join("f.txt").exists());
}

#[test]
fn test_unknown_package_fails_before_any_operation() {
    let layout = Layout::new();
    build_package(&layout.library, "hello.tar", &[Item::File("f.txt", "f", 0o644)]);

    pkg_mgr(&layout)
        .args(["-m", "i", "hello", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.tar"));

    assert!(!layout.root.join("f.txt").exists());
}

#[test]
fn test_failed_package_does_not_stop_the_rest() {
    let layout = Layout::new();
    build_package(
        &layout.library,
        "vetoed.tar",
        &[
            Item::File("pre-install.sh", "#!/bin/sh\nexit 1\n", 0o755),
            Item::File("v.txt", "v", 0o644),
        ],
    );
    build_package(&layout.library, "fine.tar", &[Item::File("f.txt", "f", 0o644)]);

    pkg_mgr(&layout)
        .args(["-m", "i", "vetoed", "fine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pre-install.sh"));

    assert!(!layout.root.join("v.txt").exists());
    assert!(layout.root.join("f.txt").exists());
}

#[test]
fn test_follow_and_unfollow() {
    let layout = Layout::new();
    build_package(&layout.library, "hello.tar", &[Item::Dir("a/")]);

    pkg_mgr(&layout).args(["-m", "f", "hello"]).assert().success();
    assert!(layout.index.join("hello").exists());
    assert!(!layout.root.join("a").exists());

    pkg_mgr(&layout).args(["-m", "uf", "hello"]).assert().success();
    assert!(!layout.index.join("hello").exists());
}

#[test]
fn test_completions() {
    Command::new(cargo::cargo_bin!("pkg-mgr"))
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg-mgr"));
}
