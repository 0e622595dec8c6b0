/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Tests for the `execguard` binary's command line contract.

use std::process::Command;

fn execguard() -> Command {
    Command::new(env!("CARGO_BIN_EXE_execguard"))
}

#[test]
fn usage_without_arguments() {
    let output = execguard().output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
}

#[test]
fn tracee_exit_code_is_propagated() {
    let output = execguard()
        .args(["/bin/sh", "-c", "exit 9"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(9));
}

#[test]
fn violation_exits_126_with_one_diagnostic() {
    let output = execguard()
        .args(["/bin/sh", "-c", "exec /bin/true"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(126));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("No hacking pls!!").count(), 1);
}

#[test]
fn triple_exec_target_is_stopped_at_the_second() {
    // Each nested exec would be another image replacement. The tracee dies
    // at the entry of #2, before the inner shell exists, so the output of
    // exec #3 must never appear and the diagnostic fires exactly once.
    let output = execguard()
        .args(["/bin/sh", "-c", "exec /bin/sh -c 'exec /bin/echo third'"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(126));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("third"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("No hacking pls!!").count(), 1);
}

#[test]
fn well_behaved_target_sees_no_diagnostic() {
    let output = execguard().arg("/bin/true").output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("No hacking pls!!"));
}

#[test]
fn target_arguments_pass_through_untouched() {
    // Hyphen-prefixed target args must not be parsed as supervisor flags.
    let output = execguard()
        .args(["/bin/echo", "-n", "guarded"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "guarded");
}

#[test]
fn missing_target_exits_nonzero_without_diagnostic() {
    let output = execguard().arg("/nonexistent/no-such-program").output().unwrap();

    assert_ne!(output.status.code(), Some(0));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("No hacking pls!!"));
}
