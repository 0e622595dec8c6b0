/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! End-to-end supervision tests against real programs.

use execguard::Outcome;
use execguard::launch;
use execguard::supervise;
use execguard_trace::Signal;

fn run(program: &str, args: &[&str]) -> Outcome {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let tracee = launch(program, &args).expect("failed to launch tracee");
    supervise(tracee).expect("trace loop failed")
}

#[test]
fn well_behaved_program_runs_to_completion() {
    assert_eq!(run("/bin/true", &[]), Outcome::Exited(0));
}

#[test]
fn failing_program_is_not_a_violation() {
    assert_eq!(run("/bin/false", &[]), Outcome::Exited(1));
}

#[test]
fn exit_code_is_propagated() {
    // `exit` is a shell builtin; the shell performs no second exec.
    assert_eq!(run("/bin/sh", &["-c", "exit 7"]), Outcome::Exited(7));
}

#[test]
fn re_exec_is_killed() {
    // The shell's own startup is exec #1; `exec` makes #2. The tracee must
    // die before /bin/echo runs.
    assert_eq!(
        run("/bin/sh", &["-c", "exec /bin/echo pwned"]),
        Outcome::PolicyViolation
    );
}

#[test]
fn re_exec_of_self_is_killed() {
    assert_eq!(
        run("/bin/sh", &["-c", "exec /bin/sh -c 'exit 0'"]),
        Outcome::PolicyViolation
    );
}

#[test]
fn third_exec_is_never_reached() {
    // The shell chains three image replacements; the kill lands at the
    // entry of #2, so the inner shell (and its echo) never runs.
    assert_eq!(
        run("/bin/sh", &["-c", "exec /bin/sh -c 'exec /bin/echo third'"]),
        Outcome::PolicyViolation
    );
}

#[test]
fn missing_target_ends_the_loop_without_violation() {
    // The child's exec fails, so it reports and exits; nothing gets killed.
    match run("/nonexistent/no-such-program", &[]) {
        Outcome::Exited(code) => assert_ne!(code, 0),
        outcome => panic!("unexpected outcome: {:?}", outcome),
    }
}

#[test]
fn signal_death_is_reported() {
    assert_eq!(
        run("/bin/sh", &["-c", "kill -s USR1 $$"]),
        Outcome::Signaled(Signal::SIGUSR1)
    );
}

#[test]
fn supervision_is_idempotent() {
    // Same target, same decision, every time.
    for _ in 0..3 {
        assert_eq!(run("/bin/true", &[]), Outcome::Exited(0));
        assert_eq!(
            run("/bin/sh", &["-c", "exec /bin/true"]),
            Outcome::PolicyViolation
        );
    }
}
