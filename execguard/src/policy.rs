/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The allow/terminate decision for observed syscall entries.

use syscalls::Sysno;

/// Verdict for one observed syscall entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Decision {
    /// Not a policy concern, or within budget; let the tracee proceed.
    Allow,
    /// The tracee exceeded its process-replacement budget and must be
    /// killed.
    Terminate,
}

/// Counts invocations of the process-replacement syscalls for one tracee.
///
/// The counter is mutated only at syscall-entry boundaries for a watched
/// syscall and never decreases. The first invocation is the launcher's own
/// exec of the target program and is always legitimate; any further
/// invocation is a violation.
///
/// The policy only decides; killing the tracee is the trace loop's job.
#[derive(Debug, Default)]
pub struct ExecPolicy {
    invocations: u32,
}

/// How many process-replacement calls a tracee is granted. The single
/// allowed call is the initial image load of the target program.
const EXEC_BUDGET: u32 = 1;

impl ExecPolicy {
    /// Creates a policy with an untouched counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of process-replacement entries observed so far.
    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    /// True for syscalls that replace the calling process's image.
    /// execveat(2) replaces the image just like execve(2); watching only the
    /// latter would leave a trivial bypass.
    fn is_watched(sysno: Sysno) -> bool {
        matches!(sysno, Sysno::execve | Sysno::execveat)
    }

    /// Judges one syscall entry. Emits the diagnostic line on the first (and
    /// by construction only) terminate decision; the loop exits right after.
    pub fn check(&mut self, sysno: Sysno) -> Decision {
        if !Self::is_watched(sysno) {
            return Decision::Allow;
        }

        self.invocations += 1;
        tracing::debug!(%sysno, invocations = self.invocations, "process-replacement entry");

        if self.invocations <= EXEC_BUDGET {
            Decision::Allow
        } else {
            eprintln!("No hacking pls!!");
            Decision::Terminate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_exec_is_allowed() {
        let mut policy = ExecPolicy::new();
        assert_eq!(policy.check(Sysno::execve), Decision::Allow);
        assert_eq!(policy.invocations(), 1);
    }

    #[test]
    fn second_exec_terminates() {
        let mut policy = ExecPolicy::new();
        assert_eq!(policy.check(Sysno::execve), Decision::Allow);
        assert_eq!(policy.check(Sysno::execve), Decision::Terminate);
        assert_eq!(policy.invocations(), 2);
    }

    #[test]
    fn execveat_shares_the_budget() {
        let mut policy = ExecPolicy::new();
        assert_eq!(policy.check(Sysno::execve), Decision::Allow);
        assert_eq!(policy.check(Sysno::execveat), Decision::Terminate);
    }

    #[test]
    fn unwatched_syscalls_do_not_count() {
        let mut policy = ExecPolicy::new();
        assert_eq!(policy.check(Sysno::write), Decision::Allow);
        assert_eq!(policy.check(Sysno::openat), Decision::Allow);
        assert_eq!(policy.check(Sysno::clone), Decision::Allow);
        assert_eq!(policy.invocations(), 0);
    }

    #[test]
    fn counter_is_monotonic() {
        let mut policy = ExecPolicy::new();
        for expected in 1..=5 {
            policy.check(Sysno::execve);
            assert_eq!(policy.invocations(), expected);
        }
    }
}
