/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The trace loop: pump trace-stop events until the tracee exits on its own
//! or is put down for a policy violation.

use execguard_trace::Error;
use execguard_trace::Event;
use execguard_trace::ExitStatus;
use execguard_trace::Signal;
use execguard_trace::Stopped;
use execguard_trace::Wait;
use execguard_trace::syscall_number;
use syscalls::Sysno;

use crate::policy::Decision;
use crate::policy::ExecPolicy;

/// Which syscall boundary a syscall trap corresponds to. For a
/// single-threaded tracee the kinds strictly alternate, starting with entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Boundary {
    Entry,
    Exit,
}

impl Boundary {
    fn flip(self) -> Self {
        match self {
            Self::Entry => Self::Exit,
            Self::Exit => Self::Entry,
        }
    }
}

/// Per-tracee session state, owned by the trace loop for the tracee's whole
/// lifetime: the boundary toggle and the enforcement counter.
#[derive(Debug)]
struct Session {
    next_boundary: Boundary,
    policy: ExecPolicy,
}

impl Session {
    fn new() -> Self {
        Self {
            // The tracee was stopped before its first syscall; the first
            // trap is the entry of the launcher's own exec, which counts as
            // invocation #1.
            next_boundary: Boundary::Entry,
            policy: ExecPolicy::new(),
        }
    }

    /// Classifies one syscall trap and advances the toggle. Only called for
    /// traps marked as syscall stops, which is what keeps the alternation
    /// sound; other stops never touch the toggle.
    fn observe_trap(&mut self) -> Boundary {
        let boundary = self.next_boundary;
        self.next_boundary = boundary.flip();
        boundary
    }
}

/// How the supervised program came to an end.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Outcome {
    /// The tracee exited on its own with the given code. This includes a
    /// target that failed to exec at all.
    Exited(i32),

    /// The tracee was terminated by a signal unrelated to the policy.
    Signaled(Signal),

    /// The tracee attempted a second process-image replacement and was
    /// killed before it executed.
    PolicyViolation,
}

impl Outcome {
    /// The exit status for the supervisor process itself: the tracee's own
    /// code for a normal exit, `128 + signo` for a signal death (shell
    /// convention), and `126` for a policy kill.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Exited(code) => *code,
            Outcome::Signaled(sig) => 128 + *sig as i32,
            Outcome::PolicyViolation => 126,
        }
    }
}

fn outcome_of(status: ExitStatus) -> Outcome {
    match status {
        ExitStatus::Exited(code) => Outcome::Exited(code),
        ExitStatus::Signaled(sig, _coredump) => Outcome::Signaled(sig),
    }
}

/// Supervises a freshly launched tracee to completion.
///
/// Every resume is paired with exactly one blocking wait; the loop never has
/// more than one trace request outstanding. If a trace request reports the
/// tracee gone, the loop reaps it and reports its termination.
pub fn supervise(tracee: Stopped) -> Result<Outcome, Error> {
    match pump(tracee) {
        Err(Error::Died(zombie)) => Ok(outcome_of(zombie.reap())),
        result => result,
    }
}

fn pump(tracee: Stopped) -> Result<Outcome, Error> {
    let mut session = Session::new();
    let mut stopped = tracee;
    let mut inject: Option<Signal> = None;

    loop {
        let running = stopped.resume_syscall(inject.take())?;

        stopped = match running.wait()? {
            Wait::Exited(pid, status) => {
                tracing::debug!(%pid, ?status, "tracee finished");
                return Ok(outcome_of(status));
            }
            Wait::Stopped(next, Event::Syscall) => {
                if session.observe_trap() == Boundary::Entry {
                    let number = syscall_number(&next.getregs()?);
                    tracing::trace!(number, "syscall entry");

                    let decision = Sysno::new(number as usize)
                        .map_or(Decision::Allow, |sysno| session.policy.check(sysno));

                    if decision == Decision::Terminate {
                        let status = next.kill().reap();
                        tracing::debug!(?status, "tracee killed for policy violation");
                        return Ok(Outcome::PolicyViolation);
                    }
                }
                next
            }
            Wait::Stopped(next, Event::Signal(sig)) => {
                // Unrelated signal delivery: hand the signal back to the
                // tracee on the next resume without touching the boundary
                // toggle. SIGTRAP is the exception: with TRACEEXEC unset it
                // is the kernel's post-execve trap, and delivering it would
                // kill the tracee.
                tracing::trace!(?sig, "signal stop");
                if sig != Signal::SIGTRAP {
                    inject = Some(sig);
                }
                next
            }
        };
    }
}
