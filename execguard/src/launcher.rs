/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Launching the tracee: fork, request tracing, stop, exec.

use std::ffi::CString;
use std::ffi::NulError;

use execguard_trace::Errno;
use execguard_trace::ExitStatus;
use execguard_trace::Options;
use execguard_trace::Running;
use execguard_trace::Signal;
use execguard_trace::Stopped;
use execguard_trace::Wait;
use execguard_trace::traceme_and_stop;
use nix::unistd::ForkResult;
use nix::unistd::execvp;
use nix::unistd::fork;
use thiserror::Error;

/// An error produced while setting up the tracee.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The program path or an argument contained an interior NUL byte and
    /// cannot be passed to exec.
    #[error("invalid argument: {0}")]
    BadArgv(#[from] NulError),

    /// fork(2) failed; no child process exists.
    #[error("failed to fork tracee: {0}")]
    Fork(Errno),

    /// The child disappeared before tracing could be configured.
    #[error("tracee exited during launch: {0:?}")]
    EarlyExit(ExitStatus),

    /// A trace request failed during launch.
    #[error(transparent)]
    Trace(#[from] execguard_trace::Error),
}

/// Forks the target program and returns it stopped and trace-attached,
/// before it has executed a single instruction of `program`.
///
/// In the child: request tracing by the parent, raise a stop against
/// ourselves (guaranteeing the parent observes a stop before any further
/// progress), then replace the image with the target. If the exec fails the
/// child reports to stderr and exits 127, which the trace loop observes as
/// an ordinary early exit rather than a supervisor failure.
///
/// In the parent: wait for the child's first stop, then set the trace
/// options the loop depends on.
pub fn launch(program: &str, args: &[String]) -> Result<Stopped, LaunchError> {
    // The argv and the failure report must be built before forking;
    // allocating between fork and exec can deadlock in glibc.
    let exe = CString::new(program)?;
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(exe.clone());
    for arg in args {
        argv.push(CString::new(arg.as_str())?);
    }
    let exec_failed = format!("execguard: failed to exec {}\n", program);

    match unsafe { fork() }.map_err(|err| LaunchError::Fork(Errno::new(err as i32)))? {
        ForkResult::Parent { child, .. } => configure(Running::new(child)),
        ForkResult::Child => {
            if traceme_and_stop().is_ok() {
                // Only returns on failure.
                let _ = execvp(&exe, &argv);

                // Reported with a raw write: no allocation, no locks, and
                // the parent observes an ordinary exit rather than a
                // supervisor failure.
                let msg = exec_failed.as_bytes();
                unsafe {
                    libc::write(libc::STDERR_FILENO, msg.as_ptr() as *const libc::c_void, msg.len());
                }
            }

            // Also taken when the trace attach itself failed: without it the
            // parent would wait forever for a stop that never comes.
            unsafe { libc::_exit(127) }
        }
    }
}

/// Parent half of the launch handshake.
fn configure(child: Running) -> Result<Stopped, LaunchError> {
    // The child stops itself immediately after PTRACE_TRACEME. Spurious
    // signals (e.g. SIGWINCH) may still arrive before the SIGSTOP.
    let (tracee, _event) = match child.wait_for_signal(Signal::SIGSTOP)? {
        Wait::Stopped(stopped, event) => (stopped, event),
        Wait::Exited(_, status) => return Err(LaunchError::EarlyExit(status)),
    };

    // EXITKILL: the tracee is killed if the supervisor dies, so no orphaned
    // untraced process can outlive us. TRACESYSGOOD: syscall traps are
    // marked distinguishably from other stops, which the entry/exit
    // bookkeeping in the trace loop depends on.
    tracee.setoptions(Options::PTRACE_O_EXITKILL | Options::PTRACE_O_TRACESYSGOOD)?;

    tracing::debug!(pid = %tracee.pid(), "tracee launched and stopped before exec");

    Ok(tracee)
}
