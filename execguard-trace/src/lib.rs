/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg(target_os = "linux")]

//! A safe ptrace API for supervising a single tracee. The API forces correct
//! usage of ptrace in that trace requests only exist on a handle that is
//! known to be in a trace stop, and a stopped handle is consumed by the
//! resume that ends the stop. One resume pairs with exactly one blocking
//! wait; it is not possible to have two trace requests outstanding.

mod regs;
mod status;

use core::mem::MaybeUninit;
use std::fmt;

use nix::sys::ptrace;
// Re-exports so that consumers do not need to depend on `nix` directly.
pub use nix::sys::ptrace::Options;
use nix::sys::signal;
pub use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::sys::wait::waitpid;
pub use nix::unistd::Pid;
pub use syscalls::Errno;
use syscalls::Sysno;
use thiserror::Error;

pub use crate::regs::Regs;
pub use crate::regs::syscall_number;
pub use crate::status::ExitStatus;

/// An error that occurred during tracing.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// A low-level errno.
    #[error(transparent)]
    Errno(#[from] Errno),

    /// The tracee died unexpectedly while it was stopped. This should be
    /// handled gracefully by reaping the zombie.
    #[error("tracee {0} is a zombie")]
    Died(Zombie),
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Self {
        Self::Errno(Errno::new(err as i32))
    }
}

/// Classification of a trace stop.
#[derive(Debug, Eq, PartialEq)]
pub enum Event {
    /// The tracee stopped at a syscall boundary (entry or exit). This is
    /// only reported for stops marked with `PTRACE_O_TRACESYSGOOD`, so it
    /// can never be confused with an ordinary `SIGTRAP` delivery.
    Syscall,

    /// The tracee stopped for delivery of a signal. The signal has not yet
    /// been delivered; the tracer chooses whether to inject it when
    /// resuming.
    Signal(Signal),
}

/// The result of a blocking wait. A process in this state is guaranteed not
/// to be running.
///
/// Both `Clone` and `Copy` are intentionally not implemented. This is to
/// enforce type safety.
#[derive(Debug, Eq, PartialEq)]
pub enum Wait {
    /// The process is in a trace stop and ptrace requests are allowed.
    /// Resuming it transitions back to a running state.
    Stopped(Stopped, Event),

    /// The process has exited with an exit status. There is nothing left to
    /// trace.
    Exited(Pid, ExitStatus),
}

impl Wait {
    /// Assumes the process is in a stopped state. Panics if it isn't.
    pub fn assume_stopped(self) -> (Stopped, Event) {
        match self {
            Self::Stopped(stopped, event) => (stopped, event),
            state => panic!("got unexpected state: {}", state),
        }
    }
}

impl TryFrom<WaitStatus> for Wait {
    type Error = Error;

    /// Converts a `WaitStatus` to this type.
    ///
    /// Preconditions:
    /// The status must come from a blocking wait (never `StillAlive`), and
    /// no `PTRACE_O_TRACE*` event options may be in effect for the tracee.
    fn try_from(wait_status: WaitStatus) -> Result<Self, Error> {
        Ok(match wait_status {
            WaitStatus::Exited(pid, code) => Self::Exited(pid, ExitStatus::Exited(code)),
            WaitStatus::Signaled(pid, sig, coredump) => {
                Self::Exited(pid, ExitStatus::Signaled(sig, coredump))
            }
            WaitStatus::PtraceSyscall(pid) => Self::Stopped(Stopped(pid), Event::Syscall),
            WaitStatus::Stopped(pid, sig) => Self::Stopped(Stopped(pid), Event::Signal(sig)),
            WaitStatus::PtraceEvent(pid, _sig, event) => {
                // The precondition forbids this: without PTRACE_O_TRACE*
                // event options the kernel cannot generate event stops.
                unreachable!("pid {} got unexpected ptrace event {}", pid, event)
            }
            WaitStatus::Continued(_pid) => {
                // Not possible because WaitPidFlag::WCONTINUED is never used.
                unreachable!("unexpected WaitStatus::Continued")
            }
            WaitStatus::StillAlive => {
                // The precondition of this function forbids this.
                unreachable!("precondition violated with WaitStatus::StillAlive")
            }
        })
    }
}

impl fmt::Display for Wait {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Stopped(stopped, event) => {
                write!(f, "pid {} stopped ({:?})", stopped.pid(), event)
            }
            Self::Exited(pid, exit_status) => write!(f, "pid {} exited ({:?})", pid, exit_status),
        }
    }
}

/// A process that is in a trace stop and allows ptrace requests to be
/// performed.
#[derive(Debug, Hash, Eq, PartialEq)]
pub struct Stopped(Pid);

impl Stopped {
    /// Helper for converting from the Errno type.
    ///
    /// According to ptrace(2), any ptrace request may return ESRCH for one
    /// of three reasons:
    ///  1. The process was observed to be in a stopped state and died
    ///     unexpectedly.
    ///  2. The process is not currently being traced by the caller.
    ///  3. The process is not in a stopped state.
    ///
    /// Reasons (2) and (3) only occur due to programmer errors that this
    /// API is designed to prevent, so ESRCH here means the tracee has died
    /// while in a stopped state.
    fn map_err(&self, err: Errno) -> Error {
        if err == Errno::ESRCH {
            Error::Died(Zombie::new(self.0))
        } else {
            Error::Errno(err)
        }
    }

    // Helper for converting from the nix::Error type.
    fn map_nix_err(&self, err: nix::Error) -> Error {
        self.map_err(Errno::new(err as i32))
    }

    /// Creates a new stopped state. This is useful when the process is known
    /// to be in a stopped state already.
    ///
    /// Using this method is unsound because there is no check that the pid
    /// really is in a trace stop. It is better to arrive at a stopped state
    /// via `Running::wait`.
    pub fn new_unchecked(pid: Pid) -> Self {
        Stopped(pid)
    }

    /// Returns the process ID of the tracee.
    pub fn pid(&self) -> Pid {
        self.0
    }

    /// Sets the ptracer options.
    pub fn setoptions(&self, options: Options) -> Result<(), Error> {
        ptrace::setoptions(self.0, options).map_err(|err| self.map_nix_err(err))
    }

    /// Gets a register set.
    ///
    /// `which` corresponds to `libc::NT_PRSTATUS` for the general registers.
    fn getregset<T>(&self, which: i32) -> Result<T, Error> {
        let mut regs = MaybeUninit::<T>::uninit();

        let mut iov = libc::iovec {
            iov_base: regs.as_mut_ptr() as *mut libc::c_void,
            iov_len: core::mem::size_of_val(&regs),
        };

        unsafe {
            syscalls::syscall!(
                Sysno::ptrace,
                // PTRACE_GETREGS isn't available on aarch64, so we must use
                // PTRACE_GETREGSET instead.
                libc::PTRACE_GETREGSET,
                self.0.as_raw(),
                which,
                &mut iov as *mut _
            )
        }
        .map_err(|err| self.map_err(err))?;

        // PTRACE_GETREGSET modifies the length to the real length of the
        // registers, but we already know the exact number of registers for
        // this architecture.
        debug_assert_eq!(iov.iov_len, core::mem::size_of_val(&regs));

        Ok(unsafe { regs.assume_init() })
    }

    /// Gets the current state of the general purpose registers. Only valid
    /// while the tracee is stopped; the registers are exclusively owned by
    /// the tracer for the duration of the stop.
    pub fn getregs(&self) -> Result<Regs, Error> {
        self.getregset(libc::NT_PRSTATUS)
    }

    /// Resumes the process and transitions it back to a running state,
    /// optionally delivering the signal `sig`.
    pub fn resume<T: Into<Option<Signal>>>(self, sig: T) -> Result<Running, Error> {
        ptrace::cont(self.0, sig).map_err(|err| self.map_nix_err(err))?;
        Ok(Running::new(self.0))
    }

    /// Like `resume`, but arranges for the tracee to be stopped at the next
    /// entry to or exit from a system call.
    pub fn resume_syscall<T: Into<Option<Signal>>>(self, sig: T) -> Result<Running, Error> {
        ptrace::syscall(self.0, sig).map_err(|err| self.map_nix_err(err))?;
        Ok(Running::new(self.0))
    }

    /// Sends `SIGKILL` to the stopped tracee and returns the zombie for
    /// reaping. `SIGKILL` cannot be blocked or intercepted, so the tracee is
    /// guaranteed not to execute another instruction once it is reaped.
    pub fn kill(self) -> Zombie {
        // ESRCH here means the tracee is already gone; either way the only
        // thing left to do is reap it.
        let _ = signal::kill(self.0, Signal::SIGKILL);
        Zombie::new(self.0)
    }
}

/// A running child. The only valid operation is to wait for its next state
/// change.
#[derive(Debug, Hash, Eq, PartialEq)]
pub struct Running(Pid);

impl Running {
    /// Creates a new running process. This is the entry point for a freshly
    /// forked child.
    pub fn new(pid: Pid) -> Self {
        Running(pid)
    }

    /// Blocks until a state change occurs. This transitions the process to
    /// either a stopped state or an exited state, never a running state.
    pub fn wait(self) -> Result<Wait, Error> {
        let status = loop {
            match waitpid(self.0, None) {
                Err(nix::errno::Errno::EINTR) => continue,
                result => break result?,
            }
        };

        Wait::try_from(status)
    }

    /// Like `wait`, but skips past stops other than delivery of `want` by
    /// resuming the tracee, re-injecting any other signal it was about to
    /// receive. This is useful for reliably reaching the initial `SIGSTOP`
    /// a tracee raises against itself, since spurious signals (e.g.
    /// `SIGWINCH`) may arrive first.
    pub fn wait_for_signal(self, want: Signal) -> Result<Wait, Error> {
        let mut running = self;
        loop {
            match running.wait()? {
                Wait::Stopped(stopped, Event::Signal(sig)) if sig == want => {
                    break Ok(Wait::Stopped(stopped, Event::Signal(sig)));
                }
                Wait::Stopped(stopped, Event::Signal(sig)) => {
                    running = stopped.resume(Some(sig))?;
                }
                Wait::Stopped(stopped, _event) => {
                    running = stopped.resume(None)?;
                }
                wait => break Ok(wait),
            }
        }
    }
}

/// A process that is no longer running, but hasn't yet been reaped. The only
/// thing a zombie can do is exit.
#[derive(Debug, Hash, Eq, PartialEq)]
pub struct Zombie(Pid);

impl Zombie {
    /// Creates a new instance.
    fn new(pid: Pid) -> Self {
        Zombie(pid)
    }

    /// Reaps the zombie, blocking until the kernel reports its final status.
    pub fn reap(self) -> ExitStatus {
        loop {
            match waitpid(self.0, None) {
                Ok(WaitStatus::Exited(_, code)) => break ExitStatus::Exited(code),
                Ok(WaitStatus::Signaled(_, sig, coredump)) => {
                    break ExitStatus::Signaled(sig, coredump);
                }
                Ok(_) => {
                    // A stop can still be pending delivery. Let the tracee
                    // run to its death; a pending SIGKILL cannot be blocked
                    // or intercepted.
                    let _ = ptrace::cont(self.0, None);
                }
                Err(nix::errno::Errno::EINTR) => continue,
                Err(_) => break ExitStatus::Exited(1),
            }
        }
    }
}

impl fmt::Display for Zombie {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sets up this process to be traced by its parent and raises a SIGSTOP,
/// guaranteeing the parent observes a stop before any further progress is
/// made. For use in a freshly forked child, before exec.
pub fn traceme_and_stop() -> Result<(), Errno> {
    ptrace::traceme()
        .and_then(|()| signal::raise(Signal::SIGSTOP))
        .map_err(|e| Errno::new(e as i32))?;
    Ok(())
}
