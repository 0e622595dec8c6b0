/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Final status of a process that has been waited on.

use nix::sys::signal::Signal;

/// Describes the result of a process after it has exited.
///
/// This is similar to `std::process::ExitStatus`, but is easier to match
/// against.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum ExitStatus {
    /// Program exited with an exit code.
    Exited(i32),
    /// Program killed by signal, with or without a coredump.
    Signaled(Signal, bool),
}
