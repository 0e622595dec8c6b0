/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! General purpose registers, as retrieved at a trace stop.

pub use libc::user_regs_struct as Regs;

/// Returns the number of the syscall the tracee is executing. Only
/// meaningful while the tracee is stopped at a syscall boundary; at an entry
/// stop this is the syscall about to be executed.
#[cfg(target_arch = "x86_64")]
pub fn syscall_number(regs: &Regs) -> u64 {
    // The kernel clobbers rax with the (in-progress) return value; orig_rax
    // preserves the syscall number across the entire syscall.
    regs.orig_rax
}

/// Returns the number of the syscall the tracee is executing. Only
/// meaningful while the tracee is stopped at a syscall boundary; at an entry
/// stop this is the syscall about to be executed.
#[cfg(target_arch = "aarch64")]
pub fn syscall_number(regs: &Regs) -> u64 {
    // The syscall number lives in x8 and is not clobbered by the kernel.
    regs.regs[8]
}
