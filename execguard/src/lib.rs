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

//! Runs a target program under trace control and enforces a single policy:
//! the supervised process may replace its process image (execve/execveat) at
//! most once, for its own initial image load. A second replacement is treated
//! as a re-exec attack and the tracee is killed before the replacement
//! executes.
//!
//! The supervisor is strictly synchronous: a single tracee, one resume
//! paired with exactly one blocking wait, no threads.

mod launcher;
mod policy;
mod supervisor;

pub use launcher::LaunchError;
pub use launcher::launch;
pub use policy::Decision;
pub use policy::ExecPolicy;
pub use supervisor::Outcome;
pub use supervisor::supervise;
