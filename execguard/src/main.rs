/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The `execguard` command line tool: run a program under trace control and
//! kill it if it attempts to replace its process image a second time.

use std::io;
use std::process;

use anyhow::Context;
use clap::CommandFactory;
use clap::Parser;
use clap::error::ErrorKind;
use execguard::launch;
use execguard::supervise;
use tracing_subscriber::EnvFilter;

/// Runs PROGRAM under trace control. The program may replace its process
/// image at most once (its own startup); a second execve/execveat gets it
/// killed and the supervisor exits 126. Otherwise the program's own exit
/// status is propagated (128 + signo for signal deaths).
#[derive(Debug, Parser)]
#[command(name = "execguard")]
struct Args {
    /// Path of the program to supervise.
    #[arg(value_name = "PROGRAM")]
    program: String,

    /// Arguments to the supervised program.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(_) => {
            // Usage goes to standard output with exit status 1; no child
            // process is ever created on a usage error.
            println!("{}", Args::command().render_usage());
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let tracee = launch(&args.program, &args.args)
        .with_context(|| format!("failed to launch {}", args.program))?;
    let outcome = supervise(tracee).context("trace loop failed")?;

    process::exit(outcome.exit_code());
}
