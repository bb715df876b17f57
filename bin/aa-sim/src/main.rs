//! `aa-sim` runs account-abstraction transaction scenarios.
//!
//! A scenario installs rule-breaking accounts, funds them and sends their transactions through the
//! in-memory bootloader, reporting how each transaction went through validation, fee payment and
//! execution.

use clap::Parser;

mod cmd;
pub use cmd::*;

/// Shared argument groups, scenario loading and output formatting
pub mod common;
/// The `encode` command
pub mod encode;
/// The `run` command
pub mod run;

fn main() -> Result<(), Error> {
    exit_on_panic();
    MainCmd::parse().run().inspect_err(|e| eprintln!("{e}"))
}

/// Prints a backtrace and exits with status 1 when any thread panics.
fn exit_on_panic() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        eprintln!("{}", std::backtrace::Backtrace::capture());
        default_hook(info);
        std::process::exit(1);
    }));
}
