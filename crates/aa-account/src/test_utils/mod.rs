//! Test utilities for the custom account.

mod contracts;
mod harness;

pub use contracts::*;
pub use harness::*;
