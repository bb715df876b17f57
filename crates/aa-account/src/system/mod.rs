//! System contracts reachable from accounts.
//!
//! System contracts run with privileged access to the VM and most of their entry points only
//! accept calls that carry the system flag.

mod deployer;
mod nonce_holder;

pub use deployer::{create2_address, ContractDeployer, CODE_HASH_NON_ZERO, UNKNOWN_CODE_HASH};
pub use nonce_holder::{NonceHolder, INCORRECT_NONCE};

use alloy_primitives::Bytes;

use crate::{vm::Frame, Halt, Host};

/// Revert reason of a system-only entry point called without the system flag.
pub const SYSTEM_CALL_FLAG_REQUIRED: &str = "This method require system call flag";

/// A contract that runs with access to the VM internals.
pub(crate) trait SystemContract: core::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn call(&self, frame: &mut Frame<'_>, input: &Bytes) -> Result<Bytes, Halt>;
}

fn require_system_call(frame: &Frame<'_>) -> Result<(), Halt> {
    if !frame.is_system_call() {
        return Err(Halt::reason(SYSTEM_CALL_FLAG_REQUIRED));
    }
    Ok(())
}
