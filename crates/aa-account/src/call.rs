//! Message call inputs and outcomes.

use alloy_primitives::{Address, Bytes, U256};

use crate::{Host, OutOfGas};

/// Inputs of a message call issued by a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInputs {
    /// The callee.
    pub target: Address,
    /// Base token value moved from the caller to the callee.
    pub value: U256,
    /// Calldata.
    pub input: Bytes,
    /// Gas handed to the callee.
    pub gas_limit: u64,
    /// Whether the call carries the system flag. System contracts only accept calls with it.
    pub is_system: bool,
}

impl CallInputs {
    /// A regular call.
    pub const fn new(target: Address, value: U256, input: Bytes, gas_limit: u64) -> Self {
        Self { target, value, input, gas_limit, is_system: false }
    }

    /// A call carrying the system flag.
    pub const fn system(target: Address, value: U256, input: Bytes, gas_limit: u64) -> Self {
        Self { target, value, input, gas_limit, is_system: true }
    }
}

/// How a message call ended, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The callee returned normally.
    Success {
        /// Return data.
        output: Bytes,
        /// Gas spent by the callee.
        gas_used: u64,
    },
    /// The callee reverted.
    Revert {
        /// Revert data.
        output: Bytes,
        /// Gas spent by the callee.
        gas_used: u64,
    },
    /// The callee ran out of gas.
    OutOfGas {
        /// Gas spent by the callee, always its whole limit.
        gas_used: u64,
    },
}

impl CallOutcome {
    /// Whether the call succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Gas spent by the callee.
    pub const fn gas_used(&self) -> u64 {
        match self {
            Self::Success { gas_used, .. } |
            Self::Revert { gas_used, .. } |
            Self::OutOfGas { gas_used } => *gas_used,
        }
    }

    /// Return or revert data. Empty when the callee ran out of gas.
    pub fn output(&self) -> &Bytes {
        static EMPTY: Bytes = Bytes::new();
        match self {
            Self::Success { output, .. } | Self::Revert { output, .. } => output,
            Self::OutOfGas { .. } => &EMPTY,
        }
    }

    /// Converts the outcome into the return data of a successful call.
    pub fn into_result(self) -> Result<Bytes, CallFailure> {
        match self {
            Self::Success { output, .. } => Ok(output),
            Self::Revert { output, .. } => Err(CallFailure::Reverted(output)),
            Self::OutOfGas { .. } => Err(CallFailure::OutOfGas),
        }
    }
}

/// Why a call whose failure is propagated did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// The callee reverted with these bytes.
    Reverted(Bytes),
    /// The callee ran out of gas, or the caller could not pay for the call.
    OutOfGas,
}

impl From<OutOfGas> for CallFailure {
    fn from(_: OutOfGas) -> Self {
        Self::OutOfGas
    }
}

/// How a call whose return data is dropped ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// The callee returned normally.
    Success,
    /// The callee reverted.
    Reverted,
    /// The callee ran out of gas.
    OutOfGas,
}

impl CallStatus {
    /// Whether the call succeeded.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<&CallOutcome> for CallStatus {
    fn from(outcome: &CallOutcome) -> Self {
        match outcome {
            CallOutcome::Success { .. } => Self::Success,
            CallOutcome::Revert { .. } => Self::Reverted,
            CallOutcome::OutOfGas { .. } => Self::OutOfGas,
        }
    }
}

/// Performs a system call forwarding all remaining gas and returns the callee's output.
///
/// A revert of the callee comes back as [`CallFailure::Reverted`] holding the callee's bytes
/// unchanged, so the caller can re-raise it verbatim.
pub fn system_call_with_propagated_revert<H: Host + ?Sized>(
    host: &mut H,
    target: Address,
    value: U256,
    input: Bytes,
) -> Result<Bytes, CallFailure> {
    let gas_limit = host.gas_left();
    host.call(CallInputs::system(target, value, input, gas_limit))?.into_result()
}

/// Performs a regular call forwarding all remaining gas and reports how the callee ended.
///
/// The return data of the callee is discarded. A caller that cannot pay for the call gets
/// [`OutOfGas`] instead of a status.
pub fn call_discarding_output<H: Host + ?Sized>(
    host: &mut H,
    target: Address,
    value: U256,
    input: Bytes,
) -> Result<CallStatus, OutOfGas> {
    let gas_limit = host.gas_left();
    let outcome = host.call(CallInputs::new(target, value, input, gas_limit))?;
    Ok(CallStatus::from(&outcome))
}
