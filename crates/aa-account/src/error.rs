//! Error types of the account and the revert data they map to.

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{Panic, PanicKind, Revert, SolError};

use crate::CallFailure;

/// Revert reason of a first validation that observed a non-zero bootloader balance.
pub const NON_ZERO_HOST_BALANCE: &str = "non-zero host balance";
/// Revert reason of a failed fee transfer to the bootloader.
pub const FEE_PAYMENT_FAILED: &str = "fee payment failed";
/// Revert reason of a lifecycle call that did not come from the bootloader.
pub const ONLY_BOOTLOADER: &str = "Only bootloader can call this method";

/// The current frame cannot pay for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("out of gas")]
pub struct OutOfGas;

impl From<OutOfGas> for Halt {
    fn from(_: OutOfGas) -> Self {
        Self::OutOfGas
    }
}

impl From<OutOfGas> for AccountError {
    fn from(_: OutOfGas) -> Self {
        Self::OutOfGas
    }
}

/// How a contract frame ended when it did not return normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// The frame reverted with the given data. State changes of the frame are discarded.
    Revert(Bytes),
    /// The frame exhausted its gas. State changes of the frame are discarded and no gas is
    /// returned to the caller.
    OutOfGas,
}

impl Halt {
    /// A revert carrying a Solidity `Error(string)` payload.
    pub fn reason(reason: &str) -> Self {
        Self::Revert(Revert { reason: reason.to_string() }.abi_encode().into())
    }

    /// A revert carrying a Solidity `Panic(uint256)` payload.
    pub fn panic(kind: PanicKind) -> Self {
        Self::Revert(Panic { code: U256::from(kind as u32) }.abi_encode().into())
    }
}

/// Failures of the custom account.
///
/// Every variant aborts the current lifecycle call. The bootloader decides what that means for the
/// enclosing transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// The first validation saw a non-zero bootloader balance.
    #[error("authorization failed: non-zero host balance")]
    Authorization,
    /// The nonce holder refused to advance the nonce. Carries its revert data unchanged.
    #[error("nonce registry reverted")]
    Registry(Bytes),
    /// The generic call of the executor reported failure.
    #[error("execution call failed")]
    ExecutionFailed,
    /// The deployer reverted. Carries its revert data unchanged.
    #[error("deployer reverted")]
    DeployerReverted(Bytes),
    /// The fee transfer to the bootloader failed.
    #[error("fee payment failed")]
    Payment,
    /// The direct-entry guard was reached by the bootloader.
    #[error("direct entry reached from the bootloader")]
    ContractViolation,
    /// A lifecycle method was called by someone other than the bootloader.
    #[error("only the bootloader can call this method")]
    NotBootloader,
    /// `reserved[1]` does not fit into 128 bits.
    #[error("value does not fit into 128 bits")]
    ValueOverflow,
    /// Fee computation overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    /// The paymaster input has no selector.
    #[error("paymaster input is shorter than a selector")]
    PaymasterInputTooShort,
    /// The paymaster input selector is not a known flow.
    #[error("unsupported paymaster flow")]
    UnsupportedPaymasterFlow,
    /// The calldata carries a lifecycle selector but its arguments do not decode.
    #[error("malformed calldata")]
    MalformedCalldata,
    /// The paymaster flow input could not be decoded.
    #[error("malformed paymaster input")]
    MalformedPaymasterInput,
    /// The token reverted during the paymaster approval. Carries its revert data unchanged.
    #[error("token reverted")]
    Token(Bytes),
    /// The token returned `false` or garbage from an approval.
    #[error("token approval did not succeed")]
    TokenApprovalFailed,
    /// Gas ran out while the account was running.
    #[error("out of gas")]
    OutOfGas,
}

impl AccountError {
    /// Maps a failed registry call.
    pub fn registry(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Reverted(output) => Self::Registry(output),
            CallFailure::OutOfGas => Self::OutOfGas,
        }
    }

    /// Maps a failed deployer call.
    pub fn deployer(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Reverted(output) => Self::DeployerReverted(output),
            CallFailure::OutOfGas => Self::OutOfGas,
        }
    }

    /// Maps a failed token call.
    pub fn token(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Reverted(output) => Self::Token(output),
            CallFailure::OutOfGas => Self::OutOfGas,
        }
    }

    /// Converts the error into how the account frame ends.
    ///
    /// Reasons become `Error(string)`, assertions and overflows become `Panic(uint256)`,
    /// propagated failures keep the callee's bytes and the executor failure reverts with no data.
    pub fn into_halt(self) -> Halt {
        match self {
            Self::Authorization => Halt::reason(NON_ZERO_HOST_BALANCE),
            Self::Registry(output) | Self::DeployerReverted(output) | Self::Token(output) => {
                Halt::Revert(output)
            }
            Self::ExecutionFailed => Halt::Revert(Bytes::new()),
            Self::Payment => Halt::reason(FEE_PAYMENT_FAILED),
            Self::ContractViolation => Halt::panic(PanicKind::Assert),
            Self::NotBootloader => Halt::reason(ONLY_BOOTLOADER),
            Self::ValueOverflow => Halt::reason("Overflow"),
            Self::ArithmeticOverflow => Halt::panic(PanicKind::UnderOverflow),
            Self::PaymasterInputTooShort => {
                Halt::reason("The standard paymaster input must be at least 4 bytes long")
            }
            Self::UnsupportedPaymasterFlow => Halt::reason("Unsupported paymaster flow"),
            Self::MalformedCalldata | Self::MalformedPaymasterInput => Halt::Revert(Bytes::new()),
            Self::TokenApprovalFailed => {
                Halt::reason("SafeERC20: ERC20 operation did not succeed")
            }
            Self::OutOfGas => Halt::OutOfGas,
        }
    }
}

impl From<AccountError> for Halt {
    fn from(error: AccountError) -> Self {
        error.into_halt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::bytes;

    #[test]
    fn test_reasons_are_solidity_errors() {
        let Halt::Revert(output) = AccountError::Authorization.into_halt() else {
            panic!("authorization failure must revert");
        };
        let revert = Revert::abi_decode(&output).unwrap();
        assert_eq!(revert.reason(), NON_ZERO_HOST_BALANCE);
    }

    #[test]
    fn test_contract_violation_is_assert_panic() {
        let Halt::Revert(output) = AccountError::ContractViolation.into_halt() else {
            panic!("contract violation must revert");
        };
        let panic = Panic::abi_decode(&output).unwrap();
        assert_eq!(panic.kind(), Some(PanicKind::Assert));
    }

    #[test]
    fn test_propagated_failures_are_verbatim() {
        let data = bytes!("deadbeef");
        assert_eq!(AccountError::Registry(data.clone()).into_halt(), Halt::Revert(data.clone()));
        assert_eq!(AccountError::DeployerReverted(data.clone()).into_halt(), Halt::Revert(data));
        assert_eq!(AccountError::ExecutionFailed.into_halt(), Halt::Revert(Bytes::new()));
        assert_eq!(AccountError::OutOfGas.into_halt(), Halt::OutOfGas);
    }
}
