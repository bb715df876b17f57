use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolInterface};

use super::{require_system_call, SystemContract};
use crate::{
    constants::storage::NONCE_HOLDER_RAW_NONCES_SLOT,
    interfaces::INonceHolder::{self, INonceHolderCalls},
    vm::Frame,
    Halt, Host, StorageSlot,
};

/// Revert reason of a nonce increment whose expected nonce is not the current one.
pub const INCORRECT_NONCE: &str = "Incorrect nonce";

/// Keeps the minimal nonce of every account.
///
/// Nonces below the minimal nonce count as used. Only the account itself can move its minimal
/// nonce, one step at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonceHolder;

impl NonceHolder {
    /// Storage slot holding the minimal nonce of `account`.
    pub fn min_nonce_slot(account: Address) -> StorageSlot {
        StorageSlot::of_address(account, NONCE_HOLDER_RAW_NONCES_SLOT)
    }
}

impl SystemContract for NonceHolder {
    fn name(&self) -> &'static str {
        "NonceHolder"
    }

    fn call(&self, frame: &mut Frame<'_>, input: &Bytes) -> Result<Bytes, Halt> {
        let call = INonceHolderCalls::abi_decode(input).map_err(|_| Halt::Revert(Bytes::new()))?;

        match call {
            INonceHolderCalls::getMinNonce(call) => {
                let nonce = frame.sload(Self::min_nonce_slot(call.account))?;
                Ok(INonceHolder::getMinNonceCall::abi_encode_returns(&nonce).into())
            }
            INonceHolderCalls::incrementMinNonceIfEquals(call) => {
                require_system_call(frame)?;
                let slot = Self::min_nonce_slot(frame.caller());
                let nonce = frame.sload(slot)?;
                if nonce != call.expectedNonce {
                    return Err(Halt::reason(INCORRECT_NONCE));
                }
                frame.sstore(slot, nonce + U256::from(1))?;
                Ok(Bytes::new())
            }
            INonceHolderCalls::isNonceUsed(call) => {
                let nonce = frame.sload(Self::min_nonce_slot(call.account))?;
                let used = call.nonce < nonce;
                Ok(INonceHolder::isNonceUsedCall::abi_encode_returns(&used).into())
            }
        }
    }
}
