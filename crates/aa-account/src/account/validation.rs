use alloy_primitives::{FixedBytes, B256, U256};
use alloy_sol_types::SolCall;

use super::RuleBreakerAccount;
use crate::{
    constants::{
        magic::ACCOUNT_VALIDATION_SUCCESS_MAGIC,
        storage::RULES_BROKEN_COUNTER_SLOT,
        system::{BOOTLOADER_FORMAL_ADDRESS, NONCE_HOLDER_ADDRESS},
    },
    interfaces::INonceHolder,
    system_call_with_propagated_revert, AccountError, Host, StorageSlot, Transaction,
};

/// Whether the next validation still breaks the isolation rules.
///
/// The transition is one-way: nothing resets the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// No validation has succeeded yet. Validation reads the bootloader balance.
    FirstCall,
    /// At least one validation succeeded. Validation only advances the nonce.
    SteadyState,
}

impl ValidationMode {
    /// The mode implied by the value of `rulesBrokenCounter`.
    pub fn from_counter(counter: U256) -> Self {
        if counter.is_zero() {
            Self::FirstCall
        } else {
            Self::SteadyState
        }
    }
}

impl RuleBreakerAccount {
    /// Reads `rulesBrokenCounter`.
    pub fn rules_broken_counter<H: Host + ?Sized>(
        &self,
        host: &mut H,
    ) -> Result<U256, AccountError> {
        host.sload(StorageSlot::Direct(RULES_BROKEN_COUNTER_SLOT)).map_err(AccountError::from)
    }

    /// Validates `tx` and returns the success magic.
    ///
    /// In [`ValidationMode::FirstCall`] the bootloader must hold no balance. The counter is bumped
    /// whether or not that check ran, then the nonce is advanced. Any failure reverts the frame, so
    /// neither the counter nor the nonce move unless the whole call succeeds.
    pub fn validate_transaction<H: Host + ?Sized>(
        &self,
        host: &mut H,
        _tx_hash: B256,
        _suggested_signed_hash: B256,
        tx: &Transaction,
    ) -> Result<FixedBytes<4>, AccountError> {
        let counter = self.rules_broken_counter(host)?;

        if ValidationMode::from_counter(counter) == ValidationMode::FirstCall {
            let balance = host.balance(BOOTLOADER_FORMAL_ADDRESS)?;
            if !balance.is_zero() {
                return Err(AccountError::Authorization);
            }
        }

        let counter = counter.checked_add(U256::from(1)).ok_or(AccountError::ArithmeticOverflow)?;
        host.sstore(StorageSlot::Direct(RULES_BROKEN_COUNTER_SLOT), counter)?;

        self.advance_nonce(host, tx)?;

        Ok(ACCOUNT_VALIDATION_SUCCESS_MAGIC)
    }

    /// Asks the nonce holder to move the minimal nonce past `tx.nonce`.
    ///
    /// The call forwards all remaining gas; a revert of the nonce holder is returned unchanged.
    pub(super) fn advance_nonce<H: Host + ?Sized>(
        &self,
        host: &mut H,
        tx: &Transaction,
    ) -> Result<(), AccountError> {
        let input = INonceHolder::incrementMinNonceIfEqualsCall { expectedNonce: tx.nonce };
        system_call_with_propagated_revert(
            host,
            NONCE_HOLDER_ADDRESS,
            U256::ZERO,
            input.abi_encode().into(),
        )
        .map_err(AccountError::registry)?;
        Ok(())
    }
}
