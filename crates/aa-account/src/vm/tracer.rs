//! Isolation rules for account validation.
//!
//! A transaction that fails validation costs its sender nothing, so validation must not depend on
//! state that other accounts can change cheaply. While `validateTransaction` runs, the tracer only
//! lets an account touch its own storage, slots derived from its address, and storage the operator
//! explicitly trusts.

use std::collections::HashSet;

use alloy_primitives::{Address, U256};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    address_to_word,
    constants::{
        storage::BASE_TOKEN_BALANCE_SLOT,
        system::{
            BOOTLOADER_FORMAL_ADDRESS, CONTRACT_DEPLOYER_ADDRESS, L2_BASE_TOKEN_ADDRESS,
            MSG_VALUE_SIMULATOR_ADDRESS, SYSTEM_CONTEXT_ADDRESS,
        },
    },
    StorageSlot,
};

bitflags! {
    /// Summary of what a validation touched.
    ///
    /// Bits 0-2: allowed storage classes
    /// Bits 3-6: violations
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ValidationAccess: u8 {
        // Allowed accesses (bits 0-2)
        /// Storage of the account itself
        const OWN_STORAGE = 1 << 0;
        /// Slots keyed by the account address in someone else's storage
        const ACCOUNT_DERIVED_STORAGE = 1 << 1;
        /// Trusted addresses or slots, or base token reads by privileged system contracts
        const TRUSTED_STORAGE = 1 << 2;

        // Violations (bits 3-6)
        /// Storage that belongs to somebody else
        const FOREIGN_STORAGE = 1 << 3;
        /// Base token balance of somebody else
        const FOREIGN_BALANCE = 1 << 4;
        /// Call to an address without code
        const CODELESS_CALL = 1 << 5;
        /// A frame ran out of gas
        const OUT_OF_GAS = 1 << 6;
    }
}

impl ValidationAccess {
    /// Mask for all violation flags (bits 3-6).
    const VIOLATION_MASK: u8 = 0b0111_1000;

    /// Checks if any rule was violated.
    pub fn has_violation(self) -> bool {
        (self.bits() & Self::VIOLATION_MASK) != 0
    }

    /// Checks if the balance of another account was read.
    pub fn has_foreign_balance_access(self) -> bool {
        self.contains(Self::FOREIGN_BALANCE)
    }

    /// Returns only the violation portion.
    pub fn violations_only(self) -> Self {
        Self::from_bits_truncate(self.bits() & Self::VIOLATION_MASK)
    }
}

/// A broken validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ViolatedValidationRule {
    /// Storage of another account was accessed.
    #[error("touched disallowed storage slot {1:#x} of {0}")]
    TouchedDisallowedStorageSlots(Address, U256),
    /// A contract without code was called.
    #[error("called contract with no code: {0}")]
    CalledContractWithNoCode(Address),
    /// Validation ran out of gas. Carries the validation gas limit.
    #[error("took too many computational gas, limit {0}")]
    TookTooManyComputationalGas(u64),
}

/// What the tracer needs to know about the validation it watches.
#[derive(Debug, Clone, Default)]
pub struct ValidationParams {
    /// The account being validated.
    pub user_address: Address,
    /// Contracts whose whole storage may be read.
    pub trusted_addresses: HashSet<Address>,
    /// Individual storage keys that may be read.
    pub trusted_slots: HashSet<(Address, U256)>,
    /// Gas limit of the validation, reported when it runs out.
    pub gas_limit: u64,
    /// Whether a violation stops the validation.
    pub stop_on_violation: bool,
}

/// What the tracer observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Everything that was touched.
    pub accesses: ValidationAccess,
    /// The first violated rule.
    pub violation: Option<ViolatedValidationRule>,
}

/// Watches the storage reads and calls of an account validation.
#[derive(Debug, Clone)]
pub struct ValidationTracer {
    params: ValidationParams,
    /// Resolved mapping slots keyed by the user, directly or through nested mappings.
    derived_slots: HashSet<U256>,
    accesses: ValidationAccess,
    validation_error: Option<ViolatedValidationRule>,
}

impl ValidationTracer {
    /// Creates a tracer for the validation described by `params`.
    pub fn new(params: ValidationParams) -> Self {
        Self {
            params,
            derived_slots: HashSet::default(),
            accesses: ValidationAccess::empty(),
            validation_error: None,
        }
    }

    /// Records that `caller`, running as `address`, accessed `slot` of `address`.
    pub fn on_storage_access(&mut self, address: Address, caller: Address, slot: &StorageSlot) {
        match self.classify(address, caller, slot) {
            Some(access) => self.accesses.insert(access),
            None => {
                self.accesses.insert(ValidationAccess::FOREIGN_STORAGE);
                self.set_error(ViolatedValidationRule::TouchedDisallowedStorageSlots(
                    address,
                    slot.resolve(),
                ));
            }
        }
    }

    /// Records that the frame running as `reader` read the balance of `owner`.
    ///
    /// Balances live in the base token storage, so this is a read of the base token balance
    /// mapping performed on behalf of `reader`.
    pub fn on_balance_read(&mut self, reader: Address, owner: Address) {
        let slot = StorageSlot::of_address(owner, BASE_TOKEN_BALANCE_SLOT);
        if self.classify(L2_BASE_TOKEN_ADDRESS, reader, &slot).is_none() {
            self.accesses.insert(ValidationAccess::FOREIGN_BALANCE);
        }
        self.on_storage_access(L2_BASE_TOKEN_ADDRESS, reader, &slot);
    }

    /// Records a call to `target`.
    pub fn on_call(&mut self, target: Address, has_code: bool) {
        if target != self.params.user_address && !has_code {
            self.accesses.insert(ValidationAccess::CODELESS_CALL);
            self.set_error(ViolatedValidationRule::CalledContractWithNoCode(target));
        }
    }

    /// Records that a frame exhausted its gas. Running out once means running out for the whole
    /// validation.
    pub fn on_out_of_gas(&mut self) {
        self.accesses.insert(ValidationAccess::OUT_OF_GAS);
        self.set_error(ViolatedValidationRule::TookTooManyComputationalGas(self.params.gas_limit));
    }

    /// Whether the validation must not go on.
    pub fn should_stop(&self) -> bool {
        self.params.stop_on_violation && self.validation_error.is_some()
    }

    /// The first violated rule.
    pub fn validation_error(&self) -> Option<&ViolatedValidationRule> {
        self.validation_error.as_ref()
    }

    /// Everything touched so far.
    pub const fn accesses(&self) -> ValidationAccess {
        self.accesses
    }

    /// Consumes the tracer into its report.
    pub fn into_report(self) -> ValidationReport {
        ValidationReport { accesses: self.accesses, violation: self.validation_error }
    }

    /// Decides which allowed class an access belongs to, `None` when it is disallowed.
    fn classify(
        &mut self,
        address: Address,
        caller: Address,
        slot: &StorageSlot,
    ) -> Option<ValidationAccess> {
        let user = self.params.user_address;
        let key = slot.resolve();

        if address == user {
            return Some(ValidationAccess::OWN_STORAGE);
        }
        if key == address_to_word(user) {
            return Some(ValidationAccess::ACCOUNT_DERIVED_STORAGE);
        }
        if let StorageSlot::Mapping { key: mapping_key, slot: mapping_slot } = *slot {
            if mapping_key == address_to_word(user) || self.derived_slots.contains(&mapping_slot) {
                self.derived_slots.insert(key);
                return Some(ValidationAccess::ACCOUNT_DERIVED_STORAGE);
            }
        }
        if self.params.trusted_addresses.contains(&address) ||
            self.params.trusted_slots.contains(&(address, key))
        {
            return Some(ValidationAccess::TRUSTED_STORAGE);
        }
        let privileged_caller = caller == MSG_VALUE_SIMULATOR_ADDRESS ||
            caller == CONTRACT_DEPLOYER_ADDRESS ||
            caller == BOOTLOADER_FORMAL_ADDRESS;
        if address == L2_BASE_TOKEN_ADDRESS && privileged_caller {
            return Some(ValidationAccess::TRUSTED_STORAGE);
        }
        // chain id
        if address == SYSTEM_CONTEXT_ADDRESS && key.is_zero() {
            return Some(ValidationAccess::TRUSTED_STORAGE);
        }
        None
    }

    fn set_error(&mut self, error: ViolatedValidationRule) {
        if self.validation_error.is_none() {
            debug!(
                target: "aa_account::validation",
                account = %self.params.user_address,
                %error,
                "Validation rule violated"
            );
            self.validation_error = Some(error);
        }
    }
}
