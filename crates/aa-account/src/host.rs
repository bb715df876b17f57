use alloy_primitives::{keccak256, Address, Bytes, U256};
use auto_impl::auto_impl;

use crate::{CallInputs, CallOutcome, Halt, OutOfGas};

/// The view a running contract has of the chain.
///
/// Every method that touches state charges gas from the current frame and fails with [`OutOfGas`]
/// once the frame cannot pay for it.
#[auto_impl(&mut, Box)]
pub trait Host {
    /// Address of the running contract.
    fn address(&self) -> Address;

    /// The caller of the running contract (`msg.sender`).
    fn caller(&self) -> Address;

    /// Value attached to the current call (`msg.value`).
    fn call_value(&self) -> U256;

    /// Whether the current call carries the system flag.
    fn is_system_call(&self) -> bool;

    /// Gas left in the current frame.
    fn gas_left(&self) -> u64;

    /// Base token balance of `address`.
    fn balance(&mut self, address: Address) -> Result<U256, OutOfGas>;

    /// Reads a slot of the running contract's storage.
    fn sload(&mut self, slot: StorageSlot) -> Result<U256, OutOfGas>;

    /// Writes a slot of the running contract's storage.
    fn sstore(&mut self, slot: StorageSlot, value: U256) -> Result<(), OutOfGas>;

    /// Performs a message call. The caller of the new frame is the running contract.
    ///
    /// Fails with [`OutOfGas`] when the running contract cannot pay for issuing the call. How the
    /// callee ended is reported in the [`CallOutcome`].
    fn call(&mut self, inputs: CallInputs) -> Result<CallOutcome, OutOfGas>;
}

/// A contract whose code is native Rust.
///
/// Contracts hold no state of their own; everything persistent lives in the storage reachable
/// through the [`Host`].
pub trait Contract: core::fmt::Debug + Send + Sync {
    /// Name of the contract, used for logging and as its code marker.
    fn name(&self) -> &'static str;

    /// Runs the contract on `input`.
    fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, Halt>;
}

/// A storage slot together with how it was derived.
///
/// Mapping slots remember their key so that the validation tracer can tell slots that belong to an
/// account apart from slots that belong to someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageSlot {
    /// A plain slot index.
    Direct(U256),
    /// The slot of `key` in a Solidity mapping declared at `slot`.
    Mapping {
        /// The mapping key.
        key: U256,
        /// The slot the mapping is declared at.
        slot: U256,
    },
}

impl StorageSlot {
    /// The slot of `address` in a mapping declared at `slot`.
    pub fn of_address(address: Address, slot: U256) -> Self {
        Self::Mapping { key: address_to_word(address), slot }
    }

    /// The storage key the slot resolves to, `keccak256(key ++ slot)` for mapping slots.
    pub fn resolve(&self) -> U256 {
        match *self {
            Self::Direct(slot) => slot,
            Self::Mapping { key, slot } => {
                let mut preimage = [0u8; 64];
                preimage[..32].copy_from_slice(&key.to_be_bytes::<32>());
                preimage[32..].copy_from_slice(&slot.to_be_bytes::<32>());
                U256::from_be_bytes(keccak256(preimage).0)
            }
        }
    }
}

/// Left-pads an address into a word.
pub fn address_to_word(address: Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

/// Truncates a word into an address, keeping the low 20 bytes.
pub fn word_to_address(word: U256) -> Address {
    Address::from_word(word.to_be_bytes::<32>().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_address_word_roundtrip_truncates_high_bits() {
        let account = address!("00000000000000000000000000000000000a11ce");
        let word = address_to_word(account) | (U256::from(1) << 200usize);
        assert_eq!(word_to_address(word), account);
    }

    #[test]
    fn test_mapping_slot_matches_solidity_layout() {
        let account = address!("00000000000000000000000000000000000a11ce");
        let slot = StorageSlot::of_address(account, U256::ZERO);

        let mut preimage = [0u8; 64];
        preimage[12..32].copy_from_slice(account.as_slice());
        assert_eq!(slot.resolve(), U256::from_be_bytes(keccak256(preimage).0));
        assert_eq!(StorageSlot::Direct(U256::from(7)).resolve(), U256::from(7));
    }
}
