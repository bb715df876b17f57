use core::convert::Infallible;

use alloy_primitives::{Address, Bytes, B256, U256};
use revm::{
    database::{AccountState, CacheDB, DbAccount, EmptyDB},
    primitives::KECCAK_EMPTY,
    state::Bytecode,
};

/// World state of the VM: balances, contract storage and code markers.
#[derive(Debug, Default, Clone, derive_more::Deref, derive_more::DerefMut)]
pub struct WorldState {
    #[deref]
    #[deref_mut]
    db: CacheDB<EmptyDB>,
}

impl WorldState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `WorldState` from a `CacheDB`.
    pub fn from_cache_db(db: CacheDB<EmptyDB>) -> Self {
        Self { db }
    }

    /// Base token balance of `address`.
    pub fn balance(&mut self, address: Address) -> U256 {
        self.account(address).info.balance
    }

    /// Sets the base token balance of `address`.
    pub fn set_balance(&mut self, address: Address, balance: U256) {
        let account = self.account(address);
        account.info.balance = balance;
        account.account_state = AccountState::None;
    }

    /// Sets the base token balance of `address`.
    pub fn with_balance(mut self, address: Address, balance: U256) -> Self {
        self.set_balance(address, balance);
        self
    }

    /// Moves `value` from `from` to `to`. Returns `false`, leaving the state untouched, when `from`
    /// cannot afford it.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> bool {
        let Some(remaining) = self.balance(from).checked_sub(value) else {
            return false;
        };
        self.set_balance(from, remaining);
        let credited = self.balance(to).saturating_add(value);
        self.set_balance(to, credited);
        true
    }

    /// Reads a storage slot.
    pub fn storage(&mut self, address: Address, slot: U256) -> U256 {
        self.account(address).storage.get(&slot).copied().unwrap_or_default()
    }

    /// Writes a storage slot.
    pub fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        let account = self.account(address);
        account.storage.insert(slot, value);
        account.account_state = AccountState::None;
    }

    /// Code hash of `address`, [`KECCAK_EMPTY`] for accounts without code.
    pub fn code_hash(&mut self, address: Address) -> B256 {
        self.account(address).info.code_hash
    }

    /// Whether `address` has code.
    pub fn has_code(&mut self, address: Address) -> bool {
        let code_hash = self.code_hash(address);
        code_hash != KECCAK_EMPTY && !code_hash.is_zero()
    }

    /// Sets the code of `address` and returns its hash.
    pub fn set_code(&mut self, address: Address, code: Bytes) -> B256 {
        let bytecode = Bytecode::new_legacy(code);
        let code_hash = bytecode.hash_slow();
        let account = self.account(address);
        account.info.code = Some(bytecode);
        account.info.code_hash = code_hash;
        account.account_state = AccountState::None;
        code_hash
    }

    fn account(&mut self, address: Address) -> &mut DbAccount {
        into_ok(self.db.load_account(address))
    }
}

fn into_ok<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    #[test]
    fn test_transfer_moves_value_only_when_affordable() {
        let mut state = WorldState::new().with_balance(ALICE, U256::from(10));

        assert!(state.transfer(ALICE, BOB, U256::from(4)));
        assert_eq!(state.balance(ALICE), U256::from(6));
        assert_eq!(state.balance(BOB), U256::from(4));

        assert!(!state.transfer(ALICE, BOB, U256::from(7)));
        assert_eq!(state.balance(ALICE), U256::from(6));
        assert_eq!(state.balance(BOB), U256::from(4));
    }

    #[test]
    fn test_code_marks_contracts() {
        let mut state = WorldState::new();
        assert!(!state.has_code(ALICE));

        let code_hash = state.set_code(ALICE, Bytes::from_static(b"contract"));
        assert!(state.has_code(ALICE));
        assert_eq!(state.code_hash(ALICE), code_hash);
    }

    #[test]
    fn test_storage_defaults_to_zero() {
        let mut state = WorldState::new();
        assert_eq!(state.storage(ALICE, U256::from(1)), U256::ZERO);
        state.set_storage(ALICE, U256::from(1), U256::from(5));
        assert_eq!(state.storage(ALICE, U256::from(1)), U256::from(5));
    }
}
