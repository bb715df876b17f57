//! Constants shared by the account, the system contracts and the bootloader.
//!
//! It groups the constants by concern as sub-modules.

/// Well-known addresses of the system contracts and the bootloader.
pub mod system {
    use alloy_primitives::{address, Address};

    /// The formal address the bootloader uses as `msg.sender` for every lifecycle call.
    pub const BOOTLOADER_FORMAL_ADDRESS: Address =
        address!("0000000000000000000000000000000000008001");
    /// The contract that keeps the minimal nonce of every account.
    pub const NONCE_HOLDER_ADDRESS: Address = address!("0000000000000000000000000000000000008003");
    /// The contract used for contract deployment.
    pub const CONTRACT_DEPLOYER_ADDRESS: Address =
        address!("0000000000000000000000000000000000008006");
    /// The contract that moves base token value on behalf of callers.
    pub const MSG_VALUE_SIMULATOR_ADDRESS: Address =
        address!("0000000000000000000000000000000000008009");
    /// The base token contract. Account balances live in its storage.
    pub const L2_BASE_TOKEN_ADDRESS: Address =
        address!("000000000000000000000000000000000000800a");
    /// The system context contract.
    pub const SYSTEM_CONTEXT_ADDRESS: Address =
        address!("000000000000000000000000000000000000800b");

    /// Addresses up to and including this one are reserved for system contracts.
    pub const MAX_SYSTEM_CONTRACT_ADDRESS: Address =
        address!("000000000000000000000000000000000000ffff");
}

/// Storage layout of the system contracts and the account.
pub mod storage {
    use alloy_primitives::U256;

    /// Slot of the `balance` mapping in the base token contract.
    pub const BASE_TOKEN_BALANCE_SLOT: U256 = U256::ZERO;
    /// Slot of the `rawNonces` mapping in the nonce holder.
    pub const NONCE_HOLDER_RAW_NONCES_SLOT: U256 = U256::ZERO;
    /// Slot of the `rulesBrokenCounter` field of the account.
    pub const RULES_BROKEN_COUNTER_SLOT: U256 = U256::ZERO;
}

/// Magic values returned by successful validation calls.
pub mod magic {
    use alloy_primitives::FixedBytes;
    use alloy_sol_types::SolCall;

    use crate::interfaces::{IAccount, IPaymaster};

    /// Returned by an account whose `validateTransaction` accepted the transaction. It is the
    /// selector of `validateTransaction` itself.
    pub const ACCOUNT_VALIDATION_SUCCESS_MAGIC: FixedBytes<4> =
        FixedBytes(IAccount::validateTransactionCall::SELECTOR);
    /// Returned by a paymaster that agreed to pay for a transaction.
    pub const PAYMASTER_VALIDATION_SUCCESS_MAGIC: FixedBytes<4> =
        FixedBytes(IPaymaster::validateAndPayForPaymasterTransactionCall::SELECTOR);
}

/// Gas schedule of the in-memory VM.
pub mod gas {
    use revm::interpreter::gas;

    /// Costs inherited from `revm`.
    pub use gas::{COLD_ACCOUNT_ACCESS_COST, COLD_SLOAD_COST, SSTORE_RESET, SSTORE_SET};

    /// Cost of reading the balance of an account.
    pub const BALANCE: u64 = COLD_ACCOUNT_ACCESS_COST;
    /// Cost of reading a storage slot.
    pub const SLOAD: u64 = COLD_SLOAD_COST;
    /// Base cost of a message call.
    pub const CALL: u64 = COLD_ACCOUNT_ACCESS_COST;
    /// Additional cost of a message call that carries value.
    pub const CALL_VALUE: u64 = gas::CALLVALUE;
    /// Cost of deploying a contract from known code.
    pub const DEPLOY: u64 = gas::CREATE;

    /// Maximum depth of nested message calls.
    pub const CALL_STACK_LIMIT: usize = 1024;

    /// Default gas limit of the account validation step.
    pub const DEFAULT_VALIDATION_GAS_LIMIT: u64 = 300_000;
}
