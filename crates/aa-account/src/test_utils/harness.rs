use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{Panic, PanicKind, Revert, SolCall, SolError};

use crate::{
    constants::{storage::RULES_BROKEN_COUNTER_SLOT, system::NONCE_HOLDER_ADDRESS},
    interfaces::{IAccount, IPaymasterFlow},
    system::NonceHolder,
    Bootloader, BootloaderConfig, CallOutcome, StorageSlot, Transaction, Vm,
};

/// Address the rule-breaking account is installed at by [`bootloader_with_account`].
pub const ACCOUNT: Address = address!("0000000000000000000000000000000000010000");
/// An externally owned address that is not the bootloader.
pub const STRANGER: Address = address!("00000000000000000000000000000000000b0b00");
/// Gas given to lifecycle calls made through [`lifecycle_call`].
pub const TEST_GAS_LIMIT: u64 = 10_000_000;

/// A bootloader with the rule-breaking account installed at [`ACCOUNT`] holding `balance`.
pub fn bootloader_with_account(config: BootloaderConfig, balance: U256) -> Bootloader {
    let mut bootloader = Bootloader::new(config);
    let vm = bootloader.vm_mut();
    vm.install_account(ACCOUNT);
    vm.set_balance(ACCOUNT, balance);
    bootloader
}

/// A bootloader that records violated validation rules without enforcing them.
pub fn permissive_bootloader(balance: U256) -> Bootloader {
    bootloader_with_account(BootloaderConfig::default().with_validation_rules(false), balance)
}

/// A transaction of [`ACCOUNT`] to `to` with enough gas and a zero fee.
pub fn account_tx(to: Address, nonce: u64) -> Transaction {
    Transaction::new(ACCOUNT, to).with_nonce(nonce).with_gas(5_000_000, 0)
}

/// Calls `account` with `call` from `caller`, outside of the bootloader.
pub fn lifecycle_call<C: SolCall>(
    vm: &mut Vm,
    caller: Address,
    account: Address,
    call: &C,
) -> CallOutcome {
    vm.transact_call(caller, account, U256::ZERO, call.abi_encode().into(), TEST_GAS_LIMIT)
}

/// `validateTransaction(tx)` calldata.
pub fn validate_call(tx: &Transaction) -> IAccount::validateTransactionCall {
    let hash = tx.hash();
    IAccount::validateTransactionCall {
        txHash: hash,
        suggestedSignedHash: hash,
        transaction: tx.to_abi(),
    }
}

/// `executeTransaction(tx)` calldata.
pub fn execute_call(tx: &Transaction) -> IAccount::executeTransactionCall {
    let hash = tx.hash();
    IAccount::executeTransactionCall {
        txHash: hash,
        suggestedSignedHash: hash,
        transaction: tx.to_abi(),
    }
}

/// `payForTransaction(tx)` calldata.
pub fn pay_call(tx: &Transaction) -> IAccount::payForTransactionCall {
    let hash = tx.hash();
    IAccount::payForTransactionCall {
        txHash: hash,
        suggestedSignedHash: hash,
        transaction: tx.to_abi(),
    }
}

/// `prepareForPaymaster(tx)` calldata.
pub fn prepare_call(tx: &Transaction) -> IAccount::prepareForPaymasterCall {
    let hash = tx.hash();
    IAccount::prepareForPaymasterCall {
        txHash: hash,
        possibleSignedHash: hash,
        transaction: tx.to_abi(),
    }
}

/// Current `rulesBrokenCounter` of `account`.
pub fn rules_broken_counter(vm: &mut Vm, account: Address) -> U256 {
    vm.storage(account, StorageSlot::Direct(RULES_BROKEN_COUNTER_SLOT))
}

/// Sets `rulesBrokenCounter` of `account`.
pub fn set_rules_broken_counter(vm: &mut Vm, account: Address, counter: U256) {
    vm.set_storage(account, StorageSlot::Direct(RULES_BROKEN_COUNTER_SLOT), counter);
}

/// Minimal nonce of `account` in the nonce holder.
pub fn min_nonce(vm: &mut Vm, account: Address) -> U256 {
    vm.storage(NONCE_HOLDER_ADDRESS, NonceHolder::min_nonce_slot(account))
}

/// `paymasterInput` selecting the approval-based flow.
pub fn approval_based_input(token: Address, min_allowance: U256) -> Bytes {
    IPaymasterFlow::approvalBasedCall {
        token,
        minAllowance: min_allowance,
        innerInput: Bytes::new(),
    }
    .abi_encode()
    .into()
}

/// `paymasterInput` selecting the general flow.
pub fn general_input() -> Bytes {
    IPaymasterFlow::generalCall { input: Bytes::new() }.abi_encode().into()
}

/// Decodes an `Error(string)` revert.
pub fn revert_reason(output: &[u8]) -> Option<String> {
    Revert::abi_decode(output).ok().map(|revert| revert.reason)
}

/// Decodes a `Panic(uint256)` revert.
pub fn panic_kind(output: &[u8]) -> Option<PanicKind> {
    Panic::abi_decode(output).ok().and_then(|panic| panic.kind())
}
