//! End-to-end tests of the transaction lifecycle driven by the bootloader.

use std::sync::Arc;

use aa_account::{
    constants::{
        storage::BASE_TOKEN_BALANCE_SLOT,
        system::{BOOTLOADER_FORMAL_ADDRESS, L2_BASE_TOKEN_ADDRESS},
    },
    test_utils::*,
    BootloaderConfig, ExecutionStatus, PhaseGas, RejectReason, StorageSlot, Transaction,
    ValidationAccess, ViolatedValidationRule,
};
use alloy_primitives::{address, bytes, Address, U256};

const RECORDER: Address = address!("0000000000000000000000000000000000100002");
const REVERTER: Address = address!("0000000000000000000000000000000000100003");
const TOKEN: Address = address!("0000000000000000000000000000000000200000");
const PAYMASTER: Address = address!("0000000000000000000000000000000000300000");

const FUNDS: u64 = 10_000_000;

fn bootloader_balance_slot() -> U256 {
    StorageSlot::of_address(BOOTLOADER_FORMAL_ADDRESS, BASE_TOKEN_BALANCE_SLOT).resolve()
}

#[test]
fn test_first_transaction_breaks_isolation_rules() {
    let mut bootloader = bootloader_with_account(BootloaderConfig::default(), U256::from(FUNDS));
    bootloader.vm_mut().install(RECORDER, Arc::new(CallRecorder::default()));
    let tx = account_tx(RECORDER, 0).with_gas(1_000_000, 1);

    let outcome = bootloader.execute_transaction(&tx);
    assert_eq!(
        outcome.reject_reason(),
        Some(&RejectReason::ValidationRule(ViolatedValidationRule::TouchedDisallowedStorageSlots(
            L2_BASE_TOKEN_ADDRESS,
            bootloader_balance_slot(),
        )))
    );
    assert!(outcome.validation.accesses.has_foreign_balance_access());

    // Nothing of the rejected transaction survives.
    let vm = bootloader.vm_mut();
    assert_eq!(rules_broken_counter(vm, ACCOUNT), U256::ZERO);
    assert_eq!(min_nonce(vm, ACCOUNT), U256::ZERO);
    assert_eq!(vm.balance(ACCOUNT), U256::from(FUNDS));
    assert_eq!(CallRecorder::calls(vm, RECORDER), U256::ZERO);
}

#[test]
fn test_permissive_bootloader_includes_first_transaction() {
    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    bootloader.vm_mut().install(RECORDER, Arc::new(CallRecorder::default()));
    let tx = account_tx(RECORDER, 0).with_gas(1_000_000, 2).with_value(U256::from(11));

    let outcome = bootloader.execute_transaction(&tx);
    assert!(outcome.is_success(), "{outcome:?}");
    // The violation is still reported.
    assert!(outcome.violated_rule().is_some());
    assert!(outcome.gas.validation > 0);
    assert!(outcome.gas.execution > 0);

    let vm = bootloader.vm_mut();
    assert_eq!(rules_broken_counter(vm, ACCOUNT), U256::from(1));
    assert_eq!(min_nonce(vm, ACCOUNT), U256::from(1));
    assert_eq!(vm.balance(BOOTLOADER_FORMAL_ADDRESS), U256::from(2_000_000));
    assert_eq!(vm.balance(RECORDER), U256::from(11));
    assert_eq!(vm.balance(ACCOUNT), U256::from(FUNDS - 2_000_000 - 11));
}

#[test]
fn test_steady_state_validation_respects_isolation_rules() {
    let mut bootloader = bootloader_with_account(BootloaderConfig::default(), U256::from(FUNDS));
    let vm = bootloader.vm_mut();
    vm.install(RECORDER, Arc::new(CallRecorder::default()));
    vm.set_balance(BOOTLOADER_FORMAL_ADDRESS, U256::from(1));
    set_rules_broken_counter(vm, ACCOUNT, U256::from(1));

    let outcome = bootloader.execute_transaction(&account_tx(RECORDER, 0).with_gas(1_000_000, 1));
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.violated_rule(), None);
    assert!(!outcome.validation.accesses.has_violation());
    assert!(outcome.validation.accesses.contains(ValidationAccess::OWN_STORAGE));
    assert!(outcome.validation.accesses.contains(ValidationAccess::ACCOUNT_DERIVED_STORAGE));
    assert_eq!(rules_broken_counter(bootloader.vm_mut(), ACCOUNT), U256::from(2));
}

#[test]
fn test_trusted_base_token_lets_first_transaction_through() {
    let config = BootloaderConfig::default().with_trusted_address(L2_BASE_TOKEN_ADDRESS);
    let mut bootloader = bootloader_with_account(config, U256::from(FUNDS));

    let outcome = bootloader.execute_transaction(&account_tx(STRANGER, 0));
    assert!(outcome.is_success(), "{outcome:?}");
    assert!(outcome.validation.accesses.contains(ValidationAccess::TRUSTED_STORAGE));
}

#[test]
fn test_sequence_of_transactions() {
    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    bootloader.vm_mut().install(RECORDER, Arc::new(CallRecorder::default()));

    for nonce in 0..3 {
        let outcome =
            bootloader.execute_transaction(&account_tx(RECORDER, nonce).with_gas(1_000_000, 1));
        assert!(outcome.is_success(), "nonce {nonce}: {outcome:?}");
        // Only the first validation reads the bootloader balance.
        assert_eq!(outcome.violated_rule().is_some(), nonce == 0);
    }

    let vm = bootloader.vm_mut();
    assert_eq!(rules_broken_counter(vm, ACCOUNT), U256::from(3));
    assert_eq!(min_nonce(vm, ACCOUNT), U256::from(3));
    assert_eq!(CallRecorder::calls(vm, RECORDER), U256::from(3));
    assert_eq!(vm.balance(BOOTLOADER_FORMAL_ADDRESS), U256::from(3_000_000));
}

#[test]
fn test_funded_bootloader_rejects_first_validation() {
    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    bootloader.vm_mut().set_balance(BOOTLOADER_FORMAL_ADDRESS, U256::from(1));

    let outcome = bootloader.execute_transaction(&account_tx(STRANGER, 0));
    let Some(RejectReason::ValidationReverted(output)) = outcome.reject_reason() else {
        panic!("expected a validation revert, got {outcome:?}");
    };
    assert_eq!(revert_reason(output).as_deref(), Some(aa_account::NON_ZERO_HOST_BALANCE));
}

#[test]
fn test_wrong_nonce_is_rejected_without_execution() {
    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    bootloader.vm_mut().install(RECORDER, Arc::new(CallRecorder::default()));

    let outcome = bootloader.execute_transaction(&account_tx(RECORDER, 4));
    assert!(matches!(outcome.reject_reason(), Some(RejectReason::ValidationReverted(_))));
    assert_eq!(CallRecorder::calls(bootloader.vm_mut(), RECORDER), U256::ZERO);
}

#[test]
fn test_execution_revert_keeps_nonce_counter_and_fee() {
    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    bootloader.vm_mut().install(REVERTER, Arc::new(CallRecorder::reverting(bytes!("dead"))));
    let tx = account_tx(REVERTER, 0).with_gas(1_000_000, 1).with_value(U256::from(5));

    let outcome = bootloader.execute_transaction(&tx);
    assert!(outcome.is_included());
    assert_eq!(
        outcome.execution_status(),
        Some(&ExecutionStatus::Reverted { output: Default::default() })
    );

    let vm = bootloader.vm_mut();
    assert_eq!(min_nonce(vm, ACCOUNT), U256::from(1));
    assert_eq!(rules_broken_counter(vm, ACCOUNT), U256::from(1));
    assert_eq!(vm.balance(BOOTLOADER_FORMAL_ADDRESS), U256::from(1_000_000));
    assert_eq!(vm.balance(ACCOUNT), U256::from(FUNDS - 1_000_000));
    assert_eq!(vm.balance(REVERTER), U256::ZERO);
}

#[test]
fn test_unaffordable_fee_is_rejected() {
    let mut bootloader = permissive_bootloader(U256::from(10));
    let tx = account_tx(STRANGER, 0).with_gas(1_000_000, 1);

    let outcome = bootloader.execute_transaction(&tx);
    assert!(matches!(outcome.reject_reason(), Some(RejectReason::PaymentFailed(_))));
    // Validation effects are rolled back with the rejection.
    assert_eq!(min_nonce(bootloader.vm_mut(), ACCOUNT), U256::ZERO);
}

/// Gas each phase of `tx` uses on a fresh permissive bootloader with a recorder installed.
fn phase_gas(tx: &Transaction) -> PhaseGas {
    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    bootloader.vm_mut().install(RECORDER, Arc::new(CallRecorder::default()));
    let outcome = bootloader.execute_transaction(tx);
    assert!(outcome.is_success(), "{outcome:?}");
    outcome.gas
}

#[test]
fn test_execution_out_of_gas_is_halted() {
    let tx = account_tx(RECORDER, 0).with_gas(1_000_000, 1).with_value(U256::from(5));
    let gas = phase_gas(&tx);
    // Not enough left for the value-carrying call of the executor.
    let tx = tx.with_gas(gas.validation + gas.payment + 5_000, 1);

    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    bootloader.vm_mut().install(RECORDER, Arc::new(CallRecorder::default()));
    let outcome = bootloader.execute_transaction(&tx);
    assert_eq!(outcome.execution_status(), Some(&ExecutionStatus::Halted));

    let vm = bootloader.vm_mut();
    assert_eq!(min_nonce(vm, ACCOUNT), U256::from(1));
    assert_eq!(CallRecorder::calls(vm, RECORDER), U256::ZERO);
    assert_eq!(vm.balance(RECORDER), U256::ZERO);
}

#[test]
fn test_payment_out_of_gas_is_rejected() {
    let tx = account_tx(RECORDER, 0).with_gas(1_000_000, 1);
    let gas = phase_gas(&tx);
    let tx = tx.with_gas(gas.validation + 5_000, 1);

    let mut bootloader = permissive_bootloader(U256::from(FUNDS));
    let outcome = bootloader.execute_transaction(&tx);
    assert_eq!(outcome.reject_reason(), Some(&RejectReason::PaymentOutOfGas));
    assert_eq!(min_nonce(bootloader.vm_mut(), ACCOUNT), U256::ZERO);
    assert_eq!(bootloader.vm_mut().balance(BOOTLOADER_FORMAL_ADDRESS), U256::ZERO);
}

#[test]
fn test_unknown_account_is_rejected() {
    let mut bootloader = permissive_bootloader(U256::ZERO);
    let tx = Transaction::new(STRANGER, ACCOUNT);

    let outcome = bootloader.execute_transaction(&tx);
    assert_eq!(outcome.reject_reason(), Some(&RejectReason::UnknownAccount(STRANGER)));
}

#[test]
fn test_validation_out_of_gas_is_a_violation() {
    let config = BootloaderConfig::default().with_validation_gas_limit(3_000);
    let mut bootloader = bootloader_with_account(config, U256::from(FUNDS));

    let outcome = bootloader.execute_transaction(&account_tx(STRANGER, 0));
    assert_eq!(
        outcome.reject_reason(),
        Some(&RejectReason::ValidationRule(ViolatedValidationRule::TookTooManyComputationalGas(
            3_000
        )))
    );
}

#[test]
fn test_paymaster_sponsors_transaction() {
    let mut bootloader = permissive_bootloader(U256::ZERO);
    let vm = bootloader.vm_mut();
    vm.install(TOKEN, Arc::new(TestToken::default()));
    vm.install(PAYMASTER, Arc::new(ApprovalPaymaster));
    vm.install(RECORDER, Arc::new(CallRecorder::default()));
    vm.set_balance(PAYMASTER, U256::from(FUNDS));
    TestToken::mint(vm, TOKEN, ACCOUNT, U256::from(1_000));

    let tx = account_tx(RECORDER, 0)
        .with_gas(1_000_000, 3)
        .with_paymaster(PAYMASTER, approval_based_input(TOKEN, U256::from(250)));

    let outcome = bootloader.execute_transaction(&tx);
    assert!(outcome.is_success(), "{outcome:?}");
    assert!(outcome.gas.payment > 0);

    let vm = bootloader.vm_mut();
    assert_eq!(vm.balance(BOOTLOADER_FORMAL_ADDRESS), U256::from(3_000_000));
    assert_eq!(vm.balance(PAYMASTER), U256::from(FUNDS - 3_000_000));
    assert_eq!(TestToken::balance_of(vm, TOKEN, ACCOUNT), U256::from(750));
    assert_eq!(TestToken::balance_of(vm, TOKEN, PAYMASTER), U256::from(250));
    assert_eq!(TestToken::allowance(vm, TOKEN, ACCOUNT, PAYMASTER), U256::ZERO);
    assert_eq!(CallRecorder::calls(vm, RECORDER), U256::from(1));
}

#[test]
fn test_paymaster_without_tokens_is_rejected() {
    let mut bootloader = permissive_bootloader(U256::ZERO);
    let vm = bootloader.vm_mut();
    vm.install(TOKEN, Arc::new(TestToken::default()));
    vm.install(PAYMASTER, Arc::new(ApprovalPaymaster));
    vm.set_balance(PAYMASTER, U256::from(FUNDS));

    let tx = account_tx(STRANGER, 0)
        .with_gas(1_000_000, 3)
        .with_paymaster(PAYMASTER, approval_based_input(TOKEN, U256::from(250)));

    let outcome = bootloader.execute_transaction(&tx);
    assert!(matches!(outcome.reject_reason(), Some(RejectReason::PaymasterFailed(_))));

    let vm = bootloader.vm_mut();
    assert_eq!(TestToken::allowance(vm, TOKEN, ACCOUNT, PAYMASTER), U256::ZERO);
    assert_eq!(vm.balance(PAYMASTER), U256::from(FUNDS));
}

#[test]
fn test_general_flow_without_paying_paymaster_is_rejected() {
    let mut bootloader = permissive_bootloader(U256::ZERO);
    bootloader.vm_mut().install(PAYMASTER, Arc::new(ApprovalPaymaster));

    let tx =
        account_tx(STRANGER, 0).with_gas(1_000_000, 3).with_paymaster(PAYMASTER, general_input());

    let outcome = bootloader.execute_transaction(&tx);
    assert!(matches!(outcome.reject_reason(), Some(RejectReason::PaymasterFailed(_))));
}
