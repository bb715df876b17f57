//! Tests for `validateTransaction`: the first-call balance check, the counter and the nonce.

use aa_account::{
    constants::{
        magic::ACCOUNT_VALIDATION_SUCCESS_MAGIC,
        system::{BOOTLOADER_FORMAL_ADDRESS, NONCE_HOLDER_ADDRESS},
    },
    interfaces::IAccount,
    system::INCORRECT_NONCE,
    test_utils::*,
    CallOutcome, Vm, NON_ZERO_HOST_BALANCE, ONLY_BOOTLOADER,
};
use alloy_primitives::{address, Address, U256};
use alloy_sol_types::SolCall;
use rstest::rstest;

const TARGET: Address = address!("0000000000000000000000000000000000100001");

fn vm_with_account() -> Vm {
    let mut vm = Vm::new();
    vm.install_account(ACCOUNT);
    vm
}

fn validate(vm: &mut Vm, nonce: u64) -> CallOutcome {
    let tx = account_tx(TARGET, nonce);
    lifecycle_call(vm, BOOTLOADER_FORMAL_ADDRESS, ACCOUNT, &validate_call(&tx))
}

fn expect_magic(outcome: &CallOutcome) {
    let CallOutcome::Success { output, .. } = outcome else {
        panic!("validation failed: {outcome:?}");
    };
    let magic = IAccount::validateTransactionCall::abi_decode_returns(output).unwrap();
    assert_eq!(magic, ACCOUNT_VALIDATION_SUCCESS_MAGIC);
}

#[test]
fn test_first_validation_with_empty_bootloader_succeeds() {
    let mut vm = vm_with_account();

    expect_magic(&validate(&mut vm, 0));
    assert_eq!(rules_broken_counter(&mut vm, ACCOUNT), U256::from(1));
    assert_eq!(min_nonce(&mut vm, ACCOUNT), U256::from(1));
}

#[test]
fn test_first_validation_with_funded_bootloader_fails_authorization() {
    let mut vm = vm_with_account();
    vm.set_balance(BOOTLOADER_FORMAL_ADDRESS, U256::from(1));

    let outcome = validate(&mut vm, 0);
    let CallOutcome::Revert { output, .. } = &outcome else {
        panic!("expected a revert, got {outcome:?}");
    };
    assert_eq!(revert_reason(output).as_deref(), Some(NON_ZERO_HOST_BALANCE));
    assert_eq!(rules_broken_counter(&mut vm, ACCOUNT), U256::ZERO);
    assert_eq!(min_nonce(&mut vm, ACCOUNT), U256::ZERO);
}

#[test]
fn test_later_validations_skip_balance_check() {
    let mut vm = vm_with_account();
    expect_magic(&validate(&mut vm, 0));

    vm.set_balance(BOOTLOADER_FORMAL_ADDRESS, U256::from(1_000_000));
    expect_magic(&validate(&mut vm, 1));
    expect_magic(&validate(&mut vm, 2));
    assert_eq!(rules_broken_counter(&mut vm, ACCOUNT), U256::from(3));
}

#[rstest]
#[case::once(1)]
#[case::a_few(3)]
#[case::many(10)]
fn test_counter_counts_successful_validations(#[case] successes: u64) {
    let mut vm = vm_with_account();
    for nonce in 0..successes {
        expect_magic(&validate(&mut vm, nonce));
        // A failing validation in between must not move the counter.
        assert!(!validate(&mut vm, nonce).is_success());
    }
    assert_eq!(rules_broken_counter(&mut vm, ACCOUNT), U256::from(successes));
    assert_eq!(min_nonce(&mut vm, ACCOUNT), U256::from(successes));
}

#[test]
fn test_nonce_mismatch_propagates_registry_revert() {
    let mut vm = vm_with_account();

    let outcome = validate(&mut vm, 5);
    let CallOutcome::Revert { output, .. } = &outcome else {
        panic!("expected a revert, got {outcome:?}");
    };
    assert_eq!(revert_reason(output).as_deref(), Some(INCORRECT_NONCE));
    assert_eq!(rules_broken_counter(&mut vm, ACCOUNT), U256::ZERO);
    assert_eq!(min_nonce(&mut vm, ACCOUNT), U256::ZERO);
}

#[test]
fn test_validation_is_bootloader_only() {
    let mut vm = vm_with_account();
    let tx = account_tx(TARGET, 0);

    let outcome = lifecycle_call(&mut vm, STRANGER, ACCOUNT, &validate_call(&tx));
    let CallOutcome::Revert { output, .. } = &outcome else {
        panic!("expected a revert, got {outcome:?}");
    };
    assert_eq!(revert_reason(output).as_deref(), Some(ONLY_BOOTLOADER));
    assert_eq!(rules_broken_counter(&mut vm, ACCOUNT), U256::ZERO);
}

#[test]
fn test_nonce_holder_rejects_calls_without_system_flag() {
    let mut vm = vm_with_account();
    let call = aa_account::interfaces::INonceHolder::incrementMinNonceIfEqualsCall {
        expectedNonce: U256::ZERO,
    };

    let outcome = lifecycle_call(&mut vm, ACCOUNT, NONCE_HOLDER_ADDRESS, &call);
    let CallOutcome::Revert { output, .. } = &outcome else {
        panic!("expected a revert, got {outcome:?}");
    };
    assert_eq!(
        revert_reason(output).as_deref(),
        Some(aa_account::system::SYSTEM_CALL_FLAG_REQUIRED)
    );
}

#[test]
fn test_malformed_lifecycle_calldata_reverts_empty() {
    let mut vm = vm_with_account();
    let mut input = validate_call(&account_tx(TARGET, 0)).abi_encode();
    input.truncate(40);

    let outcome = vm.transact_call(
        BOOTLOADER_FORMAL_ADDRESS,
        ACCOUNT,
        U256::ZERO,
        input.into(),
        TEST_GAS_LIMIT,
    );
    assert!(matches!(outcome, CallOutcome::Revert { ref output, .. } if output.is_empty()));
}
