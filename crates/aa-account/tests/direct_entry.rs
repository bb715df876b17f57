//! Tests for calldata that is not a lifecycle call.

use aa_account::{constants::system::BOOTLOADER_FORMAL_ADDRESS, test_utils::*, CallOutcome, Vm};
use alloy_primitives::{bytes, Bytes, U256};
use alloy_sol_types::PanicKind;
use rstest::rstest;

fn setup() -> Vm {
    let mut vm = Vm::new();
    vm.install_account(ACCOUNT);
    vm.set_balance(STRANGER, U256::from(100));
    vm.set_balance(BOOTLOADER_FORMAL_ADDRESS, U256::from(100));
    vm
}

#[rstest]
#[case::empty(Bytes::new())]
#[case::unknown_selector(bytes!("a9059cbb"))]
#[case::short(bytes!("01"))]
fn test_direct_entry_from_stranger_is_accepted(#[case] input: Bytes) {
    let mut vm = setup();

    let outcome = vm.transact_call(STRANGER, ACCOUNT, U256::from(40), input, TEST_GAS_LIMIT);
    let CallOutcome::Success { output, .. } = outcome else {
        panic!("direct entry failed: {outcome:?}");
    };
    assert!(output.is_empty());
    assert_eq!(vm.balance(ACCOUNT), U256::from(40));
    assert_eq!(vm.balance(STRANGER), U256::from(60));
    assert_eq!(rules_broken_counter(&mut vm, ACCOUNT), U256::ZERO);
}

#[rstest]
#[case::empty(Bytes::new())]
#[case::unknown_selector(bytes!("a9059cbb"))]
fn test_direct_entry_from_bootloader_panics(#[case] input: Bytes) {
    let mut vm = setup();

    let outcome =
        vm.transact_call(BOOTLOADER_FORMAL_ADDRESS, ACCOUNT, U256::from(40), input, TEST_GAS_LIMIT);
    let CallOutcome::Revert { output, .. } = &outcome else {
        panic!("expected a revert, got {outcome:?}");
    };
    assert_eq!(panic_kind(output), Some(PanicKind::Assert));
    assert_eq!(vm.balance(ACCOUNT), U256::ZERO);
    assert_eq!(vm.balance(BOOTLOADER_FORMAL_ADDRESS), U256::from(100));
}
