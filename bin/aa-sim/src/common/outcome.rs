//! Reports of scenario runs.

use aa_account::{
    constants::{storage::RULES_BROKEN_COUNTER_SLOT, system::NONCE_HOLDER_ADDRESS},
    system::NonceHolder,
    ExecutionStatus, RejectReason, StorageSlot, TxOutcome, TxStatus, Vm,
};
use alloy_primitives::{hex, Address, Bytes, U256};
use alloy_sol_types::{Panic, Revert, SolError};
use serde::{Deserialize, Serialize};

/// State of an account after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// The account.
    pub address: Address,
    /// Base token balance.
    pub balance: U256,
    /// Minimal nonce in the nonce holder.
    pub min_nonce: U256,
    /// `rulesBrokenCounter`.
    pub rules_broken_counter: U256,
}

impl AccountSummary {
    /// Reads the summary of `address` from `vm`.
    pub fn read(vm: &mut Vm, address: Address) -> Self {
        Self {
            address,
            balance: vm.balance(address),
            min_nonce: vm.storage(NONCE_HOLDER_ADDRESS, NonceHolder::min_nonce_slot(address)),
            rules_broken_counter: vm
                .storage(address, StorageSlot::Direct(RULES_BROKEN_COUNTER_SLOT)),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Outcome of every transaction, in order.
    pub outcomes: Vec<TxOutcome>,
    /// Final state of every account.
    pub accounts: Vec<AccountSummary>,
    /// Final balance of the bootloader.
    pub bootloader_balance: U256,
}

impl RunReport {
    /// Number of included transactions.
    pub fn included(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_included()).count()
    }

    /// Number of rejected transactions.
    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.included()
    }
}

/// Print a run report in human-readable form.
pub fn print_report(report: &RunReport) {
    for (index, outcome) in report.outcomes.iter().enumerate() {
        println!();
        println!("=== Transaction {index} ===");
        print_outcome(outcome);
    }

    println!();
    println!("=== Summary ===");
    println!("Included:         {}", report.included());
    println!("Rejected:         {}", report.rejected());
    println!("Bootloader:       {}", report.bootloader_balance);
    for account in &report.accounts {
        println!(
            "Account {}: balance={} nonce={} counter={}",
            account.address, account.balance, account.min_nonce, account.rules_broken_counter
        );
    }
}

fn print_outcome(outcome: &TxOutcome) {
    println!("Hash:             {}", outcome.tx_hash);
    match &outcome.status {
        TxStatus::Included(ExecutionStatus::Success) => println!("Status:           Success"),
        TxStatus::Included(ExecutionStatus::Reverted { output }) => {
            println!("Status:           Reverted");
            println!("Revert Reason:    {}", decode_revert_reason(output));
        }
        TxStatus::Included(ExecutionStatus::Halted) => {
            println!("Status:           Halted (out of gas)");
        }
        TxStatus::Rejected(reason) => {
            println!("Status:           Rejected");
            println!("Reject Reason:    {}", format_reject_reason(reason));
        }
    }
    println!(
        "Gas Used:         {} (validation {}, payment {}, execution {})",
        outcome.gas.total(),
        outcome.gas.validation,
        outcome.gas.payment,
        outcome.gas.execution
    );
    if !outcome.validation.accesses.is_empty() {
        println!("Validation:       {:?}", outcome.validation.accesses);
    }
    if let Some(rule) = outcome.violated_rule() {
        println!("Violated Rule:    {rule}");
    }
}

/// Format a rejection, decoding revert data where there is some.
pub fn format_reject_reason(reason: &RejectReason) -> String {
    match reason {
        RejectReason::ValidationReverted(output) => {
            format!("validation reverted: {}", decode_revert_reason(output))
        }
        RejectReason::PaymentFailed(output) => {
            format!("payForTransaction failed: {}", decode_revert_reason(output))
        }
        RejectReason::PreparationFailed(output) => {
            format!("prepareForPaymaster failed: {}", decode_revert_reason(output))
        }
        RejectReason::PaymasterFailed(output) => {
            format!("paymaster validation failed: {}", decode_revert_reason(output))
        }
        other => other.to_string(),
    }
}

/// Decode revert reason from output bytes using alloy's built-in decoders.
///
/// Supports:
/// - `Error(string)` via `alloy_sol_types::Revert`
/// - `Panic(uint256)` via `alloy_sol_types::Panic`
/// - Raw hex fallback
pub fn decode_revert_reason(output: &Bytes) -> String {
    if output.is_empty() {
        return "(empty)".to_string();
    }

    if let Ok(revert) = Revert::abi_decode(output) {
        return format!("Error(\"{}\")", revert.reason());
    }

    if let Ok(panic) = Panic::abi_decode(output) {
        return if let Some(kind) = panic.kind() {
            format!("Panic: {kind}")
        } else {
            format!("Panic(0x{:x})", panic.code)
        };
    }

    format!("0x{}", hex::encode(output))
}
