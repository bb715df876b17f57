//! Drives transactions through the account lifecycle.
//!
//! For every transaction the bootloader asks the account to validate it, collects the fee either
//! from the account or from a paymaster, and finally asks the account to execute it. Validation
//! and fee failures reject the transaction and leave no trace in the state. Execution failures
//! only undo the execution: the nonce, the account's bookkeeping and the fee stay.

use std::collections::HashSet;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, warn};

use crate::{
    constants::{
        gas::DEFAULT_VALIDATION_GAS_LIMIT,
        magic::{ACCOUNT_VALIDATION_SUCCESS_MAGIC, PAYMASTER_VALIDATION_SUCCESS_MAGIC},
        system::{BOOTLOADER_FORMAL_ADDRESS, NONCE_HOLDER_ADDRESS},
    },
    interfaces::{IAccount, INonceHolder, IPaymaster},
    CallOutcome, Transaction, ValidationParams, ValidationReport, ViolatedValidationRule, Vm,
};

/// Gas given to the nonce check that follows validation.
const NONCE_CHECK_GAS: u64 = 100_000;

/// Configuration of the [`Bootloader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootloaderConfig {
    /// Upper bound of the gas the account may spend on validation.
    pub validation_gas_limit: u64,
    /// Whether violated validation rules reject the transaction.
    pub enforce_validation_rules: bool,
    /// Contracts whose storage every validation may read.
    pub trusted_addresses: HashSet<Address>,
    /// Storage keys every validation may read.
    pub trusted_slots: HashSet<(Address, U256)>,
}

impl Default for BootloaderConfig {
    fn default() -> Self {
        Self {
            validation_gas_limit: DEFAULT_VALIDATION_GAS_LIMIT,
            enforce_validation_rules: true,
            trusted_addresses: HashSet::default(),
            trusted_slots: HashSet::default(),
        }
    }
}

impl BootloaderConfig {
    /// Sets the validation gas limit.
    pub fn with_validation_gas_limit(mut self, gas_limit: u64) -> Self {
        self.validation_gas_limit = gas_limit;
        self
    }

    /// Enables or disables enforcement of the validation rules.
    pub fn with_validation_rules(mut self, enforce: bool) -> Self {
        self.enforce_validation_rules = enforce;
        self
    }

    /// Trusts the whole storage of `address`.
    pub fn with_trusted_address(mut self, address: Address) -> Self {
        self.trusted_addresses.insert(address);
        self
    }

    /// Trusts a single storage key.
    pub fn with_trusted_slot(mut self, address: Address, slot: U256) -> Self {
        self.trusted_slots.insert((address, slot));
        self
    }
}

/// Why a transaction was not included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RejectReason {
    /// `from` holds no contract the VM can run.
    #[error("no account installed at {0}")]
    UnknownAccount(Address),
    /// The account reverted during validation.
    #[error("validation reverted: {0}")]
    ValidationReverted(Bytes),
    /// The account ran out of gas during validation.
    #[error("validation ran out of gas")]
    ValidationOutOfGas,
    /// Validation returned something other than the success magic.
    #[error("validation returned invalid magic: {0}")]
    InvalidMagic(Bytes),
    /// Validation broke an isolation rule.
    #[error("validation rule violated: {0}")]
    ValidationRule(ViolatedValidationRule),
    /// Validation succeeded but did not use the nonce.
    #[error("nonce {0} was not marked as used")]
    NonceNotUsed(U256),
    /// `max_fee_per_gas * gas_limit` overflowed.
    #[error("fee overflow")]
    FeeOverflow,
    /// `payForTransaction` failed.
    #[error("payForTransaction failed: {0}")]
    PaymentFailed(Bytes),
    /// The account ran out of gas while paying or preparing for the paymaster.
    #[error("account ran out of gas during fee payment")]
    PaymentOutOfGas,
    /// `prepareForPaymaster` failed.
    #[error("prepareForPaymaster failed: {0}")]
    PreparationFailed(Bytes),
    /// The paymaster refused to pay.
    #[error("paymaster validation failed: {0}")]
    PaymasterFailed(Bytes),
    /// The paymaster returned something other than the success magic.
    #[error("paymaster returned invalid magic: {0}")]
    PaymasterInvalidMagic(Bytes),
    /// The bootloader received less than the fee.
    #[error("fee not received: expected {expected}, received {received}")]
    FeeNotReceived {
        /// The fee of the transaction.
        expected: U256,
        /// What actually arrived.
        received: U256,
    },
}

/// How the execution of an included transaction ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// The call went through.
    Success,
    /// The account reverted; its execution effects were undone.
    Reverted {
        /// Revert data of the account.
        output: Bytes,
    },
    /// The account ran out of gas; its execution effects were undone.
    Halted,
}

/// Final status of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// The transaction was included.
    Included(ExecutionStatus),
    /// The transaction was rejected and left no trace.
    Rejected(RejectReason),
}

/// Gas used by each phase of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseGas {
    /// Gas used by `validateTransaction`.
    pub validation: u64,
    /// Gas used by the fee phase, including the paymaster.
    pub payment: u64,
    /// Gas used by `executeTransaction`.
    pub execution: u64,
}

impl PhaseGas {
    /// Gas used by all phases.
    pub const fn total(&self) -> u64 {
        self.validation + self.payment + self.execution
    }
}

/// The outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    /// Hash of the transaction.
    pub tx_hash: B256,
    /// Final status.
    pub status: TxStatus,
    /// What the validation tracer observed.
    pub validation: ValidationReport,
    /// Gas used per phase.
    pub gas: PhaseGas,
}

impl TxOutcome {
    /// Whether the transaction was included, regardless of how its execution ended.
    pub const fn is_included(&self) -> bool {
        matches!(self.status, TxStatus::Included(_))
    }

    /// Whether the transaction was included and its execution succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.status, TxStatus::Included(ExecutionStatus::Success))
    }

    /// The reason of a rejection.
    pub const fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.status {
            TxStatus::Rejected(reason) => Some(reason),
            TxStatus::Included(_) => None,
        }
    }

    /// The execution status of an included transaction.
    pub const fn execution_status(&self) -> Option<&ExecutionStatus> {
        match &self.status {
            TxStatus::Included(status) => Some(status),
            TxStatus::Rejected(_) => None,
        }
    }

    /// The first violated validation rule, whether or not it was enforced.
    pub const fn violated_rule(&self) -> Option<&ViolatedValidationRule> {
        self.validation.violation.as_ref()
    }
}

/// Runs transactions against a [`Vm`].
#[derive(Debug)]
pub struct Bootloader {
    vm: Vm,
    config: BootloaderConfig,
}

impl Bootloader {
    /// Creates a bootloader over a fresh VM.
    pub fn new(config: BootloaderConfig) -> Self {
        Self::with_vm(Vm::new(), config)
    }

    /// Creates a bootloader over `vm`.
    pub const fn with_vm(vm: Vm, config: BootloaderConfig) -> Self {
        Self { vm, config }
    }

    /// The VM.
    pub const fn vm(&self) -> &Vm {
        &self.vm
    }

    /// The VM.
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Consumes the bootloader and returns the VM.
    pub fn into_vm(self) -> Vm {
        self.vm
    }

    /// The configuration.
    pub const fn config(&self) -> &BootloaderConfig {
        &self.config
    }

    /// Runs `tx` through validation, fee payment and execution.
    pub fn execute_transaction(&mut self, tx: &Transaction) -> TxOutcome {
        let tx_hash = tx.hash();
        let span = debug_span!(
            target: "aa_account::bootloader",
            "tx",
            hash = %tx_hash,
            from = %tx.from,
            nonce = %tx.nonce
        );
        let _enter = span.enter();

        let mut outcome = TxOutcome {
            tx_hash,
            status: TxStatus::Included(ExecutionStatus::Success),
            validation: ValidationReport::default(),
            gas: PhaseGas::default(),
        };

        let checkpoint = self.vm.checkpoint();
        let prepared = self
            .validate(tx, tx_hash, &mut outcome)
            .and_then(|()| self.collect_fee(tx, tx_hash, &mut outcome));
        if let Err(reason) = prepared {
            debug!(target: "aa_account::bootloader", %reason, "Transaction rejected");
            self.vm.revert_to(checkpoint);
            outcome.status = TxStatus::Rejected(reason);
            return outcome;
        }

        let status = self.execute(tx, tx_hash, &mut outcome);
        outcome.status = TxStatus::Included(status);
        outcome
    }

    fn validate(
        &mut self,
        tx: &Transaction,
        tx_hash: B256,
        outcome: &mut TxOutcome,
    ) -> Result<(), RejectReason> {
        if !self.vm.is_installed(tx.from) {
            return Err(RejectReason::UnknownAccount(tx.from));
        }

        let gas_limit = tx.gas_limit_u64().min(self.config.validation_gas_limit);
        debug!(target: "aa_account::bootloader", gas_limit, "Validating transaction");

        self.vm.start_validation_trace(ValidationParams {
            user_address: tx.from,
            trusted_addresses: self.config.trusted_addresses.clone(),
            trusted_slots: self.config.trusted_slots.clone(),
            gas_limit,
            stop_on_violation: self.config.enforce_validation_rules,
        });
        let input = IAccount::validateTransactionCall {
            txHash: tx_hash,
            suggestedSignedHash: tx_hash,
            transaction: tx.to_abi(),
        };
        let result = self.call_account(tx.from, input.abi_encode(), gas_limit);
        outcome.validation = self.vm.finish_validation_trace().unwrap_or_default();
        outcome.gas.validation = result.gas_used();

        if let Some(rule) = outcome.validation.violation.clone() {
            if self.config.enforce_validation_rules {
                return Err(RejectReason::ValidationRule(rule));
            }
            warn!(
                target: "aa_account::bootloader",
                %rule,
                "Validation rule violated, not enforced"
            );
        }

        match result {
            CallOutcome::Success { output, .. } => {
                match IAccount::validateTransactionCall::abi_decode_returns(&output) {
                    Ok(magic) if magic == ACCOUNT_VALIDATION_SUCCESS_MAGIC => {}
                    _ => return Err(RejectReason::InvalidMagic(output)),
                }
            }
            CallOutcome::Revert { output, .. } => {
                return Err(RejectReason::ValidationReverted(output))
            }
            CallOutcome::OutOfGas { .. } => return Err(RejectReason::ValidationOutOfGas),
        }

        if !self.is_nonce_used(tx.from, tx.nonce) {
            return Err(RejectReason::NonceNotUsed(tx.nonce));
        }
        Ok(())
    }

    fn collect_fee(
        &mut self,
        tx: &Transaction,
        tx_hash: B256,
        outcome: &mut TxOutcome,
    ) -> Result<(), RejectReason> {
        let fee = tx.fee().map_err(|_| RejectReason::FeeOverflow)?;
        let balance_before = self.vm.balance(BOOTLOADER_FORMAL_ADDRESS);
        let mut gas_left = self.gas_left(tx, outcome);

        if tx.has_paymaster() {
            debug!(
                target: "aa_account::bootloader",
                paymaster = %tx.paymaster,
                "Preparing for paymaster"
            );
            let input = IAccount::prepareForPaymasterCall {
                txHash: tx_hash,
                possibleSignedHash: tx_hash,
                transaction: tx.to_abi(),
            };
            let result = self.call_account(tx.from, input.abi_encode(), gas_left);
            outcome.gas.payment += result.gas_used();
            gas_left = gas_left.saturating_sub(result.gas_used());
            match result {
                CallOutcome::Success { .. } => {}
                CallOutcome::Revert { output, .. } => {
                    return Err(RejectReason::PreparationFailed(output))
                }
                CallOutcome::OutOfGas { .. } => return Err(RejectReason::PaymentOutOfGas),
            }

            let input = IPaymaster::validateAndPayForPaymasterTransactionCall {
                txHash: tx_hash,
                suggestedSignedHash: tx_hash,
                transaction: tx.to_abi(),
            };
            let result = self.vm.transact_call(
                BOOTLOADER_FORMAL_ADDRESS,
                tx.paymaster,
                U256::ZERO,
                input.abi_encode().into(),
                gas_left.min(self.config.validation_gas_limit),
            );
            outcome.gas.payment += result.gas_used();
            let output = match result {
                CallOutcome::Success { output, .. } => output,
                failure => return Err(RejectReason::PaymasterFailed(failure.output().clone())),
            };
            match IPaymaster::validateAndPayForPaymasterTransactionCall::abi_decode_returns(&output)
            {
                Ok(ret) if ret.magic == PAYMASTER_VALIDATION_SUCCESS_MAGIC => {}
                _ => return Err(RejectReason::PaymasterInvalidMagic(output)),
            }
        } else {
            debug!(target: "aa_account::bootloader", %fee, "Collecting fee from account");
            let input = IAccount::payForTransactionCall {
                txHash: tx_hash,
                suggestedSignedHash: tx_hash,
                transaction: tx.to_abi(),
            };
            let result = self.call_account(tx.from, input.abi_encode(), gas_left);
            outcome.gas.payment += result.gas_used();
            match result {
                CallOutcome::Success { .. } => {}
                CallOutcome::Revert { output, .. } => {
                    return Err(RejectReason::PaymentFailed(output))
                }
                CallOutcome::OutOfGas { .. } => return Err(RejectReason::PaymentOutOfGas),
            }
        }

        let received = self.vm.balance(BOOTLOADER_FORMAL_ADDRESS).saturating_sub(balance_before);
        if received < fee {
            return Err(RejectReason::FeeNotReceived { expected: fee, received });
        }
        Ok(())
    }

    fn execute(
        &mut self,
        tx: &Transaction,
        tx_hash: B256,
        outcome: &mut TxOutcome,
    ) -> ExecutionStatus {
        let gas_limit = self.gas_left(tx, outcome);
        debug!(target: "aa_account::bootloader", to = %tx.to, gas_limit, "Executing transaction");

        let input = IAccount::executeTransactionCall {
            txHash: tx_hash,
            suggestedSignedHash: tx_hash,
            transaction: tx.to_abi(),
        };
        // A failed call leaves no state behind, which undoes exactly the execution.
        let result = self.call_account(tx.from, input.abi_encode(), gas_limit);
        outcome.gas.execution = result.gas_used();

        match result {
            CallOutcome::Success { .. } => ExecutionStatus::Success,
            CallOutcome::Revert { output, .. } => {
                debug!(target: "aa_account::bootloader", %output, "Execution reverted");
                ExecutionStatus::Reverted { output }
            }
            CallOutcome::OutOfGas { .. } => {
                debug!(target: "aa_account::bootloader", "Execution ran out of gas");
                ExecutionStatus::Halted
            }
        }
    }

    fn is_nonce_used(&mut self, account: Address, nonce: U256) -> bool {
        let input = INonceHolder::isNonceUsedCall { account, nonce };
        let result = self.vm.transact_call(
            BOOTLOADER_FORMAL_ADDRESS,
            NONCE_HOLDER_ADDRESS,
            U256::ZERO,
            input.abi_encode().into(),
            NONCE_CHECK_GAS,
        );
        match result {
            CallOutcome::Success { output, .. } => {
                INonceHolder::isNonceUsedCall::abi_decode_returns(&output).unwrap_or(false)
            }
            _ => false,
        }
    }

    fn call_account(&mut self, account: Address, input: Vec<u8>, gas_limit: u64) -> CallOutcome {
        self.vm.transact_call(
            BOOTLOADER_FORMAL_ADDRESS,
            account,
            U256::ZERO,
            input.into(),
            gas_limit,
        )
    }

    fn gas_left(&self, tx: &Transaction, outcome: &TxOutcome) -> u64 {
        tx.gas_limit_u64().saturating_sub(outcome.gas.total())
    }
}
