//! A custom account that breaks the validation isolation rules on its first transaction.
//!
//! The account accepts every transaction without checking a signature. What it exercises is the
//! lifecycle contract with the bootloader:
//!
//! - `validateTransaction` advances the nonce through the nonce holder and, while the account has
//!   never validated anything, reads the bootloader balance. That read touches storage outside of
//!   the account and is what the validation tracer is expected to reject.
//! - `payForTransaction` / `prepareForPaymaster` settle the fee.
//! - `executeTransaction` performs the call described by the transaction, routing calls to the
//!   deployer through a system call.
//! - Any other calldata hits the direct-entry guard, which behaves like an EOA.

mod direct_entry;
mod execution;
mod fee;
mod validation;

pub use validation::ValidationMode;

use alloy_primitives::Bytes;
use alloy_sol_types::{SolCall, SolInterface};

use crate::{
    constants::system::BOOTLOADER_FORMAL_ADDRESS,
    interfaces::IAccount::{self, IAccountCalls},
    AccountError, Contract, Halt, Host, Transaction,
};

/// The rule-breaking custom account.
///
/// The type carries no state: the only persistent field, `rulesBrokenCounter`, lives in the
/// account's storage and starts at zero when the account is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleBreakerAccount;

impl RuleBreakerAccount {
    /// Name of the account contract.
    pub const NAME: &'static str = "RuleBreakerAccount";

    /// Decodes `input` and runs the matching entry point.
    pub fn dispatch<H: Host + ?Sized>(
        &self,
        host: &mut H,
        input: &Bytes,
    ) -> Result<Bytes, AccountError> {
        let call = match IAccountCalls::abi_decode(input) {
            Ok(call) => call,
            Err(_) if has_lifecycle_selector(input) => return Err(AccountError::MalformedCalldata),
            Err(_) => {
                self.direct_entry(host)?;
                return Ok(Bytes::new());
            }
        };

        match call {
            IAccountCalls::validateTransaction(call) => {
                only_bootloader(host)?;
                let tx = Transaction::from(call.transaction);
                let magic =
                    self.validate_transaction(host, call.txHash, call.suggestedSignedHash, &tx)?;
                Ok(IAccount::validateTransactionCall::abi_encode_returns(&magic).into())
            }
            IAccountCalls::payForTransaction(call) => {
                only_bootloader(host)?;
                self.pay_for_transaction(host, &Transaction::from(call.transaction))?;
                Ok(Bytes::new())
            }
            IAccountCalls::prepareForPaymaster(call) => {
                only_bootloader(host)?;
                self.prepare_for_paymaster(host, &Transaction::from(call.transaction))?;
                Ok(Bytes::new())
            }
            IAccountCalls::executeTransaction(call) => {
                only_bootloader(host)?;
                self.execute_transaction(host, &Transaction::from(call.transaction))?;
                Ok(Bytes::new())
            }
            IAccountCalls::executeTransactionFromOutside(call) => {
                self.execute_transaction_from_outside(host, &Transaction::from(call.transaction))?;
                Ok(Bytes::new())
            }
        }
    }
}

impl Contract for RuleBreakerAccount {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, Halt> {
        self.dispatch(host, input).map_err(AccountError::into_halt)
    }
}

fn only_bootloader<H: Host + ?Sized>(host: &H) -> Result<(), AccountError> {
    if host.caller() != BOOTLOADER_FORMAL_ADDRESS {
        return Err(AccountError::NotBootloader);
    }
    Ok(())
}

fn has_lifecycle_selector(input: &[u8]) -> bool {
    input
        .get(..4)
        .and_then(|selector| <[u8; 4]>::try_from(selector).ok())
        .is_some_and(IAccountCalls::valid_selector)
}
