use super::RuleBreakerAccount;
use crate::{
    call_discarding_output, constants::system::CONTRACT_DEPLOYER_ADDRESS,
    system_call_with_propagated_revert, AccountError, Host, Transaction,
};

impl RuleBreakerAccount {
    /// Performs the call described by `tx`.
    ///
    /// Calls to the deployer go through a system call that carries `reserved[1]` and the calldata
    /// and re-raises a deployer revert unchanged. Every other destination gets a plain call with
    /// all remaining gas; its return data is dropped and a failure reverts with no data.
    pub fn execute_transaction<H: Host + ?Sized>(
        &self,
        host: &mut H,
        tx: &Transaction,
    ) -> Result<(), AccountError> {
        let value = tx.value_to_transfer()?;
        let data = tx.data.clone();

        if tx.to == CONTRACT_DEPLOYER_ADDRESS {
            system_call_with_propagated_revert(host, tx.to, value, data)
                .map_err(AccountError::deployer)?;
        } else if !call_discarding_output(host, tx.to, value, data)?.is_success() {
            return Err(AccountError::ExecutionFailed);
        }

        Ok(())
    }

    /// Entry point for transactions submitted by the account itself instead of the bootloader.
    ///
    /// Only the nonce is advanced before execution: the bootloader balance check and the counter
    /// belong to `validateTransaction` and are not part of this path.
    pub fn execute_transaction_from_outside<H: Host + ?Sized>(
        &self,
        host: &mut H,
        tx: &Transaction,
    ) -> Result<(), AccountError> {
        self.advance_nonce(host, tx)?;
        self.execute_transaction(host, tx)
    }
}
