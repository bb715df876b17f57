use super::RuleBreakerAccount;
use crate::{AccountError, Host, Transaction};

impl RuleBreakerAccount {
    /// Pays the fee of `tx` to the bootloader.
    pub fn pay_for_transaction<H: Host + ?Sized>(
        &self,
        host: &mut H,
        tx: &Transaction,
    ) -> Result<(), AccountError> {
        if !tx.pay_to_the_bootloader(host)?.is_success() {
            return Err(AccountError::Payment);
        }
        Ok(())
    }

    /// Grants whatever the paymaster named in `tx` needs to sponsor it.
    pub fn prepare_for_paymaster<H: Host + ?Sized>(
        &self,
        host: &mut H,
        tx: &Transaction,
    ) -> Result<(), AccountError> {
        tx.process_paymaster_input(host)
    }
}
