use super::RuleBreakerAccount;
use crate::{constants::system::BOOTLOADER_FORMAL_ADDRESS, AccountError, Host};

impl RuleBreakerAccount {
    /// Fallback and receive handler.
    ///
    /// The bootloader only ever uses the lifecycle entry points, so reaching this from the
    /// bootloader is an assertion failure. Anyone else gets a no-op, like calling an EOA.
    pub fn direct_entry<H: Host + ?Sized>(&self, host: &mut H) -> Result<(), AccountError> {
        if host.caller() == BOOTLOADER_FORMAL_ADDRESS {
            return Err(AccountError::ContractViolation);
        }
        Ok(())
    }
}
