//! Scenario files.

use std::{collections::BTreeMap, path::Path};

use aa_account::{
    constants::system::{BOOTLOADER_FORMAL_ADDRESS, MAX_SYSTEM_CONTRACT_ADDRESS},
    Bootloader, BootloaderConfig, Transaction,
};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Result, SimError};

/// A set of accounts, their funding and the transactions to send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scenario {
    /// Bootloader configuration. Command-line flags take precedence.
    pub config: Option<BootloaderConfig>,
    /// Addresses to install the rule-breaking account at.
    pub accounts: Vec<Address>,
    /// Base token balances.
    pub balances: BTreeMap<Address, U256>,
    /// Initial balance of the bootloader.
    pub bootloader_balance: U256,
    /// Transactions, sent in order.
    pub transactions: Vec<Transaction>,
}

impl Scenario {
    /// Reads a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a scenario from JSON and checks it.
    pub fn from_json(content: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(content)?;
        scenario.check()?;
        Ok(scenario)
    }

    /// Checks that every account can be installed.
    pub fn check(&self) -> Result<()> {
        let mut seen = BTreeMap::new();
        for &account in &self.accounts {
            if account <= MAX_SYSTEM_CONTRACT_ADDRESS {
                return Err(SimError::ReservedAddress(account));
            }
            if seen.insert(account, ()).is_some() {
                return Err(SimError::DuplicateAccount(account));
            }
        }
        Ok(())
    }

    /// Builds the bootloader the scenario starts from.
    pub fn bootloader(&self, config: BootloaderConfig) -> Bootloader {
        let mut bootloader = Bootloader::new(config);
        let vm = bootloader.vm_mut();
        for &account in &self.accounts {
            vm.install_account(account);
        }
        for (&address, &balance) in &self.balances {
            vm.set_balance(address, balance);
        }
        vm.set_balance(BOOTLOADER_FORMAL_ADDRESS, self.bootloader_balance);
        info!(
            target: "aa_sim::scenario",
            accounts = self.accounts.len(),
            transactions = self.transactions.len(),
            "Scenario loaded"
        );
        bootloader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ACCOUNT: Address = address!("0000000000000000000000000000000000010000");

    #[test]
    fn test_parse_scenario() {
        let json = r#"{
            "accounts": ["0x0000000000000000000000000000000000010000"],
            "balances": { "0x0000000000000000000000000000000000010000": "0x3e8" },
            "transactions": [{
                "from": "0x0000000000000000000000000000000000010000",
                "to": "0x0000000000000000000000000000000000020000",
                "gasLimit": "0x100000"
            }]
        }"#;
        let scenario = Scenario::from_json(json).unwrap();
        assert_eq!(scenario.accounts, vec![ACCOUNT]);
        assert_eq!(scenario.balances[&ACCOUNT], U256::from(1_000));
        assert_eq!(scenario.bootloader_balance, U256::ZERO);
        assert_eq!(scenario.transactions[0].from, ACCOUNT);
        assert!(scenario.config.is_none());
    }

    #[test]
    fn test_reject_reserved_and_duplicate_accounts() {
        let reserved = Scenario { accounts: vec![BOOTLOADER_FORMAL_ADDRESS], ..Default::default() };
        assert!(matches!(reserved.check(), Err(SimError::ReservedAddress(_))));

        let duplicate = Scenario { accounts: vec![ACCOUNT, ACCOUNT], ..Default::default() };
        assert!(matches!(duplicate.check(), Err(SimError::DuplicateAccount(ACCOUNT))));
    }
}
