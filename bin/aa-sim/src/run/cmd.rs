use std::path::PathBuf;

use aa_account::{constants::system::BOOTLOADER_FORMAL_ADDRESS, BootloaderConfig};
use clap::Parser;
use tracing::info;

use crate::common::{print_report, AccountSummary, Result, RunReport, Scenario};

/// Run a scenario through the bootloader
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Scenario file (JSON)
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Record violated validation rules without rejecting transactions
    #[arg(long = "no-validation-rules", env = "AA_SIM_NO_VALIDATION_RULES")]
    pub no_validation_rules: bool,

    /// Gas limit of the validation step
    #[arg(long = "validation-gas", env = "AA_SIM_VALIDATION_GAS")]
    pub validation_gas: Option<u64>,

    /// Print the report as JSON
    #[arg(long = "json")]
    pub json: bool,
}

impl Cmd {
    /// Execute the run command
    pub fn run(&self) -> Result<()> {
        let report = self.execute()?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }

    /// Runs the scenario and returns the report.
    pub fn execute(&self) -> Result<RunReport> {
        let scenario = Scenario::load(&self.scenario)?;
        let config = self.config(scenario.config.clone().unwrap_or_default());
        let mut bootloader = scenario.bootloader(config);

        let outcomes = scenario
            .transactions
            .iter()
            .map(|tx| bootloader.execute_transaction(tx))
            .collect::<Vec<_>>();

        let vm = bootloader.vm_mut();
        let accounts = scenario
            .accounts
            .iter()
            .map(|&address| AccountSummary::read(vm, address))
            .collect();
        let report = RunReport {
            outcomes,
            accounts,
            bootloader_balance: vm.balance(BOOTLOADER_FORMAL_ADDRESS),
        };

        info!(
            target: "aa_sim::run",
            included = report.included(),
            rejected = report.rejected(),
            "Scenario finished"
        );
        Ok(report)
    }

    /// Applies the command-line flags on top of the scenario configuration.
    fn config(&self, mut config: BootloaderConfig) -> BootloaderConfig {
        if self.no_validation_rules {
            config.enforce_validation_rules = false;
        }
        if let Some(gas_limit) = self.validation_gas {
            config.validation_gas_limit = gas_limit;
        }
        config
    }
}
