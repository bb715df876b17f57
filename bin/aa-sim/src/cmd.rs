use clap::{Parser, Subcommand};

use crate::common::{LogArgs, SimError};

/// Main command of the aa-sim CLI tool
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version = "0.1")]
pub struct MainCmd {
    /// Logging configuration
    #[command(flatten)]
    pub log: LogArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the aa-sim CLI tool
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scenario through the bootloader
    Run(crate::run::Cmd),
    /// Print the calldata of a lifecycle call for a transaction
    Encode(crate::encode::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Simulator error
    #[error("{0}")]
    Sim(#[from] SimError),
}

impl MainCmd {
    /// Execute the main command
    pub fn run(&self) -> Result<(), Error> {
        self.log.init()?;
        match &self.command {
            Command::Run(cmd) => cmd.run()?,
            Command::Encode(cmd) => cmd.run()?,
        }
        Ok(())
    }
}
