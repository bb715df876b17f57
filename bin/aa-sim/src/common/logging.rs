//! `tracing` setup of the CLI.
//!
//! `RUST_LOG` wins when set. Otherwise each `-v` lowers the threshold by one level, starting at
//! ERROR, for the `aa_sim` and `aa_account` targets. Without either, nothing is logged.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use super::{Result, SimError};

/// Logging arguments shared by every subcommand.
#[derive(Debug, Clone, Default, Parser)]
pub struct LogArgs {
    /// Verbosity: -v error, -vv warn, -vvv info, -vvvv debug, -vvvvv trace
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long = "log.file", visible_aliases = ["log-file"], global = true)]
    pub log_file: Option<PathBuf>,

    /// Plain stderr output without ANSI colors
    #[arg(long = "log.no-color", visible_aliases = ["log-no-color"], global = true)]
    pub log_no_color: bool,
}

impl LogArgs {
    /// The level selected by `-v`, `None` when logging is off.
    pub const fn level(&self) -> Option<Level> {
        match self.verbose {
            0 => None,
            1 => Some(Level::ERROR),
            2 => Some(Level::WARN),
            3 => Some(Level::INFO),
            4 => Some(Level::DEBUG),
            _ => Some(Level::TRACE),
        }
    }

    /// Filter used by the subscriber.
    pub fn filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            return EnvFilter::from_default_env();
        }
        match self.level() {
            Some(level) => EnvFilter::new(format!("aa_sim={level},aa_account={level}")),
            None => EnvFilter::new("off"),
        }
    }

    /// Installs the global subscriber.
    ///
    /// Event targets (`aa_account::bootloader`, `aa_account::vm`, ...) are printed from DEBUG on,
    /// where events of several components interleave.
    pub fn init(&self) -> Result<()> {
        let show_target = self.level().is_some_and(|level| level >= Level::DEBUG);
        let builder = fmt().with_env_filter(self.filter()).with_target(show_target);

        match &self.log_file {
            Some(path) => {
                let file = std::fs::File::create(path).map_err(SimError::LogFile)?;
                builder.with_writer(file).with_ansi(false).init();
            }
            None => builder.with_writer(std::io::stderr).with_ansi(!self.log_no_color).init(),
        }
        Ok(())
    }
}
