use std::path::PathBuf;

use aa_account::{interfaces::IAccount, Transaction};
use alloy_primitives::{hex, Bytes, B256};
use alloy_sol_types::SolCall;
use clap::{Parser, ValueEnum};

use crate::common::Result;

/// Lifecycle entry point to encode a call for
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LifecycleCall {
    /// `validateTransaction`
    Validate,
    /// `payForTransaction`
    Pay,
    /// `prepareForPaymaster`
    Prepare,
    /// `executeTransaction`
    Execute,
    /// `executeTransactionFromOutside`
    FromOutside,
}

impl LifecycleCall {
    /// Calldata of this entry point for `tx`, using `tx_hash` for both hash arguments.
    pub fn encode(self, tx: &Transaction, tx_hash: B256) -> Bytes {
        let transaction = tx.to_abi();
        let input = match self {
            Self::Validate => IAccount::validateTransactionCall {
                txHash: tx_hash,
                suggestedSignedHash: tx_hash,
                transaction,
            }
            .abi_encode(),
            Self::Pay => IAccount::payForTransactionCall {
                txHash: tx_hash,
                suggestedSignedHash: tx_hash,
                transaction,
            }
            .abi_encode(),
            Self::Prepare => IAccount::prepareForPaymasterCall {
                txHash: tx_hash,
                possibleSignedHash: tx_hash,
                transaction,
            }
            .abi_encode(),
            Self::Execute => IAccount::executeTransactionCall {
                txHash: tx_hash,
                suggestedSignedHash: tx_hash,
                transaction,
            }
            .abi_encode(),
            Self::FromOutside => {
                IAccount::executeTransactionFromOutsideCall { transaction }.abi_encode()
            }
        };
        input.into()
    }
}

/// Print the calldata of a lifecycle call for a transaction
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Transaction file (JSON)
    #[arg(value_name = "TX")]
    pub tx: PathBuf,

    /// Entry point to encode
    #[arg(long = "call", value_enum, default_value = "validate")]
    pub call: LifecycleCall,
}

impl Cmd {
    /// Execute the encode command
    pub fn run(&self) -> Result<()> {
        let content = std::fs::read_to_string(&self.tx)?;
        let tx: Transaction = serde_json::from_str(&content)?;
        let tx_hash = tx.hash();
        println!("Hash:     {tx_hash}");
        println!("Calldata: 0x{}", hex::encode(self.call.encode(&tx, tx_hash)));
        Ok(())
    }
}
