//! The transaction handed to an account by the bootloader.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use serde::{Deserialize, Serialize};

use crate::{
    address_to_word, call_discarding_output,
    constants::system::BOOTLOADER_FORMAL_ADDRESS,
    interfaces::{self, IPaymasterFlow, IERC20},
    word_to_address, AccountError, CallInputs, CallStatus, Host,
};

/// The type of account-abstraction transactions.
pub const EIP712_TX_TYPE: u8 = 0x71;

/// Index of the `reserved` field holding the value to transfer.
pub const RESERVED_VALUE_INDEX: usize = 1;

/// A pending transaction as seen by accounts.
///
/// The bootloader builds it before validation and passes the same value to every lifecycle stage.
/// Accounts never modify it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    /// Transaction type.
    pub tx_type: U256,
    /// The account the transaction belongs to.
    pub from: Address,
    /// Destination of the call performed by the account.
    pub to: Address,
    /// Gas limit of the whole transaction.
    pub gas_limit: U256,
    /// Maximum gas price per byte of pubdata.
    pub gas_per_pubdata_byte_limit: U256,
    /// Maximum fee per gas.
    pub max_fee_per_gas: U256,
    /// Maximum priority fee per gas.
    pub max_priority_fee_per_gas: U256,
    /// Sponsor of the transaction fee, zero when the account pays itself.
    pub paymaster: Address,
    /// Account-scoped sequence number.
    pub nonce: U256,
    /// Value field of the transaction. Accounts of this crate transfer `reserved[1]` instead.
    pub value: U256,
    /// Auxiliary numeric fields; `reserved[1]` is the value to transfer.
    pub reserved: [U256; 4],
    /// Calldata of the call performed by the account.
    pub data: Bytes,
    /// Signature. Unused by the accounts of this crate.
    pub signature: Bytes,
    /// Hashes of bytecodes that must be known before execution.
    pub factory_deps: Vec<B256>,
    /// Input handed to the paymaster flow.
    pub paymaster_input: Bytes,
    /// Reserved for future use.
    pub reserved_dynamic: Bytes,
}

impl Transaction {
    /// Creates a transaction of `from` calling `to`.
    pub fn new(from: Address, to: Address) -> Self {
        Self { tx_type: U256::from(EIP712_TX_TYPE), from, to, ..Default::default() }
    }

    /// Sets the nonce.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = U256::from(nonce);
        self
    }

    /// Sets the value to transfer, stored in `reserved[1]`.
    pub fn with_value(mut self, value: U256) -> Self {
        self.reserved[RESERVED_VALUE_INDEX] = value;
        self
    }

    /// Sets the calldata.
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Sets the gas limit and the fee per gas.
    pub fn with_gas(mut self, gas_limit: u64, max_fee_per_gas: u64) -> Self {
        self.gas_limit = U256::from(gas_limit);
        self.max_fee_per_gas = U256::from(max_fee_per_gas);
        self
    }

    /// Sets the paymaster and its input.
    pub fn with_paymaster(mut self, paymaster: Address, input: impl Into<Bytes>) -> Self {
        self.paymaster = paymaster;
        self.paymaster_input = input.into();
        self
    }

    /// Whether a paymaster sponsors the fee.
    pub fn has_paymaster(&self) -> bool {
        !self.paymaster.is_zero()
    }

    /// The gas limit, saturated to `u64`.
    pub fn gas_limit_u64(&self) -> u64 {
        self.gas_limit.saturating_to()
    }

    /// The value to transfer, `reserved[1]`, which must fit into 128 bits.
    pub fn value_to_transfer(&self) -> Result<U256, AccountError> {
        let value = u128::try_from(self.reserved[RESERVED_VALUE_INDEX])
            .map_err(|_| AccountError::ValueOverflow)?;
        Ok(U256::from(value))
    }

    /// The fee the account owes the bootloader, `max_fee_per_gas * gas_limit`.
    pub fn fee(&self) -> Result<U256, AccountError> {
        self.max_fee_per_gas.checked_mul(self.gas_limit).ok_or(AccountError::ArithmeticOverflow)
    }

    /// The ABI representation.
    pub fn to_abi(&self) -> interfaces::Transaction {
        interfaces::Transaction {
            txType: self.tx_type,
            from: address_to_word(self.from),
            to: address_to_word(self.to),
            gasLimit: self.gas_limit,
            gasPerPubdataByteLimit: self.gas_per_pubdata_byte_limit,
            maxFeePerGas: self.max_fee_per_gas,
            maxPriorityFeePerGas: self.max_priority_fee_per_gas,
            paymaster: address_to_word(self.paymaster),
            nonce: self.nonce,
            value: self.value,
            reserved: self.reserved,
            data: self.data.clone(),
            signature: self.signature.clone(),
            factoryDeps: self.factory_deps.clone(),
            paymasterInput: self.paymaster_input.clone(),
            reservedDynamic: self.reserved_dynamic.clone(),
        }
    }

    /// Hash identifying the transaction: keccak256 of its ABI encoding.
    pub fn hash(&self) -> B256 {
        keccak256(self.to_abi().abi_encode())
    }

    /// Sends the fee to the bootloader and reports how the transfer ended.
    pub fn pay_to_the_bootloader<H: Host + ?Sized>(
        &self,
        host: &mut H,
    ) -> Result<CallStatus, AccountError> {
        let amount = self.fee()?;
        call_discarding_output(host, BOOTLOADER_FORMAL_ADDRESS, amount, Bytes::new())
            .map_err(AccountError::from)
    }

    /// Runs the paymaster flow selected by the first four bytes of `paymaster_input`.
    ///
    /// The approval-based flow makes sure the paymaster may pull at least `minAllowance` of the
    /// token from the account. The general flow needs nothing from the account.
    pub fn process_paymaster_input<H: Host + ?Sized>(
        &self,
        host: &mut H,
    ) -> Result<(), AccountError> {
        let input = &self.paymaster_input;
        if input.len() < 4 {
            return Err(AccountError::PaymasterInputTooShort);
        }
        let selector = &input[..4];

        if selector == IPaymasterFlow::approvalBasedCall::SELECTOR {
            let flow = IPaymasterFlow::approvalBasedCall::abi_decode(input)
                .map_err(|_| AccountError::MalformedPaymasterInput)?;
            let owner = host.address();
            let output = token_call(
                host,
                flow.token,
                IERC20::allowanceCall { owner, spender: self.paymaster }.abi_encode(),
            )?;
            let allowance = IERC20::allowanceCall::abi_decode_returns(&output)
                .map_err(|_| AccountError::TokenApprovalFailed)?;

            if allowance < flow.minAllowance {
                // Some tokens require the allowance to be reset to zero first.
                safe_approve(host, flow.token, self.paymaster, U256::ZERO)?;
                safe_approve(host, flow.token, self.paymaster, flow.minAllowance)?;
            }
            Ok(())
        } else if selector == IPaymasterFlow::generalCall::SELECTOR {
            Ok(())
        } else {
            Err(AccountError::UnsupportedPaymasterFlow)
        }
    }
}

impl From<&Transaction> for interfaces::Transaction {
    fn from(tx: &Transaction) -> Self {
        tx.to_abi()
    }
}

impl From<interfaces::Transaction> for Transaction {
    fn from(tx: interfaces::Transaction) -> Self {
        Self {
            tx_type: tx.txType,
            from: word_to_address(tx.from),
            to: word_to_address(tx.to),
            gas_limit: tx.gasLimit,
            gas_per_pubdata_byte_limit: tx.gasPerPubdataByteLimit,
            max_fee_per_gas: tx.maxFeePerGas,
            max_priority_fee_per_gas: tx.maxPriorityFeePerGas,
            paymaster: word_to_address(tx.paymaster),
            nonce: tx.nonce,
            value: tx.value,
            reserved: tx.reserved,
            data: tx.data,
            signature: tx.signature,
            factory_deps: tx.factoryDeps,
            paymaster_input: tx.paymasterInput,
            reserved_dynamic: tx.reservedDynamic,
        }
    }
}

fn token_call<H: Host + ?Sized>(
    host: &mut H,
    token: Address,
    input: Vec<u8>,
) -> Result<Bytes, AccountError> {
    let gas_limit = host.gas_left();
    host.call(CallInputs::new(token, U256::ZERO, input.into(), gas_limit))?
        .into_result()
        .map_err(AccountError::token)
}

/// `SafeERC20.safeApprove`: empty return data counts as success.
fn safe_approve<H: Host + ?Sized>(
    host: &mut H,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), AccountError> {
    let output = token_call(host, token, IERC20::approveCall { spender, amount }.abi_encode())?;
    if output.is_empty() {
        return Ok(());
    }
    match IERC20::approveCall::abi_decode_returns(&output) {
        Ok(true) => Ok(()),
        _ => Err(AccountError::TokenApprovalFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ACCOUNT: Address = address!("0000000000000000000000000000000000100000");
    const TARGET: Address = address!("0000000000000000000000000000000000100001");

    #[test]
    fn test_abi_conversion_preserves_every_field() {
        let tx = Transaction::new(ACCOUNT, TARGET)
            .with_nonce(3)
            .with_value(U256::from(42))
            .with_data(vec![1, 2, 3])
            .with_gas(1_000_000, 250)
            .with_paymaster(TARGET, vec![9, 9, 9, 9]);
        assert_eq!(Transaction::from(tx.to_abi()), tx);
    }

    #[test]
    fn test_value_comes_from_reserved_slot() {
        let mut tx = Transaction::new(ACCOUNT, TARGET).with_value(U256::from(7));
        tx.value = U256::from(1_000);
        assert_eq!(tx.value_to_transfer(), Ok(U256::from(7)));

        tx.reserved[RESERVED_VALUE_INDEX] = U256::from(u128::MAX) + U256::from(1);
        assert_eq!(tx.value_to_transfer(), Err(AccountError::ValueOverflow));
    }

    #[test]
    fn test_fee_is_gas_limit_times_max_fee() {
        let tx = Transaction::new(ACCOUNT, TARGET).with_gas(100_000, 3);
        assert_eq!(tx.fee(), Ok(U256::from(300_000)));

        let mut tx = tx;
        tx.max_fee_per_gas = U256::MAX;
        assert_eq!(tx.fee(), Err(AccountError::ArithmeticOverflow));
    }

    #[test]
    fn test_hash_depends_on_contents() {
        let tx = Transaction::new(ACCOUNT, TARGET).with_nonce(0);
        assert_eq!(tx.hash(), tx.clone().hash());
        assert_ne!(tx.hash(), tx.with_nonce(1).hash());
    }

    #[test]
    fn test_json_uses_camel_case_and_defaults() {
        let json = serde_json::json!({
            "from": ACCOUNT,
            "to": TARGET,
            "nonce": "0x2",
            "reserved": ["0x0", "0x5", "0x0", "0x0"],
            "paymasterInput": "0x",
        });
        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.nonce, U256::from(2));
        assert_eq!(tx.value_to_transfer(), Ok(U256::from(5)));
        assert!(!tx.has_paymaster());
    }
}
