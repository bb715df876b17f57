use alloy_primitives::{keccak256, Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolInterface};

use crate::{
    address_to_word, call_discarding_output,
    constants::{magic::PAYMASTER_VALIDATION_SUCCESS_MAGIC, system::BOOTLOADER_FORMAL_ADDRESS},
    interfaces::{
        IERC20::{self, IERC20Calls},
        IPaymaster, IPaymasterFlow,
    },
    AccountError, CallFailure, CallInputs, Contract, Halt, Host, StorageSlot, Transaction, Vm,
    ONLY_BOOTLOADER,
};

/// A plain ERC20 token.
///
/// Balances live in a mapping at slot 0 and allowances in a nested mapping at slot 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestToken {
    /// `approve` returns no data, like some old tokens.
    pub approve_returns_nothing: bool,
    /// `approve` refuses to move a non-zero allowance to another non-zero value.
    pub requires_zero_allowance_first: bool,
}

impl TestToken {
    const BALANCES_SLOT: U256 = U256::ZERO;
    const ALLOWANCES_SLOT: U256 = U256::from_limbs([1, 0, 0, 0]);

    /// Storage slot of the balance of `owner`.
    pub fn balance_slot(owner: Address) -> StorageSlot {
        StorageSlot::of_address(owner, Self::BALANCES_SLOT)
    }

    /// Storage slot of the allowance `owner` gave `spender`.
    pub fn allowance_slot(owner: Address, spender: Address) -> StorageSlot {
        StorageSlot::Mapping {
            key: address_to_word(spender),
            slot: StorageSlot::of_address(owner, Self::ALLOWANCES_SLOT).resolve(),
        }
    }

    /// Credits `amount` to `owner` of the token at `token`.
    pub fn mint(vm: &mut Vm, token: Address, owner: Address, amount: U256) {
        let balance = Self::balance_of(vm, token, owner);
        vm.set_storage(token, Self::balance_slot(owner), balance + amount);
    }

    /// Balance of `owner`.
    pub fn balance_of(vm: &mut Vm, token: Address, owner: Address) -> U256 {
        vm.storage(token, Self::balance_slot(owner))
    }

    /// Allowance `owner` gave `spender`.
    pub fn allowance(vm: &mut Vm, token: Address, owner: Address, spender: Address) -> U256 {
        vm.storage(token, Self::allowance_slot(owner, spender))
    }

    /// Sets the allowance `owner` gave `spender`.
    pub fn set_allowance(
        vm: &mut Vm,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) {
        vm.set_storage(token, Self::allowance_slot(owner, spender), amount);
    }

    fn move_balance(
        host: &mut dyn Host,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), Halt> {
        let from_balance = host.sload(Self::balance_slot(from))?;
        let Some(remaining) = from_balance.checked_sub(amount) else {
            return Err(Halt::reason("ERC20: transfer amount exceeds balance"));
        };
        host.sstore(Self::balance_slot(from), remaining)?;
        let to_balance = host.sload(Self::balance_slot(to))?;
        host.sstore(Self::balance_slot(to), to_balance + amount)?;
        Ok(())
    }
}

impl Contract for TestToken {
    fn name(&self) -> &'static str {
        "TestToken"
    }

    fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, Halt> {
        let call = IERC20Calls::abi_decode(input).map_err(|_| Halt::Revert(Bytes::new()))?;

        match call {
            IERC20Calls::balanceOf(call) => {
                let balance = host.sload(Self::balance_slot(call.owner))?;
                Ok(IERC20::balanceOfCall::abi_encode_returns(&balance).into())
            }
            IERC20Calls::allowance(call) => {
                let allowance = host.sload(Self::allowance_slot(call.owner, call.spender))?;
                Ok(IERC20::allowanceCall::abi_encode_returns(&allowance).into())
            }
            IERC20Calls::approve(call) => {
                let slot = Self::allowance_slot(host.caller(), call.spender);
                if self.requires_zero_allowance_first &&
                    !call.amount.is_zero() &&
                    !host.sload(slot)?.is_zero()
                {
                    return Err(Halt::reason("approve from non-zero to non-zero allowance"));
                }
                host.sstore(slot, call.amount)?;
                if self.approve_returns_nothing {
                    return Ok(Bytes::new());
                }
                Ok(IERC20::approveCall::abi_encode_returns(&true).into())
            }
            IERC20Calls::transfer(call) => {
                let from = host.caller();
                Self::move_balance(host, from, call.to, call.amount)?;
                Ok(IERC20::transferCall::abi_encode_returns(&true).into())
            }
            IERC20Calls::transferFrom(call) => {
                let slot = Self::allowance_slot(call.from, host.caller());
                let allowance = host.sload(slot)?;
                let Some(remaining) = allowance.checked_sub(call.amount) else {
                    return Err(Halt::reason("ERC20: insufficient allowance"));
                };
                host.sstore(slot, remaining)?;
                Self::move_balance(host, call.from, call.to, call.amount)?;
                Ok(IERC20::transferFromCall::abi_encode_returns(&true).into())
            }
        }
    }
}

/// A paymaster that takes `minAllowance` tokens from the account and pays the fee in base token.
///
/// Only the approval-based flow is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPaymaster;

impl Contract for ApprovalPaymaster {
    fn name(&self) -> &'static str {
        "ApprovalPaymaster"
    }

    fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, Halt> {
        let Ok(call) = IPaymaster::validateAndPayForPaymasterTransactionCall::abi_decode(input)
        else {
            // Accepts plain transfers.
            return Ok(Bytes::new());
        };
        if host.caller() != BOOTLOADER_FORMAL_ADDRESS {
            return Err(Halt::reason(ONLY_BOOTLOADER));
        }

        let tx = Transaction::from(call.transaction);
        let flow = IPaymasterFlow::approvalBasedCall::abi_decode(&tx.paymaster_input)
            .map_err(|_| Halt::reason("Unsupported paymaster flow"))?;

        let pull = IERC20::transferFromCall {
            from: tx.from,
            to: host.address(),
            amount: flow.minAllowance,
        };
        let gas_limit = host.gas_left();
        host.call(CallInputs::new(flow.token, U256::ZERO, pull.abi_encode().into(), gas_limit))?
            .into_result()
            .map_err(|failure| match failure {
                CallFailure::Reverted(output) => Halt::Revert(output),
                CallFailure::OutOfGas => Halt::OutOfGas,
            })?;

        let fee = tx.fee().map_err(AccountError::into_halt)?;
        if !call_discarding_output(&mut *host, BOOTLOADER_FORMAL_ADDRESS, fee, Bytes::new())?
            .is_success()
        {
            return Err(Halt::reason("Failed to transfer tx fee to the bootloader"));
        }

        let ret = IPaymaster::validateAndPayForPaymasterTransactionReturn {
            magic: PAYMASTER_VALIDATION_SUCCESS_MAGIC,
            context: Bytes::new(),
        };
        Ok(IPaymaster::validateAndPayForPaymasterTransactionCall::abi_encode_returns(&ret).into())
    }
}

/// Records every call it receives, or reverts with fixed data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRecorder {
    /// Data to revert with instead of recording.
    pub revert_with: Option<Bytes>,
}

impl CallRecorder {
    /// Slot counting the received calls.
    pub const CALLS_SLOT: U256 = U256::ZERO;
    /// Slot holding the value of the last call.
    pub const LAST_VALUE_SLOT: U256 = U256::from_limbs([1, 0, 0, 0]);
    /// Slot holding the keccak256 of the calldata of the last call.
    pub const LAST_INPUT_HASH_SLOT: U256 = U256::from_limbs([2, 0, 0, 0]);
    /// Slot holding the caller of the last call.
    pub const LAST_CALLER_SLOT: U256 = U256::from_limbs([3, 0, 0, 0]);

    /// A recorder that always reverts with `output`.
    pub fn reverting(output: impl Into<Bytes>) -> Self {
        Self { revert_with: Some(output.into()) }
    }

    /// Number of calls recorded at `address`.
    pub fn calls(vm: &mut Vm, address: Address) -> U256 {
        vm.storage(address, StorageSlot::Direct(Self::CALLS_SLOT))
    }

    /// Value of the last call recorded at `address`.
    pub fn last_value(vm: &mut Vm, address: Address) -> U256 {
        vm.storage(address, StorageSlot::Direct(Self::LAST_VALUE_SLOT))
    }

    /// keccak256 of the calldata of the last call recorded at `address`.
    pub fn last_input_hash(vm: &mut Vm, address: Address) -> U256 {
        vm.storage(address, StorageSlot::Direct(Self::LAST_INPUT_HASH_SLOT))
    }

    /// Caller of the last call recorded at `address`.
    pub fn last_caller(vm: &mut Vm, address: Address) -> U256 {
        vm.storage(address, StorageSlot::Direct(Self::LAST_CALLER_SLOT))
    }
}

impl Contract for CallRecorder {
    fn name(&self) -> &'static str {
        "CallRecorder"
    }

    fn call(&self, host: &mut dyn Host, input: &Bytes) -> Result<Bytes, Halt> {
        if let Some(output) = &self.revert_with {
            return Err(Halt::Revert(output.clone()));
        }

        let calls = host.sload(StorageSlot::Direct(Self::CALLS_SLOT))?;
        host.sstore(StorageSlot::Direct(Self::CALLS_SLOT), calls + U256::from(1))?;
        let value = host.call_value();
        host.sstore(StorageSlot::Direct(Self::LAST_VALUE_SLOT), value)?;
        let input_hash = U256::from_be_bytes(keccak256(input).0);
        host.sstore(StorageSlot::Direct(Self::LAST_INPUT_HASH_SLOT), input_hash)?;
        let caller = address_to_word(host.caller());
        host.sstore(StorageSlot::Direct(Self::LAST_CALLER_SLOT), caller)?;
        Ok(input.clone())
    }
}
