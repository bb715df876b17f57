use alloy_primitives::{Address, B256, U256};
use revm::interpreter::Gas;

use super::Vm;
use crate::{constants::gas, CallInputs, CallOutcome, Host, OutOfGas, StorageSlot};

/// A running call frame.
///
/// Every state access is charged against the frame's [`Gas`] and reported to the validation
/// tracer when one is active.
#[derive(Debug)]
pub(crate) struct Frame<'a> {
    vm: &'a mut Vm,
    address: Address,
    caller: Address,
    value: U256,
    is_system: bool,
    gas: Gas,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(vm: &'a mut Vm, caller: Address, inputs: &CallInputs) -> Self {
        Self {
            vm,
            address: inputs.target,
            caller,
            value: inputs.value,
            is_system: inputs.is_system,
            gas: Gas::new(inputs.gas_limit),
        }
    }

    /// Gas accounting of the frame.
    pub(crate) const fn gas(&self) -> &Gas {
        &self.gas
    }

    /// Charges `cost`. When the frame cannot pay, it loses all of its gas.
    pub(crate) fn charge(&mut self, cost: u64) -> Result<(), OutOfGas> {
        if self.gas.record_cost(cost) {
            Ok(())
        } else {
            self.gas.spend_all();
            Err(OutOfGas)
        }
    }

    /// Whether `code_hash` belongs to a registered contract.
    pub(crate) fn is_known_code(&self, code_hash: &B256) -> bool {
        self.vm.is_known_code(code_hash)
    }

    /// Whether `address` has code.
    pub(crate) fn has_code(&mut self, address: Address) -> bool {
        self.vm.state.has_code(address)
    }

    /// Places the known code `code_hash` at `address`.
    pub(crate) fn deploy(&mut self, address: Address, code_hash: B256) -> bool {
        self.vm.deploy_known_code(address, code_hash)
    }

    /// Moves `value` from the running contract to `to`.
    pub(crate) fn transfer(&mut self, to: Address, value: U256) -> bool {
        self.vm.state.transfer(self.address, to, value)
    }

    /// Reports an access to the tracer and stops the frame when the tracer says so.
    fn trace_storage(&mut self, slot: &StorageSlot) -> Result<(), OutOfGas> {
        if let Some(tracer) = self.vm.tracer.as_mut() {
            tracer.on_storage_access(self.address, self.caller, slot);
            if tracer.should_stop() {
                self.gas.spend_all();
                return Err(OutOfGas);
            }
        }
        Ok(())
    }
}

impl Host for Frame<'_> {
    fn address(&self) -> Address {
        self.address
    }

    fn caller(&self) -> Address {
        self.caller
    }

    fn call_value(&self) -> U256 {
        self.value
    }

    fn is_system_call(&self) -> bool {
        self.is_system
    }

    fn gas_left(&self) -> u64 {
        self.gas.remaining()
    }

    fn balance(&mut self, address: Address) -> Result<U256, OutOfGas> {
        self.charge(gas::BALANCE)?;
        if let Some(tracer) = self.vm.tracer.as_mut() {
            tracer.on_balance_read(self.address, address);
            if tracer.should_stop() {
                self.gas.spend_all();
                return Err(OutOfGas);
            }
        }
        Ok(self.vm.state.balance(address))
    }

    fn sload(&mut self, slot: StorageSlot) -> Result<U256, OutOfGas> {
        self.charge(gas::SLOAD)?;
        self.trace_storage(&slot)?;
        Ok(self.vm.state.storage(self.address, slot.resolve()))
    }

    fn sstore(&mut self, slot: StorageSlot, value: U256) -> Result<(), OutOfGas> {
        let key = slot.resolve();
        let current = self.vm.state.storage(self.address, key);
        let cost = if current.is_zero() && !value.is_zero() {
            gas::SSTORE_SET
        } else {
            gas::SSTORE_RESET
        };
        self.charge(cost)?;
        self.trace_storage(&slot)?;
        self.vm.state.set_storage(self.address, key, value);
        Ok(())
    }

    fn call(&mut self, mut inputs: CallInputs) -> Result<CallOutcome, OutOfGas> {
        let cost = if inputs.value.is_zero() { gas::CALL } else { gas::CALL + gas::CALL_VALUE };
        self.charge(cost)?;

        inputs.gas_limit = inputs.gas_limit.min(self.gas.remaining());
        let outcome = self.vm.execute_call(self.address, inputs);
        // Never exceeds the remaining gas, the callee limit was capped above.
        let _ = self.gas.record_cost(outcome.gas_used());
        Ok(outcome)
    }
}
