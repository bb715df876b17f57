//! An in-memory VM that runs native contracts against a revm-backed world state.
//!
//! Contracts are Rust values implementing [`Contract`]. Their code marker is stored in the world
//! state like bytecode, so deployments and rollbacks of code behave like any other state change.

mod frame;
mod state;
mod tracer;

pub(crate) use frame::Frame;
pub use state::WorldState;
pub use tracer::*;

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, Bytes, B256, U256};
use tracing::trace;

use crate::{
    constants::{gas::CALL_STACK_LIMIT, system},
    system::{ContractDeployer, NonceHolder, SystemContract},
    CallInputs, CallOutcome, Contract, Halt, RuleBreakerAccount, StorageSlot,
};

/// Code the VM knows how to run.
#[derive(Debug, Clone)]
enum Code {
    User(Arc<dyn Contract>),
    System(Arc<dyn SystemContract>),
}

impl Code {
    fn name(&self) -> &'static str {
        match self {
            Self::User(contract) => contract.name(),
            Self::System(contract) => contract.name(),
        }
    }
}

/// A saved world state to return to.
#[derive(Debug, Clone)]
pub struct Checkpoint(WorldState);

/// The VM.
#[derive(Debug, Default)]
pub struct Vm {
    state: WorldState,
    /// Runnable code by code hash.
    known_codes: HashMap<B256, (Bytes, Code)>,
    /// Number of contracts registered so far.
    registered: u64,
    tracer: Option<ValidationTracer>,
    depth: usize,
}

impl Vm {
    /// Creates a VM with the nonce holder and the contract deployer installed.
    pub fn new() -> Self {
        Self::with_state(WorldState::new())
    }

    /// Creates a VM on top of `state` and installs the system contracts.
    pub fn with_state(state: WorldState) -> Self {
        let mut vm = Self { state, ..Default::default() };
        vm.install_code(system::NONCE_HOLDER_ADDRESS, Code::System(Arc::new(NonceHolder)));
        vm.install_code(
            system::CONTRACT_DEPLOYER_ADDRESS,
            Code::System(Arc::new(ContractDeployer)),
        );
        vm
    }

    /// The world state.
    pub const fn state(&self) -> &WorldState {
        &self.state
    }

    /// The world state.
    pub fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    /// Installs `contract` at `address` and returns its code hash.
    pub fn install(&mut self, address: Address, contract: Arc<dyn Contract>) -> B256 {
        self.install_code(address, Code::User(contract))
    }

    /// Installs the rule-breaking account at `address`.
    pub fn install_account(&mut self, address: Address) -> B256 {
        self.install(address, Arc::new(RuleBreakerAccount))
    }

    /// Makes `contract` deployable by code hash without placing it anywhere.
    pub fn register_known_code(&mut self, contract: Arc<dyn Contract>) -> B256 {
        self.register(Code::User(contract))
    }

    /// Whether `code_hash` belongs to a registered contract.
    pub fn is_known_code(&self, code_hash: &B256) -> bool {
        self.known_codes.contains_key(code_hash)
    }

    /// Whether `address` holds code the VM can run.
    pub fn is_installed(&mut self, address: Address) -> bool {
        let code_hash = self.state.code_hash(address);
        self.known_codes.contains_key(&code_hash)
    }

    /// Name of the contract at `address`.
    pub fn contract_name(&mut self, address: Address) -> Option<&'static str> {
        self.code_at(address).map(|code| code.name())
    }

    /// Base token balance of `address`.
    pub fn balance(&mut self, address: Address) -> U256 {
        self.state.balance(address)
    }

    /// Sets the base token balance of `address`.
    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.state.set_balance(address, balance);
    }

    /// Reads `slot` of `address` without charging gas or tracing.
    pub fn storage(&mut self, address: Address, slot: StorageSlot) -> U256 {
        self.state.storage(address, slot.resolve())
    }

    /// Writes `slot` of `address` without charging gas or tracing.
    pub fn set_storage(&mut self, address: Address, slot: StorageSlot, value: U256) {
        self.state.set_storage(address, slot.resolve(), value);
    }

    /// Saves the current world state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.state.clone())
    }

    /// Returns to a saved world state.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        self.state = checkpoint.0;
    }

    /// Runs a top-level call from `caller`.
    ///
    /// The call commits when it succeeds and leaves no trace otherwise.
    pub fn transact_call(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        input: Bytes,
        gas_limit: u64,
    ) -> CallOutcome {
        self.transact(caller, CallInputs::new(target, value, input, gas_limit))
    }

    /// Runs a top-level call described by `inputs`.
    pub fn transact(&mut self, caller: Address, inputs: CallInputs) -> CallOutcome {
        self.execute_call(caller, inputs)
    }

    /// Starts watching the next calls with a validation tracer.
    pub fn start_validation_trace(&mut self, params: ValidationParams) {
        self.tracer = Some(ValidationTracer::new(params));
    }

    /// Stops tracing and returns what was observed.
    pub fn finish_validation_trace(&mut self) -> Option<ValidationReport> {
        self.tracer.take().map(ValidationTracer::into_report)
    }

    pub(crate) fn execute_call(&mut self, caller: Address, inputs: CallInputs) -> CallOutcome {
        trace!(
            target: "aa_account::vm",
            depth = self.depth,
            %caller,
            target = %inputs.target,
            value = %inputs.value,
            gas_limit = inputs.gas_limit,
            is_system = inputs.is_system,
            "Call"
        );

        if self.depth >= CALL_STACK_LIMIT {
            return CallOutcome::Revert { output: Bytes::new(), gas_used: 0 };
        }

        let code = self.code_at(inputs.target);
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.on_call(inputs.target, code.is_some());
            if tracer.should_stop() {
                return CallOutcome::OutOfGas { gas_used: inputs.gas_limit };
            }
        }

        let checkpoint = self.checkpoint();
        if !inputs.value.is_zero() && !self.state.transfer(caller, inputs.target, inputs.value) {
            return CallOutcome::Revert { output: Bytes::new(), gas_used: 0 };
        }

        let Some(code) = code else {
            // No code: a plain transfer.
            return CallOutcome::Success { output: Bytes::new(), gas_used: 0 };
        };

        self.depth += 1;
        let mut frame = Frame::new(self, caller, &inputs);
        let result = match &code {
            Code::User(contract) => contract.call(&mut frame, &inputs.input),
            Code::System(contract) => contract.call(&mut frame, &inputs.input),
        };
        let gas_used = frame.gas().spent();
        self.depth -= 1;

        match result {
            Ok(output) => CallOutcome::Success { output, gas_used },
            Err(Halt::Revert(output)) => {
                trace!(target: "aa_account::vm", contract = code.name(), %output, "Reverted");
                self.revert_to(checkpoint);
                CallOutcome::Revert { output, gas_used }
            }
            Err(Halt::OutOfGas) => {
                trace!(target: "aa_account::vm", contract = code.name(), "Out of gas");
                self.revert_to(checkpoint);
                if let Some(tracer) = self.tracer.as_mut() {
                    if !tracer.should_stop() {
                        tracer.on_out_of_gas();
                    }
                }
                CallOutcome::OutOfGas { gas_used: inputs.gas_limit }
            }
        }
    }

    /// Registers `code` under a fresh code marker, `<name>#<registration index>`.
    ///
    /// Every registration gets its own code hash, even for equal contracts.
    fn register(&mut self, code: Code) -> B256 {
        let marker = Bytes::from(format!("{}#{}", code.name(), self.registered).into_bytes());
        self.registered += 1;
        let code_hash = revm::state::Bytecode::new_legacy(marker.clone()).hash_slow();
        self.known_codes.insert(code_hash, (marker, code));
        code_hash
    }

    fn install_code(&mut self, address: Address, code: Code) -> B256 {
        let code_hash = self.register(code);
        self.deploy_known_code(address, code_hash);
        code_hash
    }

    fn deploy_known_code(&mut self, address: Address, code_hash: B256) -> bool {
        let Some((marker, _)) = self.known_codes.get(&code_hash) else {
            return false;
        };
        self.state.set_code(address, marker.clone());
        true
    }

    fn code_at(&mut self, address: Address) -> Option<Code> {
        let code_hash = self.state.code_hash(address);
        self.known_codes.get(&code_hash).map(|(_, code)| code.clone())
    }
}
