use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::SolCall;
use tracing::debug;

use super::{require_system_call, SystemContract};
use crate::{constants::gas, interfaces::IContractDeployer, vm::Frame, Halt, Host};

/// Revert reason of a deployment of code the VM does not know.
pub const UNKNOWN_CODE_HASH: &str = "The code hash is not known";
/// Revert reason of a deployment to an address that already has code.
pub const CODE_HASH_NON_ZERO: &str = "Code hash is non-zero";

/// Deploys known code at deterministic addresses.
///
/// Only `create2` is supported. Constructors are not run: the new contract starts with empty
/// storage and the value attached to the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractDeployer;

impl SystemContract for ContractDeployer {
    fn name(&self) -> &'static str {
        "ContractDeployer"
    }

    fn call(&self, frame: &mut Frame<'_>, input: &Bytes) -> Result<Bytes, Halt> {
        let call = IContractDeployer::create2Call::abi_decode(input)
            .map_err(|_| Halt::Revert(Bytes::new()))?;
        require_system_call(frame)?;
        frame.charge(gas::DEPLOY)?;

        if !frame.is_known_code(&call.bytecodeHash) {
            return Err(Halt::reason(UNKNOWN_CODE_HASH));
        }

        let address = create2_address(frame.caller(), call.salt, call.bytecodeHash, &call.input);
        if frame.has_code(address) {
            return Err(Halt::reason(CODE_HASH_NON_ZERO));
        }
        frame.deploy(address, call.bytecodeHash);

        let value = frame.call_value();
        if !value.is_zero() && !frame.transfer(address, value) {
            return Err(Halt::Revert(Bytes::new()));
        }

        debug!(
            target: "aa_account::deployer",
            deployer = %frame.caller(),
            %address,
            %value,
            "Deployed contract"
        );
        Ok(IContractDeployer::create2Call::abi_encode_returns(&address).into())
    }
}

/// Address of a contract deployed by `sender` through `create2`.
///
/// `keccak256(keccak256("zksyncCreate2") ++ sender ++ salt ++ bytecodeHash ++ keccak256(input))`,
/// truncated to its last 20 bytes.
pub fn create2_address(sender: Address, salt: B256, bytecode_hash: B256, input: &[u8]) -> Address {
    let prefix = keccak256(b"zksyncCreate2");
    let mut preimage = Vec::with_capacity(5 * 32);
    preimage.extend_from_slice(prefix.as_slice());
    preimage.extend_from_slice(sender.into_word().as_slice());
    preimage.extend_from_slice(salt.as_slice());
    preimage.extend_from_slice(bytecode_hash.as_slice());
    preimage.extend_from_slice(keccak256(input).as_slice());
    Address::from_word(keccak256(preimage))
}
