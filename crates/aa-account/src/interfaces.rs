//! Solidity interfaces of the account and of the contracts it talks to.
#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    /// The transaction layout shared by the bootloader, accounts and paymasters.
    ///
    /// Addresses are carried as full words; `reserved[1]` holds the value to transfer.
    #[derive(Debug, PartialEq, Eq)]
    struct Transaction {
        uint256 txType;
        uint256 from;
        uint256 to;
        uint256 gasLimit;
        uint256 gasPerPubdataByteLimit;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        uint256 paymaster;
        uint256 nonce;
        uint256 value;
        uint256[4] reserved;
        bytes data;
        bytes signature;
        bytes32[] factoryDeps;
        bytes paymasterInput;
        bytes reservedDynamic;
    }

    /// Lifecycle entry points every custom account exposes to the bootloader.
    #[derive(Debug, PartialEq, Eq)]
    interface IAccount {
        function validateTransaction(bytes32 txHash, bytes32 suggestedSignedHash, Transaction calldata transaction) external payable returns (bytes4 magic);
        function executeTransaction(bytes32 txHash, bytes32 suggestedSignedHash, Transaction calldata transaction) external payable;
        function executeTransactionFromOutside(Transaction calldata transaction) external payable;
        function payForTransaction(bytes32 txHash, bytes32 suggestedSignedHash, Transaction calldata transaction) external payable;
        function prepareForPaymaster(bytes32 txHash, bytes32 possibleSignedHash, Transaction calldata transaction) external payable;
    }

    /// The paymaster side of a sponsored transaction.
    #[derive(Debug, PartialEq, Eq)]
    interface IPaymaster {
        function validateAndPayForPaymasterTransaction(bytes32 txHash, bytes32 suggestedSignedHash, Transaction calldata transaction) external payable returns (bytes4 magic, bytes context);
    }

    /// Selectors of the supported `paymasterInput` flows.
    #[derive(Debug, PartialEq, Eq)]
    interface IPaymasterFlow {
        function general(bytes calldata input) external;
        function approvalBased(address token, uint256 minAllowance, bytes calldata innerInput) external;
    }

    /// Minimal nonce registry.
    #[derive(Debug, PartialEq, Eq)]
    interface INonceHolder {
        function getMinNonce(address account) external view returns (uint256);
        function incrementMinNonceIfEquals(uint256 expectedNonce) external;
        function isNonceUsed(address account, uint256 nonce) external view returns (bool);
    }

    /// The subset of the deployer used for deterministic deployments.
    #[derive(Debug, PartialEq, Eq)]
    interface IContractDeployer {
        function create2(bytes32 salt, bytes32 bytecodeHash, bytes calldata input) external payable returns (address);
    }

    /// The subset of ERC20 used by the approval-based paymaster flow.
    #[derive(Debug, PartialEq, Eq)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }
}
