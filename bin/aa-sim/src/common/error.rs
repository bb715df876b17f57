use alloy_primitives::Address;

/// Error types of the aa-sim commands
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Failed to read a file
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse or print JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to create the log file
    #[error("Failed to create log file: {0}")]
    LogFile(std::io::Error),

    /// An account was listed twice
    #[error("Account {0} is listed more than once")]
    DuplicateAccount(Address),

    /// An account collides with the system contract range
    #[error("Account {0} is in the system contract address range")]
    ReservedAddress(Address),
}

/// Result type for the aa-sim commands
pub type Result<T> = std::result::Result<T, SimError>;
