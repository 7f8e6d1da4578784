//! Error types for timelock script, address and transaction handling

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelockError {
    #[error("Invalid locktime: {0}")]
    InvalidLocktime(String),

    #[error("Invalid hash: expected 20 bytes, got {0}")]
    InvalidHash(usize),

    #[error("Address checksum mismatch")]
    ChecksumMismatch,

    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    #[error("Address type mismatch: expected {expected}, got {actual}")]
    AddressTypeMismatch { expected: String, actual: String },

    #[error("Address version 0x{0:02x} is not valid for the selected network")]
    UnknownAddressVersion(u8),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },

    #[error("Fee rate unavailable: {0}")]
    FeeRateUnavailable(String),

    #[error("Insufficient funds: total input {total_input} does not cover fee {fee}")]
    InsufficientFunds { total_input: u64, fee: u64 },

    #[error("Invalid txid: {0}")]
    InvalidTxid(String),

    #[error("No UTXOs to spend")]
    NoUtxos,

    #[error("Signing key does not match the public key hash in the redeem script")]
    SigningKeyMismatch,

    #[error("Lock time not satisfied: {0}")]
    LockTimeNotSatisfied(String),

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Verification failed for input {index}: {reason}")]
    VerificationFailed { index: usize, reason: String },

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    TransportError(String),
}

pub type Result<T> = std::result::Result<T, TimelockError>;
