//! Error types for block ingestion and execution.
//!
//! `BlockError` carries one variant per failure condition the core can
//! produce. Parsing and validation errors abort the whole block; execution
//! errors on a single transaction are isolated by the executor and never
//! surface through this type (the offending transaction is recorded as bad
//! instead). Collaborator failures are wrapped in `Storage` / `Crypto`.

use thiserror::Error;

/// Failure reported by the storage collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct StorageError(pub String);

/// Failure reported by the crypto collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CryptoError(pub String);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlockError {
    /// The buffer is shorter than a field needs, a decoded length exceeds
    /// the remaining input, or a frame is structurally broken.
    #[error("bad block format ({0})")]
    MalformedFrame(String),

    #[error("block size {size} exceeds max block size {max}")]
    OversizedBlock { size: usize, max: i64 },

    #[error("decoded length {size} exceeds max transaction size {max}")]
    OversizedTx { size: usize, max: usize },

    #[error("unknown contract {0}")]
    UnknownContract(i64),

    #[error("unknown transaction type {0}")]
    UnknownTxType(u8),

    #[error("transaction {tx_hash} failed validation: {reason}")]
    ValidationFailed { tx_hash: String, reason: String },

    #[error("incorrect block_id {got} != {prev} +1")]
    SequenceGap { got: u32, prev: u32 },

    #[error("incorrect block time")]
    BlockTooEarly,

    #[error("duplicate transaction {0}")]
    DuplicateTx(String),

    #[error("user {user_id} exceeds max transactions per block")]
    QuotaExceeded { user_id: i64 },

    #[error("transaction time is too big")]
    TxInFuture,

    #[error("incorrect transaction time")]
    TxTooOld,

    #[error("empty user id")]
    MissingAuthor,

    #[error("transaction is already in the log")]
    Replay,

    #[error("empty node public key")]
    MissingNodeKey,

    #[error("incorrect signature")]
    BadBlockSignature,

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),

    #[error("interpreter: {0}")]
    Interpreter(String),
}
