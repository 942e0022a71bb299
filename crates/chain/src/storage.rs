//! Storage collaborator contract.
//!
//! The core never talks to a database driver directly; everything flows
//! through these two traits. [`Storage`] is the ambient connection,
//! [`StorageTx`] a single open transaction obtained from `begin`.
//!
//! # Contract for implementors
//!
//! - `begin` hands out at most one live transaction at a time from the
//!   core's perspective; the executor holds it for the whole block.
//! - Writes issued on a [`StorageTx`] become visible only at `commit`;
//!   `rollback` discards all of them.
//! - `mark_tx_used_now` and `record_bad_transaction` run on the underlying
//!   connection in autocommit mode. They are durable even if the open
//!   transaction later rolls back. The executor relies on this split to
//!   keep bad-transaction markers across a block retry.

use crate::block::{Block, BlockHeader};
use crate::error::StorageError;
use crate::types::Hash;

/// One open storage transaction.
pub trait StorageTx {
    /// Empty the used-transactions staging table.
    fn delete_used_transactions(&mut self) -> Result<(), StorageError>;

    /// Stage `hash` as processed within the current block.
    fn mark_tx_used(&mut self, hash: &Hash) -> Result<(), StorageError>;

    /// Point the transaction-status row at the including block.
    fn update_tx_status_block(&mut self, block_id: u32, hash: &Hash) -> Result<(), StorageError>;

    /// Append the raw transaction to the replay log.
    fn insert_log(&mut self, full_data: &[u8], time: i64) -> Result<(), StorageError>;

    /// Persist the chain-tail record for `block`.
    fn update_block_info(&mut self, block: &Block) -> Result<(), StorageError>;

    /// Append `block` to the block-log table.
    fn insert_into_blockchain(&mut self, block: &Block) -> Result<(), StorageError>;

    fn commit(self: Box<Self>) -> Result<(), StorageError>;

    fn rollback(self: Box<Self>);
}

pub trait Storage: Send + Sync {
    fn begin<'a>(&'a self) -> Result<Box<dyn StorageTx + 'a>, StorageError>;

    /// Names of every state table.
    fn list_all_tables(&self) -> Result<Vec<String>, StorageError>;

    /// Primary-key column of `table`.
    fn first_column(&self, table: &str) -> Result<String, StorageError>;

    /// Whether `full_data` already appears in the replay log.
    fn log_has(&self, full_data: &[u8]) -> Result<bool, StorageError>;

    /// Public key of the node identified by `(wallet_id, state_id)`.
    /// An empty result means the node is unknown.
    fn node_key_for(&self, wallet_id: i64, state_id: u32) -> Result<Vec<u8>, StorageError>;

    /// Seconds the producer must wait after the previous block, from the
    /// scheduler model.
    fn required_sleep(
        &self,
        wallet_id: i64,
        state_id: u32,
        prev_wallet_id: i64,
        prev_state_id: u32,
    ) -> Result<i64, StorageError>;

    /// Header of the block with id `block_id` from the chain log.
    fn load_prev_header(&self, block_id: u32) -> Result<BlockHeader, StorageError>;

    /// Autocommit variant of `mark_tx_used`, see the module docs.
    fn mark_tx_used_now(&self, hash: &Hash) -> Result<(), StorageError>;

    /// Record a failed transaction with its failure reason (autocommit).
    fn record_bad_transaction(&self, hash: &Hash, reason: &str) -> Result<(), StorageError>;
}
