//! Block validation: temporal bounds, sequence continuity, per-author
//! quotas, duplicate detection, and the header signature over the Merkle
//! root.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, warn};

use crate::block::{Block, BlockHeader};
use crate::consts::{ERROR_TIME, MAX_TX_BACK, MAX_TX_FORW};
use crate::error::BlockError;
use crate::tx::{Transaction, TxHeader};
use crate::BlockCore;

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl BlockCore {
    /// Validate a parsed block against the previous header and chain state.
    pub fn check_block(&self, block: &Block) -> Result<(), BlockError> {
        let header = &block.header;

        // exclude blocks from future: logging-only, the block still goes
        // through (source behavior, kept under a flagged tightening later)
        if header.time > unix_now() {
            warn!(
                block_id = header.block_id,
                block_time = header.time,
                "block time is larger than now"
            );
        }

        if let Some(prev) = &block.prev_header {
            if header.block_id != prev.block_id + 1 {
                error!(
                    block_id = header.block_id,
                    prev_block_id = prev.block_id,
                    "block id is not previous plus one"
                );
                return Err(BlockError::SequenceGap {
                    got: header.block_id,
                    prev: prev.block_id,
                });
            }

            // check time interval between blocks
            let sleep_time = self.storage.required_sleep(
                header.wallet_id,
                header.state_id,
                prev.wallet_id,
                prev.state_id,
            )?;
            if prev.time + sleep_time - header.time > ERROR_TIME {
                error!(
                    block_id = header.block_id,
                    block_time = header.time,
                    prev_time = prev.time,
                    sleep_time,
                    "incorrect block time"
                );
                return Err(BlockError::BlockTooEarly);
            }
        }

        // check each transaction
        let mut tx_counter: HashMap<i64, i64> = HashMap::new();
        let mut tx_hashes: HashSet<String> = HashSet::new();
        for p in &block.transactions {
            let hex_hash = p.hash.to_hex();
            // check for duplicate transactions
            if !tx_hashes.insert(hex_hash.clone()) {
                error!(
                    block_id = header.block_id,
                    tx_hash = %hex_hash,
                    "duplicate transaction"
                );
                return Err(BlockError::DuplicateTx(hex_hash));
            }

            // check for max transaction per user in one block
            let author = p.author_id();
            let count = tx_counter.entry(author).or_insert(0);
            *count += 1;
            if *count > self.syspar.max_block_user_tx {
                error!(
                    block_id = header.block_id,
                    tx_user_id = author,
                    user_tx = *count,
                    max_user_tx = self.syspar.max_block_user_tx,
                    "user exceeds max transactions per block"
                );
                return Err(BlockError::QuotaExceeded { user_id: author });
            }

            self.check_tx(p, header.time, Some(header), false)?;
        }

        if !self.check_hash(block)? {
            error!(block_id = header.block_id, "incorrect signature");
            return Err(BlockError::BadBlockSignature);
        }
        Ok(())
    }

    /// Per-transaction temporal and author checks. `check_dup` additionally
    /// consults the replay log; the admission path sets it, intra-block
    /// validation does not.
    pub(crate) fn check_tx(
        &self,
        p: &Transaction,
        check_time: i64,
        block: Option<&BlockHeader>,
        check_dup: bool,
    ) -> Result<(), BlockError> {
        if check_dup && self.storage.log_has(&p.full_data)? {
            warn!(tx_hash = %p.hash, "transaction is already in the log");
            return Err(BlockError::Replay);
        }

        // tx time cannot be more than MAX_TX_FORW seconds ahead of block time
        if p.time - MAX_TX_FORW > check_time {
            error!(
                tx_hash = %p.hash,
                tx_type = p.tx_type,
                tx_time = p.time,
                reason = "transaction time is too big",
                "transaction from the future"
            );
            return Err(BlockError::TxInFuture);
        }

        // tx time cannot be older than MAX_TX_BACK seconds of block time
        if p.time < check_time - MAX_TX_BACK {
            error!(
                tx_hash = %p.hash,
                tx_type = p.tx_type,
                tx_time = p.time,
                reason = "incorrect transaction time",
                "stale transaction"
            );
            return Err(BlockError::TxTooOld);
        }

        if !p.is_contract() {
            if let Some(b) = block {
                if b.block_id != 1 && p.author_id() == 0 {
                    error!(tx_hash = %p.hash, tx_type = p.tx_type, "empty user id");
                    return Err(BlockError::MissingAuthor);
                }
            }
        }

        Ok(())
    }

    /// Verify the header signature over the canonical sign-string. Genesis
    /// has no signature and always passes.
    fn check_hash(&self, block: &Block) -> Result<bool, BlockError> {
        if block.header.block_id == 1 {
            return Ok(true);
        }
        let prev = match &block.prev_header {
            Some(prev) => prev,
            None => return Ok(true),
        };

        let node_public_key = self
            .storage
            .node_key_for(block.header.wallet_id, block.header.state_id)?;
        if node_public_key.is_empty() {
            error!(
                block_id = block.header.block_id,
                block_wallet_id = block.header.wallet_id,
                "node public key is empty"
            );
            return Err(BlockError::MissingNodeKey);
        }

        let forsign = Block::for_sign(&block.header, prev, &block.mrkl_root);
        let ok = self
            .crypto
            .check_sign(
                &node_public_key,
                forsign.as_bytes(),
                &block.header.sign,
                true,
            )
            .map_err(|e| {
                error!(
                    block_id = block.header.block_id,
                    reason = %e,
                    "checking block header sign"
                );
                e
            })?;
        Ok(ok)
    }

    /// Admission check for a single transaction outside any block: parse,
    /// then apply the temporal checks plus the replay veto.
    pub fn check_transaction(&self, data: &[u8]) -> Result<TxHeader, BlockError> {
        let tables = std::sync::Arc::new(self.all_table_keys()?);
        let p = self.parse_transaction(data, tables)?;
        self.check_tx(&p, unix_now(), None, true)?;
        Ok(p.header())
    }
}
