//! Block execution under a single storage transaction.
//!
//! All writes of a block flow through one open [`StorageTx`] and become
//! visible atomically at commit. The single exception is bookkeeping for a
//! *failed* transaction: its used-marker and bad-transaction record are
//! issued on the autocommit path so they survive a later rollback. A
//! failed transaction never aborts the block; a storage failure while
//! recording a *successful* one always does.

use tracing::{debug, error, warn};

use crate::block::Block;
use crate::contract::CallFlags;
use crate::error::BlockError;
use crate::storage::StorageTx;
use crate::tx::{Transaction, TxContext, TxPayload};
use crate::BlockCore;

impl BlockCore {
    /// Execute `block` and commit, or roll everything back.
    pub fn play_block_safe(&self, block: &mut Block) -> Result<(), BlockError> {
        let mut db = self.storage.begin().map_err(|e| {
            error!(block_id = block.header.block_id, reason = %e, "starting db transaction");
            e
        })?;

        if let Err(e) = self.play_block(block, db.as_mut()) {
            db.rollback();
            return Err(e);
        }
        db.commit()?;
        debug!(block_id = block.header.block_id, "block committed");
        Ok(())
    }

    fn play_block(
        &self,
        block: &mut Block,
        db: &mut dyn StorageTx,
    ) -> Result<(), BlockError> {
        let header = block.header.clone();

        db.delete_used_transactions().map_err(|e| {
            error!(block_id = header.block_id, reason = %e, "delete used transactions");
            e
        })?;

        for p in &mut block.transactions {
            if let Err(e) = self.play_transaction(p, &header, db) {
                // skip this transaction: mark it used outside the block's
                // transaction so the marker survives rollback
                if let Err(me) = self.storage.mark_tx_used_now(&p.hash) {
                    error!(tx_hash = %p.hash, reason = %me, "marking bad transaction used");
                }
                if let Err(be) = self.storage.record_bad_transaction(&p.hash, &e.to_string()) {
                    error!(tx_hash = %p.hash, reason = %be, "recording bad transaction");
                }
                warn!(
                    block_id = header.block_id,
                    block_time = header.time,
                    tx_hash = %p.hash,
                    tx_type = p.tx_type,
                    reason = %e,
                    "transaction failed, skipping"
                );
                continue;
            }

            db.mark_tx_used(&p.hash).map_err(|e| {
                error!(tx_hash = %p.hash, reason = %e, "marking transaction used");
                e
            })?;
            db.update_tx_status_block(header.block_id, &p.hash)
                .map_err(|e| {
                    error!(tx_hash = %p.hash, reason = %e, "updating transaction status block id");
                    e
                })?;
            db.insert_log(&p.full_data, p.time).map_err(|e| {
                error!(tx_hash = %p.hash, reason = %e, "inserting transaction into log");
                e
            })?;
        }

        self.assign_block_hash(block)?;
        db.update_block_info(block)?;
        db.insert_into_blockchain(block)?;
        Ok(())
    }

    fn play_transaction(
        &self,
        p: &mut Transaction,
        header: &crate::block::BlockHeader,
        db: &mut dyn StorageTx,
    ) -> Result<(), BlockError> {
        match &mut p.payload {
            TxPayload::Contract(contract_tx) => {
                // resource checks run inside the interpreter during
                // Init | Condition
                self.interpreter.call(
                    contract_tx,
                    CallFlags::INIT | CallFlags::CONDITION | CallFlags::ACTION,
                    db,
                )
            }
            TxPayload::Struct { handler, .. } | TxPayload::Regular { handler } => {
                let mut ctx = TxContext {
                    block: header,
                    db,
                    tables: &*p.tables,
                };
                handler.action(&mut ctx)
            }
        }
    }

    /// The canonical block hash, assigned post-validation before the block
    /// rows are written.
    fn assign_block_hash(&self, block: &mut Block) -> Result<(), BlockError> {
        let prev_hash = block
            .prev_header
            .as_ref()
            .map(|p| hex::encode(&p.hash))
            .unwrap_or_default();
        let input = format!(
            "{},{},{},{},{},{}",
            block.header.block_id,
            prev_hash,
            block.header.time,
            block.header.wallet_id,
            block.header.state_id,
            String::from_utf8_lossy(&block.mrkl_root)
        );
        block.header.hash = self.crypto.double_hash(input.as_bytes())?.as_bytes().to_vec();
        Ok(())
    }
}
