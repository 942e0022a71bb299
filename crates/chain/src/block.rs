//! Block structure, wire parsing, and serialization.
//!
//! Wire layout (big-endian unless noted):
//!
//! ```text
//! version     : u8
//! block_id    : u32
//! unix_time   : u32
//! wallet_id   : length-prefixed signed 64 (little-endian payload)
//! state_id    : u8
//! sign_or_pad : varlen-framed bytes if block_id > 1, else one skipped byte
//! body        : { varlen_length(tx) || tx_bytes }*
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::codec::{
    dec_to_bin, encode_len_i64, encode_length_plus_data, ByteReader,
};
use crate::crypto::Crypto;
use crate::error::BlockError;
use crate::merkle::merkle_tree_root;
use crate::tx::Transaction;
use crate::BlockCore;

/// Immutable once parsed; `hash` is assigned after validation, right
/// before the block rows are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub block_id: u32,
    pub time: i64,
    pub wallet_id: i64,
    pub state_id: u32,
    pub sign: Vec<u8>,
    pub hash: Vec<u8>,
}

/// A parsed block: header, ordered transactions, Merkle root, previous
/// header back-reference, and the raw payload kept for persistence.
pub struct Block {
    pub header: BlockHeader,
    pub prev_header: Option<BlockHeader>,
    pub mrkl_root: Vec<u8>,
    pub bin_data: Vec<u8>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Canonical string the header signature covers.
    pub fn for_sign(header: &BlockHeader, prev: &BlockHeader, mrkl_root: &[u8]) -> String {
        format!(
            "0,{},{},{},{},{},{}",
            header.block_id,
            hex::encode(&prev.hash),
            header.time,
            header.wallet_id,
            header.state_id,
            String::from_utf8_lossy(mrkl_root)
        )
    }
}

/// Decode the fixed header fields plus signature-or-padding.
pub fn parse_block_header(r: &mut ByteReader<'_>) -> Result<BlockHeader, BlockError> {
    if r.len() < 9 {
        error!(size = r.len(), "binary block size is too small");
        return Err(BlockError::MalformedFrame("bad binary block length".into()));
    }

    let version = r.read_uint(1)? as u32;
    let block_id = r.read_uint(4)? as u32;
    let time = r.read_uint(4)? as i64;
    let wallet_id = r.decode_len_i64()?;
    let state_id = r.read_uint(1)? as u32;

    let mut header = BlockHeader {
        version,
        block_id,
        time,
        wallet_id,
        state_id,
        sign: Vec::new(),
        hash: Vec::new(),
    };

    if block_id > 1 {
        let sign_size = r.decode_length()?;
        if r.len() < sign_size {
            error!(block_id, block_time = time, "decoding binary sign");
            return Err(BlockError::MalformedFrame("bad block format (no sign)".into()));
        }
        header.sign = r.next(sign_size)?.to_vec();
    } else {
        r.next(1)?;
    }

    Ok(header)
}

/// Serialize a block: header, signature frame, then varlen-framed
/// transactions. With a non-empty `signing_key` the header is signed over
/// the canonical sign-string built from the given `prev_hash` (hex).
pub fn marshall_block(
    crypto: &dyn Crypto,
    header: &BlockHeader,
    tx_data: &[Vec<u8>],
    prev_hash: &str,
    signing_key: &[u8],
) -> Result<Vec<u8>, BlockError> {
    let mut mrkl_leaves: Vec<Vec<u8>> = Vec::with_capacity(tx_data.len());
    let mut body = Vec::new();
    for tr in tx_data {
        let leaf = hex::encode(crypto.double_hash(tr)?.as_bytes()).into_bytes();
        mrkl_leaves.push(leaf);
        encode_length_plus_data(&mut body, tr);
    }

    let mut signed = Vec::new();
    if !signing_key.is_empty() {
        if mrkl_leaves.is_empty() {
            mrkl_leaves.push(b"0".to_vec());
        }
        let mrkl_root = merkle_tree_root(crypto, &mrkl_leaves)?;
        let forsign = format!(
            "0,{},{},{},{},{},{}",
            header.block_id,
            prev_hash,
            header.time,
            header.wallet_id,
            header.state_id,
            String::from_utf8_lossy(&mrkl_root)
        );
        signed = crypto.sign(signing_key, forsign.as_bytes())?;
    }

    let mut buf = Vec::new();
    dec_to_bin(&mut buf, u64::from(header.version), 1);
    dec_to_bin(&mut buf, u64::from(header.block_id), 4);
    dec_to_bin(&mut buf, header.time as u64, 4);
    encode_len_i64(&mut buf, header.wallet_id);
    dec_to_bin(&mut buf, u64::from(header.state_id), 1);
    encode_length_plus_data(&mut buf, &signed);
    buf.extend_from_slice(&body);

    Ok(buf)
}

impl BlockCore {
    /// Decode, size-check, and link a raw payload into a [`Block`].
    pub fn process_block(&self, data: &[u8]) -> Result<Block, BlockError> {
        if data.len() as i64 > self.syspar.max_block_size {
            error!(
                size = data.len(),
                max_size = self.syspar.max_block_size,
                "block size exceeds max block size"
            );
            return Err(BlockError::OversizedBlock {
                size: data.len(),
                max: self.syspar.max_block_size,
            });
        }
        if data.is_empty() {
            error!("block data is empty");
            return Err(BlockError::MalformedFrame("empty buffer".into()));
        }

        let mut block = self.parse_block(data)?;
        block.bin_data = data.to_vec();
        self.read_previous_block(&mut block)?;
        Ok(block)
    }

    /// Table name to primary-key column, attached to every transaction.
    pub(crate) fn all_table_keys(&self) -> Result<HashMap<String, String>, BlockError> {
        let mut keys = HashMap::new();
        for table in self.storage.list_all_tables()? {
            let col = self.storage.first_column(&table)?;
            keys.insert(table, col);
        }
        Ok(keys)
    }

    pub(crate) fn parse_block(&self, data: &[u8]) -> Result<Block, BlockError> {
        let mut r = ByteReader::new(data);
        let header = parse_block_header(&mut r)?;

        let tables = Arc::new(self.all_table_keys()?);
        let mut transactions = Vec::new();
        let mut mrkl_leaves: Vec<Vec<u8>> = Vec::new();

        // parse transactions
        while !r.is_empty() {
            let tx_size = r.decode_length()?;
            if tx_size == 0 {
                error!(block_id = header.block_id, "transaction size is 0");
                return Err(BlockError::MalformedFrame("transaction size is 0".into()));
            }
            if tx_size > r.len() {
                error!(
                    block_id = header.block_id,
                    size = r.len(),
                    match_size = tx_size,
                    "transaction size does not match encoded length"
                );
                return Err(BlockError::MalformedFrame(format!(
                    "transaction len is too big: {}",
                    tx_size
                )));
            }

            let frame = r.next(tx_size)?;
            let tx = match self.parse_transaction(frame, Arc::clone(&tables)) {
                Ok(tx) => tx,
                Err(e) => {
                    // record the frame as bad by hash, then abort the block
                    if let Ok(hash) = self.crypto.hash(frame) {
                        let _ = self.storage.record_bad_transaction(&hash, &e.to_string());
                    }
                    error!(
                        block_id = header.block_id,
                        block_time = header.time,
                        reason = %e,
                        "parse transaction error"
                    );
                    return Err(e);
                }
            };

            // build merkle tree
            let leaf = hex::encode(self.crypto.double_hash(&tx.full_data)?.as_bytes());
            mrkl_leaves.push(leaf.into_bytes());
            transactions.push(tx);
        }

        if mrkl_leaves.is_empty() {
            mrkl_leaves.push(b"0".to_vec());
        }

        Ok(Block {
            header,
            prev_header: None,
            mrkl_root: merkle_tree_root(self.crypto.as_ref(), &mrkl_leaves)?,
            bin_data: Vec::new(),
            transactions,
        })
    }

    fn read_previous_block(&self, block: &mut Block) -> Result<(), BlockError> {
        if block.header.block_id == 1 {
            block.prev_header = Some(BlockHeader::default());
            return Ok(());
        }
        let prev_id = block.header.block_id - 1;
        let prev = self.storage.load_prev_header(prev_id).map_err(|e| {
            error!(block_id = block.header.block_id, reason = %e, "can't get previous block");
            e
        })?;
        block.prev_header = Some(prev);
        Ok(())
    }
}
