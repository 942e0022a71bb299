//! Transaction parsing: one frame in, one uniform record out.
//!
//! Dispatch is on the first byte of the frame: tags above 127 are
//! contract-dialect (the tag is the contract id), tags in the struct set
//! are packed records, everything else goes to a registered per-tag
//! handler. The transaction hash is computed over the full frame *before*
//! dispatch, so a frame that fails to parse can still be recorded as bad.

pub mod contract;
pub mod regular;
pub mod structs;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::error;

pub use contract::{ContractTx, ContractValue, SmartTx};
pub use regular::{HandlerCtor, RegularHandler, RegularTxRegistry, TxContext};
pub use structs::{FirstBlockTx, StructTx};

use crate::consts::{is_contract_tag, TxType};
use crate::error::BlockError;
use crate::types::Hash;
use crate::BlockCore;

/// Common header shared by every dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxHeader {
    pub tx_type: u8,
    pub time: i64,
    pub user_id: i64,
    pub state_id: u32,
}

/// Dialect-specific payload of a parsed transaction.
pub enum TxPayload {
    Contract(ContractTx),
    Struct {
        record: StructTx,
        handler: Box<dyn RegularHandler>,
    },
    Regular {
        handler: Box<dyn RegularHandler>,
    },
}

impl fmt::Debug for TxPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxPayload::Contract(tx) => f
                .debug_struct("Contract")
                .field("contract", &tx.contract.name)
                .finish(),
            TxPayload::Struct { record, .. } => {
                f.debug_struct("Struct").field("record", record).finish()
            }
            TxPayload::Regular { .. } => f.debug_struct("Regular").finish_non_exhaustive(),
        }
    }
}

/// One parsed transaction, exclusively owned by its block.
pub struct Transaction {
    /// Hash of the full frame, computed before dispatch.
    pub hash: Hash,
    /// The full frame, retained for the log and re-hashing.
    pub full_data: Vec<u8>,
    /// Frame body after the dispatch tag (the full frame for struct
    /// dialect, whose record starts at the tag).
    pub binary_data: Vec<u8>,
    pub tx_type: u8,
    pub time: i64,
    pub state_id: u32,
    pub wallet_id: i64,
    pub citizen_id: i64,
    /// Regular-dialect author id; zero for the other dialects.
    pub user_id: i64,
    pub used_gas: Decimal,
    /// Table name to primary-key column, attached at parse time for row
    /// writes during `action`.
    pub tables: Arc<HashMap<String, String>>,
    pub payload: TxPayload,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("hash", &self.hash)
            .field("tx_type", &self.tx_type)
            .field("time", &self.time)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub fn is_contract(&self) -> bool {
        matches!(self.payload, TxPayload::Contract(_))
    }

    /// The author identity of the dialect: envelope user for contract
    /// transactions, citizen falling back to wallet for struct records,
    /// the handler header's user for regular ones.
    pub fn author_id(&self) -> i64 {
        match self.payload {
            TxPayload::Regular { .. } => self.user_id,
            _ => {
                if self.citizen_id != 0 {
                    self.citizen_id
                } else {
                    self.wallet_id
                }
            }
        }
    }

    pub fn header(&self) -> TxHeader {
        TxHeader {
            tx_type: self.tx_type,
            time: self.time,
            user_id: self.author_id(),
            state_id: self.state_id,
        }
    }
}

impl BlockCore {
    /// Parse one transaction frame into a uniform record.
    pub(crate) fn parse_transaction(
        &self,
        raw: &[u8],
        tables: Arc<HashMap<String, String>>,
    ) -> Result<Transaction, BlockError> {
        if raw.is_empty() {
            return Err(BlockError::MalformedFrame("empty transaction buffer".into()));
        }

        let hash = self.crypto.hash(raw)?;
        let tag = raw[0];

        let mut tx = Transaction {
            hash,
            full_data: raw.to_vec(),
            binary_data: Vec::new(),
            tx_type: tag,
            time: 0,
            state_id: 0,
            wallet_id: 0,
            citizen_id: 0,
            user_id: 0,
            used_gas: Decimal::ZERO,
            tables,
            payload: TxPayload::Regular {
                handler: Box::new(UnparsedHandler),
            },
        };

        if is_contract_tag(tag) {
            // skip the byte with the transaction type
            tx.binary_data = raw[1..].to_vec();
            let parsed = contract::parse_contract_tx(&self.contracts, &tx.binary_data, &tx.hash)?;
            tx.time = parsed.smart.time;
            tx.state_id = parsed.smart.state_id as u32;
            if tx.state_id > 0 {
                tx.citizen_id = parsed.smart.user_id;
                tx.wallet_id = 0;
            } else {
                tx.citizen_id = 0;
                tx.wallet_id = parsed.smart.user_id;
            }
            tx.payload = TxPayload::Contract(parsed);
            return Ok(tx);
        }

        let tx_type = TxType::from_tag(tag).ok_or_else(|| {
            error!(tx_hash = %tx.hash, tx_type = tag, "unknown transaction type");
            BlockError::UnknownTxType(tag)
        })?;

        if tx_type.is_struct() {
            // the record starts at the tag byte
            tx.binary_data = raw.to_vec();
            let record = match tx_type {
                TxType::FirstBlock => StructTx::FirstBlock(FirstBlockTx::decode(raw)?),
                _ => return Err(BlockError::UnknownTxType(tag)),
            };
            let header = record.header();
            tx.time = header.time;
            tx.state_id = header.state_id;
            match &record {
                StructTx::FirstBlock(fb) => {
                    tx.wallet_id = fb.wallet_id;
                    tx.citizen_id = fb.citizen_id;
                }
            }
            // struct records skip init/validate; the shape is static
            let ctor = self
                .handlers
                .get(tag)
                .ok_or(BlockError::UnknownTxType(tag))?;
            let handler = ctor(&tx.binary_data)?;
            tx.payload = TxPayload::Struct { record, handler };
            return Ok(tx);
        }

        // skip the byte with the transaction type
        tx.binary_data = raw[1..].to_vec();
        let (handler, header) =
            regular::parse_regular_tx(&self.handlers, tag, &tx.binary_data, &tx.hash)?;
        tx.time = header.time;
        tx.state_id = header.state_id;
        tx.user_id = header.user_id;
        tx.payload = TxPayload::Regular { handler };
        Ok(tx)
    }
}

/// Placeholder payload used only while a frame is being parsed.
struct UnparsedHandler;

impl RegularHandler for UnparsedHandler {
    fn header(&self) -> Option<TxHeader> {
        None
    }
    fn action(&mut self, _ctx: &mut TxContext<'_>) -> Result<(), BlockError> {
        Err(BlockError::MalformedFrame("transaction was never parsed".into()))
    }
}
