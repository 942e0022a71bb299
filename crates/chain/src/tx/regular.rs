//! Regular dialect: per-tag handler objects behind a static registry.
//!
//! Each non-contract, non-struct tag maps to a constructor producing a
//! [`RegularHandler`]. `init` and `validate` run at parse time, `action`
//! at play time with the open storage transaction. The registry is
//! populated once at node startup; the core itself ships no handlers.

use std::collections::HashMap;

use crate::block::BlockHeader;
use crate::consts::TxType;
use crate::error::BlockError;
use crate::storage::StorageTx;
use crate::tx::TxHeader;
use crate::types::Hash;

/// Execution context handed to `action`.
pub struct TxContext<'a> {
    pub block: &'a BlockHeader,
    /// The block's open storage transaction; all writes must go through it.
    pub db: &'a mut dyn StorageTx,
    /// Table name to primary-key column, for row writes.
    pub tables: &'a HashMap<String, String>,
}

pub trait RegularHandler: Send {
    /// Decode and prepare internal state. Runs once, before `header`.
    fn init(&mut self) -> Result<(), BlockError> {
        Ok(())
    }

    /// Common header extracted from the decoded payload. `None` means the
    /// payload carried no usable header and the frame is rejected.
    fn header(&self) -> Option<TxHeader>;

    /// Stateless admission checks.
    fn validate(&self) -> Result<(), BlockError> {
        Ok(())
    }

    /// Apply the transaction's effects through `ctx.db`.
    fn action(&mut self, ctx: &mut TxContext<'_>) -> Result<(), BlockError>;
}

/// Constructor from the tag-stripped transaction body.
pub type HandlerCtor = fn(&[u8]) -> Result<Box<dyn RegularHandler>, BlockError>;

/// Static tag-to-constructor registry.
#[derive(Default)]
pub struct RegularTxRegistry {
    ctors: HashMap<u8, HandlerCtor>,
}

impl RegularTxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tx_type: TxType, ctor: HandlerCtor) {
        self.ctors.insert(tx_type.tag(), ctor);
    }

    pub fn get(&self, tag: u8) -> Option<HandlerCtor> {
        self.ctors.get(&tag).copied()
    }
}

/// Construct, init, and validate the handler for a regular-dialect frame.
pub(crate) fn parse_regular_tx(
    registry: &RegularTxRegistry,
    tag: u8,
    body: &[u8],
    tx_hash: &Hash,
) -> Result<(Box<dyn RegularHandler>, TxHeader), BlockError> {
    let ctor = registry.get(tag).ok_or(BlockError::UnknownTxType(tag))?;
    let mut handler = ctor(body)?;
    handler.init()?;
    let header = handler
        .header()
        .ok_or_else(|| BlockError::MalformedFrame("tx header is nil".into()))?;
    handler.validate().map_err(|e| BlockError::ValidationFailed {
        tx_hash: tx_hash.to_hex(),
        reason: e.to_string(),
    })?;
    Ok((handler, header))
}
