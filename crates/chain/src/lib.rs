//! # Praxis Chain Core Library
//!
//! Block ingestion and transaction execution core for the Praxis
//! permissioned ledger. Given an opaque block payload, the core decodes
//! it, validates structural, temporal, and cryptographic invariants,
//! executes every enclosed transaction against the state store under a
//! single storage transaction, and commits the result to the chain log.
//!
//! ## Module Overview
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `types` | Core types: `Hash` |
//! | `consts` | Wire constants, `TxType` tag set |
//! | `error` | `BlockError` and collaborator error types |
//! | `codec` | Length-prefixed binary codec shared by block and tx framing |
//! | `crypto` | `Crypto` collaborator trait, SHA3-256 / Ed25519 default |
//! | `merkle` | Merkle tree root over per-tx double-hashes |
//! | `syspar` | Cached system parameters |
//! | `storage` | `Storage` / `StorageTx` collaborator traits |
//! | `contract` | Contract registry, descriptors, interpreter seam |
//! | `tx` | Transaction record and the three payload dialects |
//! | `block` | Block structure, header codec, marshalling |
//! | `validate` | Block validation |
//! | `play` | Block execution and commit discipline |
//!
//! ## Pipeline
//!
//! ```text
//! raw bytes ──process_block──▶ Block ──check_block──▶ validated Block
//!                                  ──play_block_safe──▶ committed chain state
//! ```
//!
//! `insert_block` wires the three stages. Everything stateful is reached
//! through collaborators injected into [`BlockCore`]; the core holds no
//! ambient singletons.
//!
//! ## Consensus-Critical Components
//!
//! Komponen berikut bersifat **consensus-critical**; changing any of them
//! forks the chain:
//!
//! - the binary framing in `codec` and `block`
//! - the Merkle construction in `merkle`
//! - the header sign-string and block hash strings
//! - the contract parameter packing in `tx/contract`

pub mod block;
pub mod codec;
pub mod consts;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod play;
pub mod storage;
pub mod syspar;
pub mod tx;
pub mod types;
pub mod validate;

use std::sync::Arc;

use tracing::debug;

pub use block::{marshall_block, parse_block_header, Block, BlockHeader};
pub use consts::TxType;
pub use contract::{
    CallFlags, ContractDescriptor, ContractField, ContractInterpreter, ContractRegistry,
    FieldType,
};
pub use crypto::{Crypto, Sha3Crypto};
pub use error::{BlockError, CryptoError, StorageError};
pub use storage::{Storage, StorageTx};
pub use syspar::SysPar;
pub use tx::{
    ContractTx, ContractValue, RegularHandler, RegularTxRegistry, SmartTx, Transaction,
    TxContext, TxHeader, TxPayload,
};
pub use types::Hash;

/// The assembled core: every collaborator injected once at construction.
///
/// Shared process-wide state (the storage handle, the contract registry,
/// the syspar cache) lives here as explicit dependencies. The registry is
/// read-only during block execution; only one block is in flight at a
/// time.
pub struct BlockCore {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) crypto: Arc<dyn Crypto>,
    pub(crate) contracts: Arc<ContractRegistry>,
    pub(crate) interpreter: Arc<dyn ContractInterpreter>,
    pub(crate) handlers: Arc<RegularTxRegistry>,
    pub(crate) syspar: SysPar,
}

impl BlockCore {
    pub fn new(
        storage: Arc<dyn Storage>,
        crypto: Arc<dyn Crypto>,
        contracts: Arc<ContractRegistry>,
        interpreter: Arc<dyn ContractInterpreter>,
        handlers: Arc<RegularTxRegistry>,
        syspar: SysPar,
    ) -> Self {
        BlockCore {
            storage,
            crypto,
            contracts,
            interpreter,
            handlers,
            syspar,
        }
    }

    /// Top-level entry: parse, validate, then execute-with-commit.
    pub fn insert_block(&self, data: &[u8]) -> Result<(), BlockError> {
        let mut block = self.process_block(data)?;
        self.check_block(&block)?;
        self.play_block_safe(&mut block)?;
        debug!(
            block_id = block.header.block_id,
            "block was inserted successfully"
        );
        Ok(())
    }

    /// The contract registry this core resolves contract ids against.
    pub fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    /// The active system-parameter snapshot.
    pub fn syspar(&self) -> &SysPar {
        &self.syspar
    }
}
