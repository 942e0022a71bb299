//! Contract registry and interpreter seam.
//!
//! The registry is populated at startup from the `{prefix}_contracts`
//! tables and refreshed whenever a contract-editing transaction applies.
//! During block execution it is read-only; descriptors are handed out as
//! shared references. The interpreter itself lives outside the core — the
//! executor drives it through [`ContractInterpreter`] with a phase mask.

use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::BlockError;
use crate::storage::StorageTx;
use crate::tx::ContractTx;

/// Scalar types a contract may declare for its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Uint64,
    Float64,
    Int64,
    Decimal,
    String,
    Bytes,
    List,
}

/// One declared contract parameter.
#[derive(Debug, Clone)]
pub struct ContractField {
    pub name: String,
    pub ftype: FieldType,
    /// Free-form tag string; `image` excludes the field from the
    /// sign-string.
    pub tags: String,
}

impl ContractField {
    pub fn new(name: &str, ftype: FieldType, tags: &str) -> Self {
        ContractField {
            name: name.to_string(),
            ftype,
            tags: tags.to_string(),
        }
    }
}

/// Parsed shape of one registered contract.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub id: i64,
    pub name: String,
    /// Declared parameters, in declaration order.
    pub fields: Vec<ContractField>,
}

/// Process-wide contract registry, keyed by contract id.
#[derive(Default)]
pub struct ContractRegistry {
    by_id: RwLock<HashMap<i64, Arc<ContractDescriptor>>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, desc: ContractDescriptor) {
        self.by_id.write().insert(desc.id, Arc::new(desc));
    }

    pub fn by_id(&self, id: i64) -> Option<Arc<ContractDescriptor>> {
        self.by_id.read().get(&id).cloned()
    }

    pub fn remove(&self, id: i64) -> bool {
        self.by_id.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }
}

/// Interpreter phase mask.
///
/// `INIT | CONDITION` runs admission checks (including resource checks),
/// `ACTION` applies the contract body. The executor always passes the full
/// mask when playing a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFlags(u8);

impl CallFlags {
    pub const INIT: CallFlags = CallFlags(0b001);
    pub const CONDITION: CallFlags = CallFlags(0b010);
    pub const ACTION: CallFlags = CallFlags(0b100);

    pub fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for CallFlags {
    type Output = CallFlags;
    fn bitor(self, rhs: CallFlags) -> CallFlags {
        CallFlags(self.0 | rhs.0)
    }
}

/// The smart-contract interpreter, supplied by the embedding node.
///
/// All reads and writes the interpreter performs must go through `db` so
/// they share the block's atomicity. Errors surface as a failed
/// transaction, not a failed block.
pub trait ContractInterpreter: Send + Sync {
    fn call(
        &self,
        tx: &ContractTx,
        flags: CallFlags,
        db: &mut dyn StorageTx,
    ) -> Result<(), BlockError>;
}
