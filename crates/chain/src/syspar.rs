//! Cached system parameters.
//!
//! These are the numeric knobs governance keeps in the `system_parameters`
//! table. The node refreshes the cache outside block execution; during a
//! block the values are fixed.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysPar {
    /// Maximum accepted block payload, in bytes.
    pub max_block_size: i64,
    /// Maximum transactions per author per block.
    pub max_block_user_tx: i64,
}

impl Default for SysPar {
    fn default() -> Self {
        SysPar {
            max_block_size: 16 << 20,
            max_block_user_tx: 100,
        }
    }
}

impl SysPar {
    pub fn new(max_block_size: i64, max_block_user_tx: i64) -> Self {
        SysPar {
            max_block_size,
            max_block_user_tx,
        }
    }
}
