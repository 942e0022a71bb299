//! Wire-level constants and the closed set of transaction type tags.

/// Upper bound for any single decoded length prefix, in bytes.
pub const MAX_TX_SIZE: usize = 33_554_432;

/// Seconds a transaction timestamp may lead the block timestamp.
pub const MAX_TX_FORW: i64 = 600;

/// Seconds a transaction timestamp may trail the block timestamp.
pub const MAX_TX_BACK: i64 = 86_400;

/// Tolerance, in seconds, for the inter-block sleep check.
pub const ERROR_TIME: i64 = 1;

/// Transaction type tags with a statically known meaning.
///
/// Tags above 127 are contract-dialect transactions and never appear here;
/// everything else must be one of these to be accepted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxType {
    FirstBlock = 1,
    Transfer = 2,
    ChangeHostVote = 3,
    UpdFullNodes = 4,
    ChangeNodeKey = 5,
    NewEcosystem = 6,
}

impl TxType {
    pub fn from_tag(tag: u8) -> Option<TxType> {
        match tag {
            1 => Some(TxType::FirstBlock),
            2 => Some(TxType::Transfer),
            3 => Some(TxType::ChangeHostVote),
            4 => Some(TxType::UpdFullNodes),
            5 => Some(TxType::ChangeNodeKey),
            6 => Some(TxType::NewEcosystem),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Struct-dialect tags: payload is a packed record with a statically
    /// known shape. Only the genesis bootstrap record for now.
    pub fn is_struct(self) -> bool {
        matches!(self, TxType::FirstBlock)
    }
}

/// Contract-dialect transactions carry their contract id in the tag byte.
pub fn is_contract_tag(tag: u8) -> bool {
    tag > 127
}
