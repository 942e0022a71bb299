//! Struct dialect: packed records with a statically known shape.
//!
//! The tag byte is part of the record itself (its first field), so unlike
//! the other dialects the frame is decoded from the very first byte.

use crate::codec::{dec_to_bin, encode_len_i64, encode_length_plus_data, ByteReader};
use crate::error::BlockError;
use crate::tx::TxHeader;

/// Closed set of struct-dialect records.
#[derive(Debug, Clone, PartialEq)]
pub enum StructTx {
    FirstBlock(FirstBlockTx),
}

impl StructTx {
    pub fn header(&self) -> TxHeader {
        match self {
            StructTx::FirstBlock(tx) => tx.header(),
        }
    }
}

/// The genesis bootstrap record: seeds the founder account and the first
/// full node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirstBlockTx {
    pub tx_type: u8,
    pub time: u32,
    pub wallet_id: i64,
    pub citizen_id: i64,
    pub public_key: Vec<u8>,
    pub node_public_key: Vec<u8>,
    pub host: String,
}

impl FirstBlockTx {
    pub fn decode(raw: &[u8]) -> Result<Self, BlockError> {
        let mut r = ByteReader::new(raw);
        Ok(FirstBlockTx {
            tx_type: r.read_u8()?,
            time: r.read_uint(4)? as u32,
            wallet_id: r.decode_len_i64()?,
            citizen_id: r.decode_len_i64()?,
            public_key: r.read_byte_slice()?.to_vec(),
            node_public_key: r.read_byte_slice()?.to_vec(),
            host: r.read_string()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.tx_type);
        dec_to_bin(&mut out, u64::from(self.time), 4);
        encode_len_i64(&mut out, self.wallet_id);
        encode_len_i64(&mut out, self.citizen_id);
        encode_length_plus_data(&mut out, &self.public_key);
        encode_length_plus_data(&mut out, &self.node_public_key);
        encode_length_plus_data(&mut out, self.host.as_bytes());
        out
    }

    pub fn header(&self) -> TxHeader {
        TxHeader {
            tx_type: self.tx_type,
            time: i64::from(self.time),
            user_id: if self.citizen_id != 0 {
                self.citizen_id
            } else {
                self.wallet_id
            },
            state_id: 0,
        }
    }
}
