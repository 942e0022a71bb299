use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use hex::{decode as hex_decode, encode as hex_encode};

use crate::error::BlockError;

/// Hash type: 32-byte digest wrapper
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Hash(b)
    }
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
    pub fn to_hex(&self) -> String {
        hex_encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_hex()).finish()
    }
}

impl FromStr for Hash {
    type Err = BlockError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let v = hex_decode(s)
            .map_err(|e| BlockError::MalformedFrame(format!("invalid hash hex: {}", e)))?;
        if v.len() != 32 {
            return Err(BlockError::MalformedFrame(format!(
                "invalid hash length: {}",
                v.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&v);
        Ok(Hash(arr))
    }
}

/* serde impls for Hash as hex string */
impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Hash, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_round_trip() {
        let h = Hash::from_bytes([7u8; 32]);
        assert_eq!(h.to_hex().len(), 64);
        let back = Hash::from_str(&h.to_hex()).expect("parse");
        assert_eq!(h, back);
    }

    #[test]
    fn hash_rejects_wrong_length() {
        assert!(Hash::from_str("abcd").is_err());
    }
}
