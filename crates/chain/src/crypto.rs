//! Crypto collaborator contract and the default node implementation.
//!
//! The core only ever talks to the [`Crypto`] trait; `Sha3Crypto` is the
//! implementation a node ships with (SHA3-256 digests, Ed25519 header
//! signatures). Node public keys may arrive hex-encoded from chain state,
//! hence the `is_hex_pubkey` flag on `check_sign`.

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use rand_core::OsRng;
use sha3::{Digest, Sha3_256};

use crate::error::CryptoError;
use crate::types::Hash;

pub trait Crypto: Send + Sync {
    /// 32-byte digest of `data`.
    fn hash(&self, data: &[u8]) -> Result<Hash, CryptoError>;

    /// Digest of the digest. Transaction identity and Merkle leaves use this.
    fn double_hash(&self, data: &[u8]) -> Result<Hash, CryptoError>;

    /// Sign `msg` with a 32-byte secret key or a 64-byte keypair blob.
    fn sign(&self, key: &[u8], msg: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify `sig` over `msg`. With `is_hex_pubkey` the key bytes are the
    /// hex form stored in chain state and are decoded first.
    fn check_sign(
        &self,
        pubkey: &[u8],
        msg: &[u8],
        sig: &[u8],
        is_hex_pubkey: bool,
    ) -> Result<bool, CryptoError>;
}

/// Default crypto backend: SHA3-256 + Ed25519.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha3Crypto;

fn sha3_256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn keypair_from_key(key: &[u8]) -> Result<Keypair, CryptoError> {
    match key.len() {
        32 => {
            let secret = SecretKey::from_bytes(key)
                .map_err(|e| CryptoError(format!("invalid secret key: {}", e)))?;
            let public: PublicKey = (&secret).into();
            Ok(Keypair { secret, public })
        }
        64 => Keypair::from_bytes(key)
            .map_err(|e| CryptoError(format!("invalid keypair bytes: {}", e))),
        n => Err(CryptoError(format!("signing key must be 32 or 64 bytes, got {}", n))),
    }
}

impl Crypto for Sha3Crypto {
    fn hash(&self, data: &[u8]) -> Result<Hash, CryptoError> {
        Ok(Hash::from_bytes(sha3_256_bytes(data)))
    }

    fn double_hash(&self, data: &[u8]) -> Result<Hash, CryptoError> {
        Ok(Hash::from_bytes(sha3_256_bytes(&sha3_256_bytes(data))))
    }

    fn sign(&self, key: &[u8], msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let kp = keypair_from_key(key)?;
        Ok(kp.sign(msg).to_bytes().to_vec())
    }

    fn check_sign(
        &self,
        pubkey: &[u8],
        msg: &[u8],
        sig: &[u8],
        is_hex_pubkey: bool,
    ) -> Result<bool, CryptoError> {
        let raw;
        let key_bytes: &[u8] = if is_hex_pubkey {
            raw = hex::decode(pubkey)
                .map_err(|e| CryptoError(format!("invalid hex public key: {}", e)))?;
            &raw
        } else {
            pubkey
        };
        let pk = PublicKey::from_bytes(key_bytes)
            .map_err(|e| CryptoError(format!("invalid public key: {}", e)))?;
        let sig = Signature::from_bytes(sig)
            .map_err(|e| CryptoError(format!("invalid signature: {}", e)))?;
        Ok(pk.verify(msg, &sig).is_ok())
    }
}

/// Generate a fresh Ed25519 keypair: `(public_key, keypair_bytes)`.
pub fn generate_keypair_bytes() -> (Vec<u8>, Vec<u8>) {
    let mut csprng = OsRng {};
    let kp = Keypair::generate(&mut csprng);
    (kp.public.to_bytes().to_vec(), kp.to_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let (pk, kp) = generate_keypair_bytes();
        let c = Sha3Crypto;
        let msg = b"0,2,abcd,1600000000,42,0,deadbeef";
        let sig = c.sign(&kp, msg).expect("sign");
        assert!(c.check_sign(&pk, msg, &sig, false).expect("verify"));
        assert!(!c.check_sign(&pk, b"other message", &sig, false).expect("verify"));
    }

    #[test]
    fn sign_with_secret_half_matches_keypair() {
        let (pk, kp) = generate_keypair_bytes();
        let c = Sha3Crypto;
        let sig = c.sign(&kp[..32], b"msg").expect("sign");
        assert!(c.check_sign(&pk, b"msg", &sig, false).expect("verify"));
    }

    #[test]
    fn hex_pubkey_path() {
        let (pk, kp) = generate_keypair_bytes();
        let c = Sha3Crypto;
        let sig = c.sign(&kp, b"msg").expect("sign");
        let hex_pk = hex::encode(&pk).into_bytes();
        assert!(c.check_sign(&hex_pk, b"msg", &sig, true).expect("verify"));
    }

    #[test]
    fn double_hash_differs_from_hash() {
        let c = Sha3Crypto;
        let h = c.hash(b"data").expect("hash");
        let dh = c.double_hash(b"data").expect("double hash");
        assert_ne!(h, dh);
        assert_eq!(dh, c.hash(h.as_bytes()).expect("rehash"));
    }
}
