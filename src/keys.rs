//! Key handling: WIF private keys and hex-encoded public keys

use crate::crypto::{base58check_decode, base58check_encode, hash160};
use crate::error::{Result, TimelockError};
use crate::types::*;
use secp256k1::{Secp256k1, SecretKey};
use std::fmt;

/// secp256k1 public key with its serialization form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
    compressed: bool,
}

impl PublicKey {
    /// Parse a 33-byte compressed or 65-byte uncompressed SEC1 key
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let inner = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|e| TimelockError::InvalidKeyEncoding(format!("public key: {}", e)))?;
        Ok(PublicKey {
            inner,
            compressed: bytes.len() == 33,
        })
    }

    pub fn from_hex(pubkey_hex: &str) -> Result<Self> {
        let bytes = hex::decode(pubkey_hex.trim())
            .map_err(|e| TimelockError::InvalidKeyEncoding(format!("public key hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    pub fn to_bytes(&self) -> ByteString {
        if self.compressed {
            self.inner.serialize().to_vec()
        } else {
            self.inner.serialize_uncompressed().to_vec()
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// RIPEMD160(SHA256(serialized key))
    pub fn pubkey_hash(&self) -> PubkeyHash {
        hash160(&self.to_bytes())
    }

    pub fn inner(&self) -> &secp256k1::PublicKey {
        &self.inner
    }
}

/// Private key decoded from wallet import format
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: SecretKey,
    compressed: bool,
    network: Network,
}

impl PrivateKey {
    pub fn new(secret: SecretKey, compressed: bool, network: Network) -> Self {
        PrivateKey { secret, compressed, network }
    }

    /// Decode a WIF string; the version byte must belong to `network`
    pub fn from_wif(wif: &str, network: Network) -> Result<Self> {
        let payload = base58check_decode(wif.trim()).map_err(|e| match e {
            TimelockError::ChecksumMismatch => {
                TimelockError::InvalidKeyEncoding("WIF checksum mismatch".to_string())
            }
            other => TimelockError::InvalidKeyEncoding(other.to_string()),
        })?;

        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == 0x01 => true,
            34 => {
                return Err(TimelockError::InvalidKeyEncoding(format!(
                    "invalid compression flag 0x{:02x}",
                    payload[33]
                )))
            }
            len => {
                return Err(TimelockError::InvalidKeyEncoding(format!(
                    "invalid WIF payload length {}",
                    len
                )))
            }
        };

        if payload[0] != network.wif_version() {
            return Err(TimelockError::InvalidKeyEncoding(format!(
                "WIF version 0x{:02x} does not belong to {}",
                payload[0], network
            )));
        }

        let secret = SecretKey::from_slice(&payload[1..33])
            .map_err(|e| TimelockError::InvalidKeyEncoding(format!("secret key: {}", e)))?;
        Ok(PrivateKey { secret, compressed, network })
    }

    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(self.network.wif_version());
        payload.extend_from_slice(&self.secret.secret_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        base58check_encode(&payload)
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(&secp, &self.secret),
            compressed: self.compressed,
        }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("compressed", &self.compressed)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Where the public key of the timelock comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// WIF private key
    PrivateKey(String),
    /// Hex-encoded public key
    PublicKey(String),
}

/// Resolve a key source to its public key
pub fn resolve_public_key(source: &KeySource, network: Network) -> Result<PublicKey> {
    match source {
        KeySource::PrivateKey(wif) => Ok(PrivateKey::from_wif(wif, network)?.public_key()),
        KeySource::PublicKey(pubkey_hex) => PublicKey::from_hex(pubkey_hex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIF_TESTNET: &str = "cNR4jZU2sR5goytD4wXT4aeKcbqGSekbxLxY69v8aryxTU1SMnJZ";
    const WIF_MAINNET: &str = "Kx45GeUBSMPReYQwgXiKhG9FzNXrnCeutJp4yjTd5kKxCitadm3C";
    const PUBKEY_HEX: &str = "0250863ad64a87ae8a2fe83c1af1a8403cb53f53e486d8511dad8a04887e5b2352";

    #[test]
    fn test_wif_to_public_key() {
        let key = PrivateKey::from_wif(WIF_TESTNET, Network::Regtest).unwrap();
        assert_eq!(key.public_key().to_hex(), PUBKEY_HEX);
        assert_eq!(
            hex::encode(key.public_key().pubkey_hash()),
            "f54a5851e9372b87810a8e60cdd2e7cfd80b6e31"
        );
    }

    #[test]
    fn test_wif_round_trip() {
        let key = PrivateKey::from_wif(WIF_MAINNET, Network::Mainnet).unwrap();
        assert_eq!(key.to_wif(), WIF_MAINNET);
    }

    #[test]
    fn test_wif_wrong_network() {
        assert!(matches!(
            PrivateKey::from_wif(WIF_MAINNET, Network::Regtest),
            Err(TimelockError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_wif_garbage() {
        assert!(matches!(
            PrivateKey::from_wif("not-a-key", Network::Regtest),
            Err(TimelockError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_public_key_from_hex() {
        let key = PublicKey::from_hex(PUBKEY_HEX).unwrap();
        assert!(key.is_compressed());
        assert_eq!(key.to_hex(), PUBKEY_HEX);
        assert!(matches!(PublicKey::from_hex("02abcd"), Err(TimelockError::InvalidKeyEncoding(_))));
        assert!(matches!(PublicKey::from_hex("xyz"), Err(TimelockError::InvalidKeyEncoding(_))));
    }

    #[test]
    fn test_uncompressed_key_hash_differs() {
        let compressed = PrivateKey::from_wif(WIF_TESTNET, Network::Regtest).unwrap();
        let uncompressed = PrivateKey::new(*compressed.secret_key(), false, Network::Regtest);
        assert_eq!(uncompressed.public_key().to_bytes().len(), 65);
        assert_ne!(
            uncompressed.public_key().pubkey_hash(),
            compressed.public_key().pubkey_hash()
        );
        assert_eq!(
            PrivateKey::from_wif(&uncompressed.to_wif(), Network::Regtest).unwrap(),
            uncompressed
        );
    }

    #[test]
    fn test_resolve_public_key_sources() {
        let from_wif = resolve_public_key(&KeySource::PrivateKey(WIF_TESTNET.to_string()), Network::Testnet).unwrap();
        let from_hex = resolve_public_key(&KeySource::PublicKey(PUBKEY_HEX.to_string()), Network::Testnet).unwrap();
        assert_eq!(from_wif, from_hex);
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = PrivateKey::from_wif(WIF_TESTNET, Network::Regtest).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("18e14a7b"));
    }
}
