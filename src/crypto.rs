//! Hash and encoding primitives
//!
//! Pure functions over byte slices with no knowledge of scripts or
//! transactions, so they can be audited or replaced on their own.

use crate::error::{Result, TimelockError};
use crate::types::{Hash, PubkeyHash};
use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// SHA256(SHA256(x)), used for txids, signature hashes and checksums
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> PubkeyHash {
    let sha256_hash = Sha256::digest(data);
    let ripemd160_hash = Ripemd160::digest(sha256_hash);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd160_hash);
    out
}

/// First four bytes of SHA256(SHA256(payload))
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Base58Check encoding: base58(payload ‖ checksum(payload))
pub fn base58check_encode(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum(payload));
    bs58::encode(data).into_string()
}

/// Base58Check decoding; returns the payload without its checksum
pub fn base58check_decode(encoded: &str) -> Result<Vec<u8>> {
    let data = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| TimelockError::MalformedAddress(format!("invalid base58: {}", e)))?;

    if data.len() < 5 {
        return Err(TimelockError::MalformedAddress(format!(
            "decoded length {} is too short",
            data.len()
        )));
    }

    let (payload, check) = data.split_at(data.len() - 4);
    if check != checksum(payload) {
        return Err(TimelockError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}
