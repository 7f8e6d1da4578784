//! Base58check address codec for P2SH and P2PKH addresses
//!
//! One codec serves both address derivation and validation of
//! caller-supplied addresses. The network is always passed in explicitly.

use crate::constants::*;
use crate::crypto::{base58check_decode, base58check_encode, hash160};
use crate::error::{Result, TimelockError};
use crate::script::{p2pkh_script_pubkey, p2sh_script_pubkey, RedeemScript};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locking script type an address commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::P2pkh => write!(f, "P2PKH"),
            AddressKind::P2sh => write!(f, "P2SH"),
        }
    }
}

/// A decoded or derived legacy address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    kind: AddressKind,
    hash: PubkeyHash,
}

impl Address {
    /// P2SH address of a serialized redeem script
    pub fn p2sh_from_script(redeem_script: &[u8], network: Network) -> Self {
        Address {
            network,
            kind: AddressKind::P2sh,
            hash: hash160(redeem_script),
        }
    }

    pub fn p2sh(redeem_script: &RedeemScript, network: Network) -> Self {
        Self::p2sh_from_script(&redeem_script.to_bytes(), network)
    }

    pub fn p2pkh(pubkey_hash: PubkeyHash, network: Network) -> Self {
        Address {
            network,
            kind: AddressKind::P2pkh,
            hash: pubkey_hash,
        }
    }

    /// Decode and classify an address string for the given network
    ///
    /// Checks, in order: base58 alphabet, checksum, payload length, version byte.
    pub fn decode(address: &str, network: Network) -> Result<Self> {
        let payload = base58check_decode(address)?;
        if payload.len() != ADDRESS_PAYLOAD_LEN - 4 {
            return Err(TimelockError::MalformedAddress(format!(
                "expected {} byte payload, got {}",
                ADDRESS_PAYLOAD_LEN - 4,
                payload.len()
            )));
        }

        let version = payload[0];
        let kind = if version == network.p2pkh_version() {
            AddressKind::P2pkh
        } else if version == network.p2sh_version() {
            AddressKind::P2sh
        } else {
            return Err(TimelockError::UnknownAddressVersion(version));
        };

        let mut hash = [0u8; HASH160_LEN];
        hash.copy_from_slice(&payload[1..]);
        Ok(Address { network, kind, hash })
    }

    /// Decode an address that must be of the given kind
    pub fn decode_expecting(address: &str, network: Network, expected: AddressKind) -> Result<Self> {
        let decoded = Self::decode(address, network)?;
        if decoded.kind != expected {
            return Err(TimelockError::AddressTypeMismatch {
                expected: expected.to_string(),
                actual: decoded.kind.to_string(),
            });
        }
        Ok(decoded)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Network version byte
    pub fn version(&self) -> u8 {
        match self.kind {
            AddressKind::P2pkh => self.network.p2pkh_version(),
            AddressKind::P2sh => self.network.p2sh_version(),
        }
    }

    /// Hash160 payload: public key hash or script hash
    pub fn hash(&self) -> &PubkeyHash {
        &self.hash
    }

    /// Locking script paying to this address
    pub fn script_pubkey(&self) -> ByteString {
        match self.kind {
            AddressKind::P2pkh => p2pkh_script_pubkey(&self.hash),
            AddressKind::P2sh => p2sh_script_pubkey(&self.hash),
        }
    }

    /// Does this P2SH address commit to the given redeem script
    pub fn matches_script(&self, redeem_script: &RedeemScript) -> bool {
        self.kind == AddressKind::P2sh && self.hash == redeem_script.script_hash()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(1 + HASH160_LEN);
        payload.push(self.version());
        payload.extend_from_slice(&self.hash);
        write!(f, "{}", base58check_encode(&payload))
    }
}

/// encode: script bytes × network → P2SH address string
pub fn encode(redeem_script: &[u8], network: Network) -> String {
    Address::p2sh_from_script(redeem_script, network).to_string()
}

/// decode: address string → (version byte, hash160)
pub fn decode(address: &str, network: Network) -> Result<(u8, PubkeyHash)> {
    let decoded = Address::decode(address, network)?;
    Ok((decoded.version(), decoded.hash))
}
