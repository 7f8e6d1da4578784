//! Core types for timelock script construction and spending

use crate::constants::*;
use crate::error::{Result, TimelockError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hash type: 256-bit hash in internal byte order
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// RIPEMD160(SHA256(pubkey))
pub type PubkeyHash = [u8; 20];

/// Network selection; decides address and WIF version bytes only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2PKH_VERSION,
            Network::Testnet | Network::Regtest => TESTNET_P2PKH_VERSION,
        }
    }

    pub fn p2sh_version(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2SH_VERSION,
            Network::Testnet | Network::Regtest => TESTNET_P2SH_VERSION,
        }
    }

    pub fn wif_version(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_WIF_VERSION,
            Network::Testnet | Network::Regtest => TESTNET_WIF_VERSION,
        }
    }

    /// Default bitcoind RPC port
    pub fn default_rpc_port(self) -> u16 {
        match self {
            Network::Mainnet => 8332,
            Network::Testnet => 18332,
            Network::Regtest => 18443,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

/// How consensus interprets a lock time value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTimeKind {
    BlockHeight,
    Timestamp,
}

impl fmt::Display for LockTimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTimeKind::BlockHeight => write!(f, "block height"),
            LockTimeKind::Timestamp => write!(f, "UNIX timestamp"),
        }
    }
}

/// Absolute lock time: 𝕃 = ℕ₃₂
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockTime(u32);

impl LockTime {
    pub const ZERO: LockTime = LockTime(0);

    pub fn from_consensus(value: u32) -> Self {
        LockTime(value)
    }

    /// Accepts any integer and rejects values outside 0..=u32::MAX
    pub fn from_i64(value: i64) -> Result<Self> {
        u32::try_from(value).map(LockTime).map_err(|_| {
            TimelockError::InvalidLocktime(format!("{} is outside 0..={}", value, u32::MAX))
        })
    }

    pub fn to_consensus_u32(self) -> u32 {
        self.0
    }

    pub fn kind(self) -> LockTimeKind {
        if self.0 < LOCKTIME_THRESHOLD {
            LockTimeKind::BlockHeight
        } else {
            LockTimeKind::Timestamp
        }
    }

    pub fn is_block_height(self) -> bool {
        self.kind() == LockTimeKind::BlockHeight
    }

    pub fn is_timestamp(self) -> bool {
        self.kind() == LockTimeKind::Timestamp
    }
}

impl fmt::Display for LockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OutPoint: 𝒪 = ℍ × ℕ
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    /// Builds an outpoint from a txid in display (big-endian hex) order
    pub fn from_txid_hex(txid: &str, index: u32) -> Result<Self> {
        let bytes = hex::decode(txid)
            .map_err(|e| TimelockError::InvalidTxid(format!("{}: {}", txid, e)))?;
        let mut hash: Hash = bytes.as_slice().try_into().map_err(|_| {
            TimelockError::InvalidTxid(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        hash.reverse();
        Ok(OutPoint { hash, index })
    }

    /// Txid in display order
    pub fn txid_hex(&self) -> String {
        let mut display = self.hash;
        display.reverse();
        hex::encode(display)
    }
}

/// Unspent output locked to the P2SH address: 𝒰 = 𝒪 × ℕ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub amount: u64,
}

/// Transaction Input: ℐ = 𝒪 × 𝕊 × ℕ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: u32,
}

/// Transaction Output: 𝒯 = ℕ × 𝕊
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_pubkey: ByteString,
}

/// Transaction: 𝒯𝒳 = ℕ × ℐ* × 𝒯* × 𝕃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: LockTime,
}
