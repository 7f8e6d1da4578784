//! Generate and spend flows
//!
//! Both flows share the same lock time classification and redeem script
//! derivation. Every failure carries the stage it happened in, so a caller
//! can tell configuration errors apart from collaborator failures.

use crate::address::{Address, AddressKind};
use crate::error::TimelockError;
use crate::fee::{FeePriority, FeeRateSource};
use crate::keys::{resolve_public_key, KeySource, PrivateKey, PublicKey};
use crate::rpc::{BroadcastSink, UtxoSource, DEFAULT_MAX_CONF, DEFAULT_MIN_CONF};
use crate::script::RedeemScript;
use crate::signer::{sign_transaction, verify_transaction};
use crate::transaction::{build_spend_transaction, check_balance, serialize_hex, txid_hex};
use crate::types::*;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Step of a flow, reported with every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    KeyResolution,
    ScriptConstruction,
    AddressValidation,
    UtxoLookup,
    FeeLookup,
    TransactionAssembly,
    Signing,
    Verification,
    Broadcast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::KeyResolution => "key resolution",
            Stage::ScriptConstruction => "script construction",
            Stage::AddressValidation => "address validation",
            Stage::UtxoLookup => "UTXO lookup",
            Stage::FeeLookup => "fee lookup",
            Stage::TransactionAssembly => "transaction assembly",
            Stage::Signing => "signing",
            Stage::Verification => "mempool verification",
            Stage::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {error}")]
pub struct WorkflowError {
    pub stage: Stage,
    #[source]
    pub error: TimelockError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, WorkflowError>;
}

impl<T> AtStage<T> for crate::error::Result<T> {
    fn at(self, stage: Stage) -> Result<T, WorkflowError> {
        self.map_err(|error| WorkflowError { stage, error })
    }
}

/// Human readable lock time: block height, or timestamp with its UTC time
pub fn describe_lock_time(lock_time: LockTime) -> String {
    let value = lock_time.to_consensus_u32();
    if lock_time.is_block_height() {
        return format!("{} {}", lock_time.kind(), value);
    }
    match DateTime::<Utc>::from_timestamp(value as i64, 0) {
        Some(time) => format!("{} {} ({})", lock_time.kind(), value, time.format("%Y-%m-%d %H:%M:%S UTC")),
        None => format!("{} {}", lock_time.kind(), value),
    }
}

pub fn log_lock_time(lock_time: LockTime) {
    info!("lock time is {}", describe_lock_time(lock_time));
}

/// Redeem script and P2SH address for a public key and lock time
pub fn derive_timelock(
    public_key: &PublicKey,
    lock_time: i64,
    network: Network,
) -> crate::error::Result<(RedeemScript, Address)> {
    let lock_time = LockTime::from_i64(lock_time)?;
    log_lock_time(lock_time);
    let redeem_script = RedeemScript::new(public_key.pubkey_hash(), lock_time);
    let address = Address::p2sh(&redeem_script, network);
    debug!("redeem script {}", redeem_script.to_hex());
    Ok((redeem_script, address))
}

/// Output of the generate flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateReport {
    pub network: Network,
    pub lock_time: LockTime,
    pub lock_time_description: String,
    pub public_key: String,
    pub redeem_script: String,
    pub redeem_script_hex: String,
    pub p2sh_address: String,
}

/// Build the redeem script and P2SH address for a key and lock time
pub fn generate(source: &KeySource, lock_time: i64, network: Network) -> Result<GenerateReport, WorkflowError> {
    let public_key = resolve_public_key(source, network).at(Stage::KeyResolution)?;
    let (redeem_script, address) = derive_timelock(&public_key, lock_time, network).at(Stage::ScriptConstruction)?;
    info!("P2SH address: {}", address);

    Ok(GenerateReport {
        network,
        lock_time: redeem_script.lock_time(),
        lock_time_description: describe_lock_time(redeem_script.lock_time()),
        public_key: public_key.to_hex(),
        redeem_script: redeem_script.to_string(),
        redeem_script_hex: redeem_script.to_hex(),
        p2sh_address: address.to_string(),
    })
}

/// Parameters of the spend flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendRequest {
    pub private_key_wif: String,
    pub lock_time: i64,
    pub p2sh_address: String,
    pub p2pkh_address: String,
    pub network: Network,
    pub fee_priority: FeePriority,
    /// Only test mempool acceptance when false
    pub broadcast: bool,
}

/// How far a spend got
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpendStatus {
    /// Signed and verified locally, not shown to a node
    Signed,
    /// Accepted by the node's mempool test, not broadcast
    Verified,
    Broadcast { txid: String },
}

impl fmt::Display for SpendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpendStatus::Signed => write!(f, "signed (not verified by a node, not broadcast)"),
            SpendStatus::Verified => write!(f, "verified by mempool test (not broadcast)"),
            SpendStatus::Broadcast { txid } => write!(f, "broadcast as {}", txid),
        }
    }
}

/// Output of the spend flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendReport {
    pub p2sh_address: String,
    pub recipient: String,
    pub lock_time: LockTime,
    pub utxo_count: usize,
    pub total_input: u64,
    pub fee: u64,
    pub amount_to_send: u64,
    pub unsigned_hex: String,
    pub signed_hex: String,
    pub txid: String,
    pub status: SpendStatus,
}

/// Spend every UTXO at the timelocked P2SH address to a P2PKH address
///
/// Without a sink the flow stops after local verification with
/// `SpendStatus::Signed`. Nothing is signed until all construction steps have
/// succeeded, and nothing is sent to the sink unless it verifies locally.
pub fn spend(
    request: &SpendRequest,
    utxo_source: &dyn UtxoSource,
    fee_source: &dyn FeeRateSource,
    sink: Option<&dyn BroadcastSink>,
) -> Result<SpendReport, WorkflowError> {
    let network = request.network;
    let private_key = PrivateKey::from_wif(&request.private_key_wif, network).at(Stage::KeyResolution)?;

    let (redeem_script, derived_address) =
        derive_timelock(&private_key.public_key(), request.lock_time, network).at(Stage::ScriptConstruction)?;

    let p2sh_address = Address::decode_expecting(&request.p2sh_address, network, AddressKind::P2sh)
        .at(Stage::AddressValidation)?;
    if !p2sh_address.matches_script(&redeem_script) {
        return Err(TimelockError::AddressMismatch {
            expected: derived_address.to_string(),
            actual: p2sh_address.to_string(),
        })
        .at(Stage::AddressValidation);
    }
    let recipient = Address::decode_expecting(&request.p2pkh_address, network, AddressKind::P2pkh)
        .at(Stage::AddressValidation)?;

    let utxos = utxo_source
        .list_unspent(&p2sh_address, DEFAULT_MIN_CONF, DEFAULT_MAX_CONF)
        .at(Stage::UtxoLookup)?;
    if utxos.is_empty() {
        return Err(TimelockError::NoUtxos).at(Stage::UtxoLookup);
    }

    let fee_rate = fee_source.fee_rate(request.fee_priority).at(Stage::FeeLookup)?;

    let unsigned = build_spend_transaction(&utxos, &recipient, fee_rate, redeem_script.lock_time())
        .at(Stage::TransactionAssembly)?;
    check_balance(&unsigned.transaction, &utxos).at(Stage::TransactionAssembly)?;
    info!(
        "spending {} sat from {} UTXO(s): fee {} sat, sending {} sat",
        unsigned.total_input,
        utxos.len(),
        unsigned.fee,
        unsigned.amount_to_send
    );
    let unsigned_hex = serialize_hex(&unsigned.transaction);
    debug!("unsigned transaction {}", unsigned_hex);

    let mut tx = unsigned.transaction.clone();
    sign_transaction(&mut tx, &private_key, &redeem_script).at(Stage::Signing)?;
    verify_transaction(&tx, &redeem_script).at(Stage::Signing)?;
    let signed_hex = serialize_hex(&tx);
    let txid = txid_hex(&tx);
    info!("signed transaction {}", txid);

    let status = match sink {
        None => SpendStatus::Signed,
        Some(sink) => {
            let acceptance = sink.test_accept(&signed_hex).at(Stage::Verification)?;
            if !acceptance.allowed {
                let reason = acceptance.reject_reason.unwrap_or_else(|| "no reason given".to_string());
                return Err(TimelockError::Rejected(reason)).at(Stage::Verification);
            }
            info!("transaction {} passes the mempool acceptance test", txid);

            if request.broadcast {
                let broadcast_txid = sink.broadcast(&signed_hex).at(Stage::Broadcast)?;
                if broadcast_txid != txid {
                    warn!("node reported txid {} for transaction {}", broadcast_txid, txid);
                }
                SpendStatus::Broadcast { txid: broadcast_txid }
            } else {
                SpendStatus::Verified
            }
        }
    };

    Ok(SpendReport {
        p2sh_address: p2sh_address.to_string(),
        recipient: recipient.to_string(),
        lock_time: redeem_script.lock_time(),
        utxo_count: utxos.len(),
        total_input: unsigned.total_input,
        fee: unsigned.fee,
        amount_to_send: unsigned.amount_to_send,
        unsigned_hex,
        signed_hex,
        txid,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY_HEX: &str = "0250863ad64a87ae8a2fe83c1af1a8403cb53f53e486d8511dad8a04887e5b2352";

    #[test]
    fn test_describe_lock_time() {
        assert_eq!(describe_lock_time(LockTime::from_consensus(200)), "block height 200");
        assert_eq!(
            describe_lock_time(LockTime::from_consensus(1_700_000_000)),
            "UNIX timestamp 1700000000 (2023-11-14 22:13:20 UTC)"
        );
        assert_eq!(
            describe_lock_time(LockTime::from_consensus(500_000_000)),
            "UNIX timestamp 500000000 (1985-11-05 00:53:20 UTC)"
        );
    }

    #[test]
    fn test_generate_from_public_key() {
        let report = generate(&KeySource::PublicKey(PUBKEY_HEX.to_string()), 200, Network::Regtest).unwrap();
        assert_eq!(report.p2sh_address, "2MvKPBCnj19hXGdpZwu5Jrh7CQaXUiDdAyB");
        assert_eq!(
            report.redeem_script_hex,
            "02c800b17576a914f54a5851e9372b87810a8e60cdd2e7cfd80b6e3188ac"
        );
        assert_eq!(
            report.redeem_script,
            "[200, OP_CHECKLOCKTIMEVERIFY, OP_DROP, OP_DUP, OP_HASH160, f54a5851e9372b87810a8e60cdd2e7cfd80b6e31, OP_EQUALVERIFY, OP_CHECKSIG]"
        );
    }

    #[test]
    fn test_generate_stage_errors() {
        let err = generate(&KeySource::PublicKey("00".to_string()), 200, Network::Regtest).unwrap_err();
        assert_eq!(err.stage, Stage::KeyResolution);

        let err = generate(&KeySource::PublicKey(PUBKEY_HEX.to_string()), -1, Network::Regtest).unwrap_err();
        assert_eq!(err.stage, Stage::ScriptConstruction);
        assert!(matches!(err.error, TimelockError::InvalidLocktime(_)));
        assert!(err.to_string().starts_with("script construction failed:"));
    }

    #[test]
    fn test_spend_status_display() {
        assert!(SpendStatus::Signed.to_string().contains("not broadcast"));
        assert_eq!(
            SpendStatus::Broadcast { txid: "ab".to_string() }.to_string(),
            "broadcast as ab"
        );
    }
}
