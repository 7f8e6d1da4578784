//! Node collaborators: UTXO lookup and mempool acceptance / broadcast
//!
//! `NodeClient` talks to bitcoind over JSON-RPC. The traits let the spend
//! workflow run against any other source, such as the static UTXO list used
//! in offline mode.

use crate::address::Address;
use crate::config::RpcConfig;
use crate::constants::*;
use crate::error::{Result, TimelockError};
use crate::types::*;
use bitcoincore_rpc::{Auth, Client, RpcApi};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Confirmation range used when listing the funds at a P2SH address
pub const DEFAULT_MIN_CONF: u32 = 0;
pub const DEFAULT_MAX_CONF: u32 = 9_999_999;

/// Source of unspent outputs at an address
pub trait UtxoSource {
    /// An address with no funds yields an empty list, not an error
    fn list_unspent(&self, address: &Address, min_conf: u32, max_conf: u32) -> Result<Vec<Utxo>>;
}

/// Result of a mempool acceptance test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolAcceptance {
    pub txid: String,
    pub allowed: bool,
    #[serde(rename = "reject-reason", default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

/// Sink for signed transactions
pub trait BroadcastSink {
    fn test_accept(&self, tx_hex: &str) -> Result<MempoolAcceptance>;
    /// Returns the txid reported by the node
    fn broadcast(&self, tx_hex: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UnspentEntry {
    txid: String,
    vout: u32,
    amount: f64,
}

/// Convert a BTC decimal amount to satoshis
pub fn btc_to_sat(amount: f64) -> Result<u64> {
    let sats = (amount * SATOSHIS_PER_BTC as f64).round();
    if !sats.is_finite() || sats < 0.0 || sats > MAX_MONEY as f64 {
        return Err(TimelockError::TransportError(format!("invalid amount {} BTC", amount)));
    }
    Ok(sats as u64)
}

/// Parse a `listunspent` response
pub fn parse_list_unspent(response: Value) -> Result<Vec<Utxo>> {
    let entries: Vec<UnspentEntry> = serde_json::from_value(response)
        .map_err(|e| TimelockError::TransportError(format!("listunspent response: {}", e)))?;
    entries
        .into_iter()
        .map(|entry| {
            Ok(Utxo {
                outpoint: OutPoint::from_txid_hex(&entry.txid, entry.vout)?,
                amount: btc_to_sat(entry.amount)?,
            })
        })
        .collect()
}

/// Parse a single-transaction `testmempoolaccept` response
pub fn parse_mempool_accept(response: Value) -> Result<MempoolAcceptance> {
    let mut results: Vec<MempoolAcceptance> = serde_json::from_value(response)
        .map_err(|e| TimelockError::TransportError(format!("testmempoolaccept response: {}", e)))?;
    if results.len() != 1 {
        return Err(TimelockError::TransportError(format!(
            "expected one testmempoolaccept result, got {}",
            results.len()
        )));
    }
    Ok(results.remove(0))
}

/// bitcoind JSON-RPC client
pub struct NodeClient {
    client: Client,
}

impl NodeClient {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let url = config.url();
        let auth = match (&config.user, &config.password) {
            (Some(user), Some(password)) => Auth::UserPass(user.clone(), password.clone()),
            _ => Auth::None,
        };
        let client = Client::new(&url, auth).map_err(|e| TimelockError::TransportError(e.to_string()))?;
        debug!("connected RPC client to {}", url);
        Ok(NodeClient { client })
    }

    fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        self.client
            .call::<Value>(method, params)
            .map_err(|e| TimelockError::TransportError(format!("{}: {}", method, e)))
    }
}

impl UtxoSource for NodeClient {
    fn list_unspent(&self, address: &Address, min_conf: u32, max_conf: u32) -> Result<Vec<Utxo>> {
        let response = self.call(
            "listunspent",
            &[json!(min_conf), json!(max_conf), json!([address.to_string()])],
        )?;
        let utxos = parse_list_unspent(response)?;
        info!("found {} UTXO(s) at {}", utxos.len(), address);
        Ok(utxos)
    }
}

impl BroadcastSink for NodeClient {
    fn test_accept(&self, tx_hex: &str) -> Result<MempoolAcceptance> {
        parse_mempool_accept(self.call("testmempoolaccept", &[json!([tx_hex])])?)
    }

    fn broadcast(&self, tx_hex: &str) -> Result<String> {
        match self.call("sendrawtransaction", &[json!(tx_hex)])? {
            Value::String(txid) => Ok(txid),
            other => Err(TimelockError::TransportError(format!(
                "unexpected sendrawtransaction response: {}",
                other
            ))),
        }
    }
}

/// Fixed UTXO list supplied by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticUtxoSource {
    utxos: Vec<Utxo>,
}

impl StaticUtxoSource {
    pub fn new(utxos: Vec<Utxo>) -> Self {
        StaticUtxoSource { utxos }
    }
}

impl UtxoSource for StaticUtxoSource {
    fn list_unspent(&self, _address: &Address, _min_conf: u32, _max_conf: u32) -> Result<Vec<Utxo>> {
        Ok(self.utxos.clone())
    }
}

/// Parse `txid:vout:amount_sats`
pub fn parse_utxo(utxo: &str) -> Result<Utxo> {
    let parts: Vec<&str> = utxo.trim().split(':').collect();
    let [txid, vout, amount] = parts.as_slice() else {
        return Err(TimelockError::InvalidTxid(format!(
            "expected txid:vout:sats, got '{}'",
            utxo
        )));
    };
    let vout: u32 = vout
        .parse()
        .map_err(|_| TimelockError::InvalidTxid(format!("invalid output index '{}'", vout)))?;
    let amount: u64 = amount
        .parse()
        .map_err(|_| TimelockError::InvalidTxid(format!("invalid amount '{}'", amount)))?;
    Ok(Utxo {
        outpoint: OutPoint::from_txid_hex(txid, vout)?,
        amount,
    })
}
