//! Integration tests for the generate and spend flows with in-memory collaborators

use std::cell::RefCell;
use timelock_p2sh::address::Address;
use timelock_p2sh::rpc::{BroadcastSink, MempoolAcceptance, StaticUtxoSource, UtxoSource};
use timelock_p2sh::workflow::{generate, spend};
use timelock_p2sh::*;

const WIF: &str = "cNR4jZU2sR5goytD4wXT4aeKcbqGSekbxLxY69v8aryxTU1SMnJZ";
const PUBKEY_HEX: &str = "0250863ad64a87ae8a2fe83c1af1a8403cb53f53e486d8511dad8a04887e5b2352";
const P2SH_200: &str = "2MvKPBCnj19hXGdpZwu5Jrh7CQaXUiDdAyB";
const RECIPIENT: &str = "mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r";
const FUNDING_TXID: &str = "6f7cf9580f1c2dfb3c4d5d043cdbb128c640e3f20161245aa7372e9666168516";

struct FailingUtxoSource;

impl UtxoSource for FailingUtxoSource {
    fn list_unspent(&self, _address: &Address, _min_conf: u32, _max_conf: u32) -> Result<Vec<Utxo>> {
        Err(TimelockError::TransportError("connection refused".to_string()))
    }
}

struct MissingFeeRate;

impl FeeRateSource for MissingFeeRate {
    fn fee_rate(&self, _priority: FeePriority) -> Result<FeeRate> {
        Err(TimelockError::FeeRateUnavailable("no response".to_string()))
    }
}

/// Records what the flow sends to the node
#[derive(Default)]
struct RecordingSink {
    accept: bool,
    tested: RefCell<Vec<String>>,
    broadcast: RefCell<Vec<String>>,
}

impl RecordingSink {
    fn accepting() -> Self {
        RecordingSink {
            accept: true,
            ..Default::default()
        }
    }
}

impl BroadcastSink for RecordingSink {
    fn test_accept(&self, tx_hex: &str) -> Result<MempoolAcceptance> {
        self.tested.borrow_mut().push(tx_hex.to_string());
        Ok(MempoolAcceptance {
            txid: String::new(),
            allowed: self.accept,
            reject_reason: if self.accept {
                None
            } else {
                Some("non-final".to_string())
            },
        })
    }

    fn broadcast(&self, tx_hex: &str) -> Result<String> {
        self.broadcast.borrow_mut().push(tx_hex.to_string());
        Ok("00".repeat(32))
    }
}

fn request() -> SpendRequest {
    SpendRequest {
        private_key_wif: WIF.to_string(),
        lock_time: 200,
        p2sh_address: P2SH_200.to_string(),
        p2pkh_address: RECIPIENT.to_string(),
        network: Network::Regtest,
        fee_priority: FeePriority::Fast,
        broadcast: true,
    }
}

fn funded() -> StaticUtxoSource {
    StaticUtxoSource::new(vec![Utxo {
        outpoint: OutPoint::from_txid_hex(FUNDING_TXID, 0).unwrap(),
        amount: 100_000,
    }])
}

fn fixed_rate() -> FixedFeeRate {
    FixedFeeRate(FeeRate::from_sat_per_kb(5_000))
}

#[test]
fn test_generate_from_private_and_public_key_agree() {
    let from_wif = generate(&KeySource::PrivateKey(WIF.to_string()), 200, Network::Regtest).unwrap();
    let from_pubkey = generate(&KeySource::PublicKey(PUBKEY_HEX.to_string()), 200, Network::Regtest).unwrap();
    assert_eq!(from_wif, from_pubkey);
    assert_eq!(from_wif.p2sh_address, P2SH_200);
    assert_eq!(from_wif.lock_time_description, "block height 200");
}

#[test]
fn test_generate_report_json() {
    let report = TimelockP2sh::new(Network::Mainnet)
        .generate(&KeySource::PublicKey(PUBKEY_HEX.to_string()), 1_700_000_000)
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["network"], "mainnet");
    assert_eq!(json["lock_time"], 1_700_000_000u64);
    assert_eq!(json["p2sh_address"], "3A9JjXEEm8amBmiQw1Lq4QsYmck1sgy2xF");
}

#[test]
fn test_spend_broadcasts_verified_transaction() {
    let sink = RecordingSink::accepting();
    let report = spend(&request(), &funded(), &fixed_rate(), Some(&sink)).unwrap();

    // 1 input, 1 output: 192 bytes at 5000 sat/kB
    assert_eq!(report.fee, 960);
    assert_eq!(report.amount_to_send, 99_040);
    assert_eq!(report.utxo_count, 1);
    assert_eq!(report.status, SpendStatus::Broadcast { txid: "00".repeat(32) });
    assert_eq!(*sink.tested.borrow(), vec![report.signed_hex.clone()]);
    assert_eq!(*sink.broadcast.borrow(), vec![report.signed_hex.clone()]);
    assert_ne!(report.unsigned_hex, report.signed_hex);
}

#[test]
fn test_spend_without_broadcast_stops_at_verified() {
    let sink = RecordingSink::accepting();
    let mut request = request();
    request.broadcast = false;
    let report = spend(&request, &funded(), &fixed_rate(), Some(&sink)).unwrap();
    assert_eq!(report.status, SpendStatus::Verified);
    assert_eq!(sink.tested.borrow().len(), 1);
    assert!(sink.broadcast.borrow().is_empty());
}

#[test]
fn test_offline_spend_is_signed_only() {
    let report = spend(&request(), &funded(), &fixed_rate(), None).unwrap();
    assert_eq!(report.status, SpendStatus::Signed);

    let key = PrivateKey::from_wif(WIF, Network::Regtest).unwrap();
    let script = RedeemScript::new(key.public_key().pubkey_hash(), LockTime::from_consensus(200));
    assert_eq!(report.lock_time, script.lock_time());
    assert!(report.signed_hex.len() > report.unsigned_hex.len());
}

#[test]
fn test_mempool_rejection_is_not_broadcast() {
    let sink = RecordingSink::default();
    let err = spend(&request(), &funded(), &fixed_rate(), Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::Verification);
    assert_eq!(err.error, TimelockError::Rejected("non-final".to_string()));
    assert!(sink.broadcast.borrow().is_empty());
}

#[test]
fn test_spend_stage_errors() {
    let sink = RecordingSink::accepting();

    let mut bad_key = request();
    bad_key.private_key_wif = "garbage".to_string();
    let err = spend(&bad_key, &funded(), &fixed_rate(), Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::KeyResolution);

    let mut wrong_lock_time = request();
    wrong_lock_time.lock_time = 201;
    let err = spend(&wrong_lock_time, &funded(), &fixed_rate(), Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::AddressValidation);
    assert!(matches!(err.error, TimelockError::AddressMismatch { .. }));

    let mut swapped = request();
    swapped.p2pkh_address = P2SH_200.to_string();
    let err = spend(&swapped, &funded(), &fixed_rate(), Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::AddressValidation);
    assert!(matches!(err.error, TimelockError::AddressTypeMismatch { .. }));

    let err = spend(&request(), &FailingUtxoSource, &fixed_rate(), Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::UtxoLookup);
    assert!(matches!(err.error, TimelockError::TransportError(_)));

    let err = spend(&request(), &StaticUtxoSource::default(), &fixed_rate(), Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::UtxoLookup);
    assert_eq!(err.error, TimelockError::NoUtxos);

    let err = spend(&request(), &funded(), &MissingFeeRate, Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::FeeLookup);
    assert!(err.to_string().starts_with("fee lookup failed:"));

    let tiny = StaticUtxoSource::new(vec![Utxo {
        outpoint: OutPoint::from_txid_hex(FUNDING_TXID, 0).unwrap(),
        amount: 900,
    }]);
    let err = spend(&request(), &tiny, &fixed_rate(), Some(&sink)).unwrap_err();
    assert_eq!(err.stage, Stage::TransactionAssembly);
    assert!(matches!(err.error, TimelockError::InsufficientFunds { .. }));

    // No failure above reached the node
    assert!(sink.tested.borrow().is_empty());
    assert!(sink.broadcast.borrow().is_empty());
}
