//! Spending transaction assembly and legacy serialization

use crate::address::{Address, AddressKind};
use crate::constants::*;
use crate::crypto::double_sha256;
use crate::error::{Result, TimelockError};
use crate::fee::{estimate_fee, FeeRate};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Unsigned spend of every supplied UTXO to a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedSpend {
    pub transaction: Transaction,
    pub total_input: u64,
    pub fee: u64,
    pub amount_to_send: u64,
}

/// Build the unsigned transaction for a known absolute fee
///
/// One input per UTXO with sequence 0xFFFFFFFE, a single P2PKH output of
/// `total_input - fee`, and the given lock time. No change output.
pub fn build_unsigned_transaction(
    utxos: &[Utxo],
    recipient: &Address,
    fee: u64,
    lock_time: LockTime,
) -> Result<UnsignedSpend> {
    if utxos.is_empty() {
        return Err(TimelockError::NoUtxos);
    }
    if recipient.kind() != AddressKind::P2pkh {
        return Err(TimelockError::AddressTypeMismatch {
            expected: AddressKind::P2pkh.to_string(),
            actual: recipient.kind().to_string(),
        });
    }

    let total_input = total_input_value(utxos)?;
    let amount_to_send = match total_input.checked_sub(fee) {
        Some(amount) if amount > 0 => amount,
        _ => return Err(TimelockError::InsufficientFunds { total_input, fee }),
    };

    let inputs = utxos
        .iter()
        .map(|utxo| TransactionInput {
            prevout: utxo.outpoint.clone(),
            script_sig: vec![],
            sequence: SEQUENCE_LOCKTIME_ENABLED,
        })
        .collect();

    let transaction = Transaction {
        version: TX_VERSION,
        inputs,
        outputs: vec![TransactionOutput {
            value: amount_to_send,
            script_pubkey: recipient.script_pubkey(),
        }],
        lock_time,
    };

    Ok(UnsignedSpend {
        transaction,
        total_input,
        fee,
        amount_to_send,
    })
}

/// Build the unsigned transaction, estimating the fee from a rate
pub fn build_spend_transaction(
    utxos: &[Utxo],
    recipient: &Address,
    fee_rate: FeeRate,
    lock_time: LockTime,
) -> Result<UnsignedSpend> {
    let fee = estimate_fee(fee_rate, utxos.len(), 1);
    build_unsigned_transaction(utxos, recipient, fee, lock_time)
}

/// Sum of UTXO amounts, bounded by the money supply
pub fn total_input_value(utxos: &[Utxo]) -> Result<u64> {
    let total: u128 = utxos.iter().map(|utxo| utxo.amount as u128).sum();
    if total > MAX_MONEY as u128 {
        return Err(TimelockError::Rejected(format!(
            "total input {} exceeds the money supply",
            total
        )));
    }
    Ok(total as u64)
}

/// CheckBalance: 𝒯𝒳 × 𝒰* → ℕ
///
/// For transaction tx spending utxos:
/// 1. Every input references exactly the UTXO at the same position
/// 2. Σ outputs ≤ Σ inputs
/// 3. Return fee = Σ inputs - Σ outputs
pub fn check_balance(tx: &Transaction, utxos: &[Utxo]) -> Result<u64> {
    if tx.inputs.len() != utxos.len()
        || tx.inputs.iter().zip(utxos).any(|(input, utxo)| input.prevout != utxo.outpoint)
    {
        return Err(TimelockError::Rejected(
            "transaction inputs do not match the UTXO set".to_string(),
        ));
    }

    let total_input = total_input_value(utxos)?;
    let total_output: u128 = tx.outputs.iter().map(|output| output.value as u128).sum();
    if total_output > total_input as u128 {
        return Err(TimelockError::Rejected(format!(
            "outputs total {} sat but inputs only {} sat",
            total_output, total_input
        )));
    }
    Ok(total_input - total_output as u64)
}

/// Is the lock time field enforced by consensus
///
/// A lock time is ignored when every input is final (sequence 0xFFFFFFFF),
/// whatever value the field holds.
pub fn is_lock_time_enforced(tx: &Transaction) -> bool {
    tx.lock_time != LockTime::ZERO && tx.inputs.iter().any(|input| input.sequence != SEQUENCE_FINAL)
}

/// Append a Bitcoin CompactSize integer
pub fn write_compact_size(buf: &mut ByteString, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Legacy (non-witness) transaction serialization
pub fn serialize_transaction(tx: &Transaction) -> ByteString {
    let mut buf = Vec::with_capacity(10 + tx.inputs.len() * 150 + tx.outputs.len() * 34);
    buf.extend_from_slice(&tx.version.to_le_bytes());

    write_compact_size(&mut buf, tx.inputs.len() as u64);
    for input in &tx.inputs {
        buf.extend_from_slice(&input.prevout.hash);
        buf.extend_from_slice(&input.prevout.index.to_le_bytes());
        write_compact_size(&mut buf, input.script_sig.len() as u64);
        buf.extend_from_slice(&input.script_sig);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_compact_size(&mut buf, tx.outputs.len() as u64);
    for output in &tx.outputs {
        buf.extend_from_slice(&output.value.to_le_bytes());
        write_compact_size(&mut buf, output.script_pubkey.len() as u64);
        buf.extend_from_slice(&output.script_pubkey);
    }

    buf.extend_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
    buf
}

pub fn serialize_hex(tx: &Transaction) -> String {
    hex::encode(serialize_transaction(tx))
}

/// Transaction id: SHA256d of the serialization, internal byte order
pub fn calculate_tx_id(tx: &Transaction) -> Hash {
    double_sha256(&serialize_transaction(tx))
}

/// Transaction id in display (reversed) hex order
pub fn txid_hex(tx: &Transaction) -> String {
    let mut txid = calculate_tx_id(tx);
    txid.reverse();
    hex::encode(txid)
}
