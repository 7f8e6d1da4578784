//! Signing of timelocked P2SH inputs
//!
//! Every input is signed with SIGHASH_ALL over the legacy signature hash,
//! using the redeem script as script code. The unlocking script is
//! `<sig||0x01> <pubkey> <redeem script>`.

use crate::constants::*;
use crate::crypto::{double_sha256, hash160};
use crate::error::{Result, TimelockError};
use crate::keys::{PrivateKey, PublicKey};
use crate::script::{parse_instructions, push_data, Instruction, RedeemScript};
use crate::transaction::serialize_transaction;
use crate::types::*;
use log::debug;
use secp256k1::{ecdsa, Message, Secp256k1};

/// LegacySignatureHash: 𝒯𝒳 × ℕ × 𝕊 × ℕ → ℍ
///
/// For transaction tx, input index i, script code s and sighash type t:
/// 1. Copy tx, clearing every unlocking script
/// 2. Set input i's unlocking script to s
/// 3. Return SHA256d(serialize(copy) || t as u32 LE)
pub fn legacy_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: u32,
) -> Result<Hash> {
    if input_index >= tx.inputs.len() {
        return Err(TimelockError::Signing(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        )));
    }

    let mut tx_copy = tx.clone();
    for (i, input) in tx_copy.inputs.iter_mut().enumerate() {
        input.script_sig = if i == input_index {
            script_code.to_vec()
        } else {
            vec![]
        };
    }

    let mut preimage = serialize_transaction(&tx_copy);
    preimage.extend_from_slice(&sighash_type.to_le_bytes());
    Ok(double_sha256(&preimage))
}

/// Would OP_CHECKLOCKTIMEVERIFY succeed for this transaction
///
/// The transaction lock time must be of the same kind as the script's and
/// at least as large, and no input may be final.
pub fn check_lock_time(tx: &Transaction, redeem_script: &RedeemScript) -> Result<()> {
    let required = redeem_script.lock_time();

    if tx.lock_time.kind() != required.kind() {
        return Err(TimelockError::LockTimeNotSatisfied(format!(
            "transaction lock time {} is a {} but the script requires a {}",
            tx.lock_time,
            tx.lock_time.kind(),
            required.kind()
        )));
    }
    if tx.lock_time < required {
        return Err(TimelockError::LockTimeNotSatisfied(format!(
            "transaction lock time {} is below the script lock time {}",
            tx.lock_time, required
        )));
    }
    if let Some(index) = tx.inputs.iter().position(|input| input.sequence == SEQUENCE_FINAL) {
        return Err(TimelockError::LockTimeNotSatisfied(format!(
            "input {} has a final sequence number, lock time is not enforced",
            index
        )));
    }
    Ok(())
}

/// Sign every input of `tx` against `redeem_script`
///
/// Rejects a key whose public key hash differs from the one embedded in the
/// script, and a transaction whose lock time would fail CLTV. Only the
/// unlocking scripts are modified.
pub fn sign_transaction(
    tx: &mut Transaction,
    private_key: &PrivateKey,
    redeem_script: &RedeemScript,
) -> Result<()> {
    let public_key = private_key.public_key();
    if public_key.pubkey_hash() != *redeem_script.pubkey_hash() {
        return Err(TimelockError::SigningKeyMismatch);
    }
    if tx.inputs.is_empty() {
        return Err(TimelockError::NoUtxos);
    }
    check_lock_time(tx, redeem_script)?;

    let secp = Secp256k1::signing_only();
    let script_code = redeem_script.to_bytes();
    let pubkey_bytes = public_key.to_bytes();

    // All hashes are taken over the unsigned transaction
    let mut script_sigs = Vec::with_capacity(tx.inputs.len());
    for index in 0..tx.inputs.len() {
        let sighash = legacy_signature_hash(tx, index, &script_code, SIGHASH_ALL)?;
        let message = Message::from_digest_slice(&sighash)
            .map_err(|e| TimelockError::Signing(e.to_string()))?;
        let signature = secp.sign_ecdsa(&message, private_key.secret_key());

        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(SIGHASH_ALL as u8);

        let mut script_sig = Vec::with_capacity(sig_bytes.len() + pubkey_bytes.len() + script_code.len() + 4);
        push_data(&mut script_sig, &sig_bytes);
        push_data(&mut script_sig, &pubkey_bytes);
        push_data(&mut script_sig, &script_code);

        debug!("input {} sighash {}", index, hex::encode(sighash));
        script_sigs.push(script_sig);
    }

    for (input, script_sig) in tx.inputs.iter_mut().zip(script_sigs) {
        input.script_sig = script_sig;
    }
    Ok(())
}

/// Check one signed input against the expected redeem script
pub fn verify_input(tx: &Transaction, input_index: usize, redeem_script: &RedeemScript) -> Result<()> {
    let fail = |reason: String| TimelockError::VerificationFailed {
        index: input_index,
        reason,
    };

    let input = tx
        .inputs
        .get(input_index)
        .ok_or_else(|| fail("no such input".to_string()))?;
    let instructions = parse_instructions(&input.script_sig).map_err(|e| fail(e.to_string()))?;

    let (sig_bytes, pubkey_bytes, script_bytes) = match instructions.as_slice() {
        [Instruction::Push(sig), Instruction::Push(pubkey), Instruction::Push(script)] => {
            (sig, pubkey, script)
        }
        _ => {
            return Err(fail(
                "unlocking script is not <sig> <pubkey> <redeem script>".to_string(),
            ))
        }
    };

    if script_bytes.as_slice() != redeem_script.to_bytes().as_slice() {
        return Err(fail("embedded redeem script differs".to_string()));
    }
    if hash160(pubkey_bytes) != *redeem_script.pubkey_hash() {
        return Err(fail("public key does not match the redeem script hash".to_string()));
    }

    let (sighash_byte, der) = sig_bytes
        .split_last()
        .ok_or_else(|| fail("empty signature".to_string()))?;
    if *sighash_byte as u32 != SIGHASH_ALL {
        return Err(fail(format!("unexpected sighash type 0x{:02x}", sighash_byte)));
    }

    let public_key = PublicKey::from_slice(pubkey_bytes).map_err(|e| fail(e.to_string()))?;
    let signature = ecdsa::Signature::from_der(der).map_err(|e| fail(format!("signature encoding: {}", e)))?;
    let sighash = legacy_signature_hash(tx, input_index, script_bytes, SIGHASH_ALL)?;
    let message = Message::from_digest_slice(&sighash).map_err(|e| fail(e.to_string()))?;

    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, public_key.inner())
        .map_err(|e| fail(format!("signature does not verify: {}", e)))
}

/// Check every input, plus the lock time condition
pub fn verify_transaction(tx: &Transaction, redeem_script: &RedeemScript) -> Result<()> {
    check_lock_time(tx, redeem_script).map_err(|e| TimelockError::VerificationFailed {
        index: 0,
        reason: e.to_string(),
    })?;
    for index in 0..tx.inputs.len() {
        verify_input(tx, index, redeem_script)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::script::build_redeem_script;
    use crate::transaction::{build_unsigned_transaction, serialize_hex};

    const WIF: &str = "cNR4jZU2sR5goytD4wXT4aeKcbqGSekbxLxY69v8aryxTU1SMnJZ";
    const OTHER_WIF: &str = "cMahea7zqjxrtgAbB7LSGbcQUr1uX1ojuat9jZodMN87JcbXMTcA";
    const PKH_HEX: &str = "f54a5851e9372b87810a8e60cdd2e7cfd80b6e31";
    const RECIPIENT_PKH: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";
    const FUNDING_TXID: &str = "6f7cf9580f1c2dfb3c4d5d043cdbb128c640e3f20161245aa7372e9666168516";

    fn redeem(lock_time: i64) -> RedeemScript {
        build_redeem_script(&hex::decode(PKH_HEX).unwrap(), lock_time).unwrap()
    }

    fn recipient() -> Address {
        let pkh: PubkeyHash = hex::decode(RECIPIENT_PKH).unwrap().try_into().unwrap();
        Address::p2pkh(pkh, Network::Regtest)
    }

    fn unsigned(utxos: &[Utxo], fee: u64, lock_time: u32) -> Transaction {
        build_unsigned_transaction(utxos, &recipient(), fee, LockTime::from_consensus(lock_time))
            .unwrap()
            .transaction
    }

    fn single_utxo() -> Vec<Utxo> {
        vec![Utxo {
            outpoint: OutPoint::from_txid_hex(FUNDING_TXID, 0).unwrap(),
            amount: 100_000,
        }]
    }

    fn two_utxos() -> Vec<Utxo> {
        vec![
            Utxo {
                outpoint: OutPoint::from_txid_hex(FUNDING_TXID, 0).unwrap(),
                amount: 100_000,
            },
            Utxo {
                outpoint: OutPoint::from_txid_hex(
                    "0000000000000000000000000000000000000000000000000000000000000001",
                    3,
                )
                .unwrap(),
                amount: 51_000,
            },
        ]
    }

    #[test]
    fn test_legacy_signature_hash_single_input() {
        let tx = unsigned(&single_utxo(), 1_000, 200);
        let sighash = legacy_signature_hash(&tx, 0, &redeem(200).to_bytes(), SIGHASH_ALL).unwrap();
        assert_eq!(
            hex::encode(sighash),
            "88a2362ebc2b925e498064b8a5f4467bf09520f3e841fdf4eb0c34ba2edda36e"
        );
    }

    #[test]
    fn test_legacy_signature_hash_per_input() {
        let tx = unsigned(&two_utxos(), 1_000, 200);
        let script = redeem(200).to_bytes();
        let first = legacy_signature_hash(&tx, 0, &script, SIGHASH_ALL).unwrap();
        let second = legacy_signature_hash(&tx, 1, &script, SIGHASH_ALL).unwrap();
        assert_eq!(
            hex::encode(first),
            "550b7b81480a1e602b355d8687b8d68bd8c1d80f01bd1018988b03ad046f8ba7"
        );
        assert_eq!(
            hex::encode(second),
            "433f5fef048c82b0165b99fc8606c79a7febfda7e9dafa09d1ffbbc892d38427"
        );
    }

    #[test]
    fn test_legacy_signature_hash_index_out_of_range() {
        let tx = unsigned(&single_utxo(), 1_000, 200);
        assert!(matches!(
            legacy_signature_hash(&tx, 1, &[], SIGHASH_ALL),
            Err(TimelockError::Signing(_))
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = PrivateKey::from_wif(WIF, Network::Regtest).unwrap();
        let script = redeem(200);
        let mut tx = unsigned(&two_utxos(), 1_000, 200);
        let outputs_before = tx.outputs.clone();

        sign_transaction(&mut tx, &key, &script).unwrap();
        assert!(tx.inputs.iter().all(|input| !input.script_sig.is_empty()));
        assert_eq!(tx.outputs, outputs_before);
        assert_eq!(tx.lock_time.to_consensus_u32(), 200);
        verify_transaction(&tx, &script).unwrap();

        let instructions = parse_instructions(&tx.inputs[0].script_sig).unwrap();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[1], Instruction::Push(key.public_key().to_bytes()));
        assert_eq!(instructions[2], Instruction::Push(script.to_bytes()));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = PrivateKey::from_wif(WIF, Network::Regtest).unwrap();
        let script = redeem(200);
        let mut first = unsigned(&single_utxo(), 1_000, 200);
        let mut second = first.clone();
        sign_transaction(&mut first, &key, &script).unwrap();
        sign_transaction(&mut second, &key, &script).unwrap();
        assert_eq!(serialize_hex(&first), serialize_hex(&second));
    }

    #[test]
    fn test_signing_key_mismatch() {
        let other = PrivateKey::from_wif(OTHER_WIF, Network::Regtest).unwrap();
        let mut tx = unsigned(&single_utxo(), 1_000, 200);
        let before = tx.clone();
        assert_eq!(
            sign_transaction(&mut tx, &other, &redeem(200)),
            Err(TimelockError::SigningKeyMismatch)
        );
        assert_eq!(tx, before);
    }

    #[test]
    fn test_lock_time_not_reached() {
        let key = PrivateKey::from_wif(WIF, Network::Regtest).unwrap();
        let mut tx = unsigned(&single_utxo(), 1_000, 199);
        assert!(matches!(
            sign_transaction(&mut tx, &key, &redeem(200)),
            Err(TimelockError::LockTimeNotSatisfied(_))
        ));
    }

    #[test]
    fn test_lock_time_kind_mismatch() {
        let mut tx = unsigned(&single_utxo(), 1_000, 1_700_000_000);
        assert!(matches!(
            check_lock_time(&tx, &redeem(200)),
            Err(TimelockError::LockTimeNotSatisfied(_))
        ));
        tx.lock_time = LockTime::from_consensus(300);
        assert!(check_lock_time(&tx, &redeem(200)).is_ok());
    }

    #[test]
    fn test_final_sequence_fails_lock_time() {
        let mut tx = unsigned(&single_utxo(), 1_000, 200);
        tx.inputs[0].sequence = SEQUENCE_FINAL;
        assert!(matches!(
            check_lock_time(&tx, &redeem(200)),
            Err(TimelockError::LockTimeNotSatisfied(_))
        ));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let key = PrivateKey::from_wif(WIF, Network::Regtest).unwrap();
        let script = redeem(200);
        let mut tx = unsigned(&single_utxo(), 1_000, 200);
        sign_transaction(&mut tx, &key, &script).unwrap();

        let mut tampered = tx.clone();
        tampered.outputs[0].value -= 1;
        assert!(matches!(
            verify_transaction(&tampered, &script),
            Err(TimelockError::VerificationFailed { index: 0, .. })
        ));

        assert!(matches!(
            verify_transaction(&tx, &redeem(150)),
            Err(TimelockError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn test_verify_unsigned_input_fails() {
        let tx = unsigned(&single_utxo(), 1_000, 200);
        assert!(matches!(
            verify_input(&tx, 0, &redeem(200)),
            Err(TimelockError::VerificationFailed { index: 0, .. })
        ));
    }
}
