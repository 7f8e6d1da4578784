//! Script construction for the absolute-timelock redeem script
//!
//! The redeem script has the fixed shape
//! `<locktime> OP_CHECKLOCKTIMEVERIFY OP_DROP OP_DUP OP_HASH160 <pubkeyhash> OP_EQUALVERIFY OP_CHECKSIG`.
//! Its byte encoding depends only on the lock time and the public key hash,
//! never on the network.

use crate::constants::*;
use crate::crypto::hash160;
use crate::error::{Result, TimelockError};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single parsed script element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Non-push opcode (OP_0 and OP_1..OP_16 included)
    Op(u8),
    /// Data push, whatever push opcode carried it
    Push(ByteString),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Op(op) => write!(f, "{}", opcode_name(*op)),
            Instruction::Push(data) => write!(f, "{}", hex::encode(data)),
        }
    }
}

/// Name of an opcode as printed in script listings
pub fn opcode_name(op: u8) -> String {
    match op {
        OP_0 => "OP_0".to_string(),
        OP_1NEGATE => "OP_1NEGATE".to_string(),
        OP_1..=OP_16 => format!("OP_{}", op - OP_1 + 1),
        OP_DROP => "OP_DROP".to_string(),
        OP_DUP => "OP_DUP".to_string(),
        OP_EQUAL => "OP_EQUAL".to_string(),
        OP_EQUALVERIFY => "OP_EQUALVERIFY".to_string(),
        OP_HASH160 => "OP_HASH160".to_string(),
        OP_CHECKSIG => "OP_CHECKSIG".to_string(),
        OP_CHECKLOCKTIMEVERIFY => "OP_CHECKLOCKTIMEVERIFY".to_string(),
        other => format!("OP_UNKNOWN(0x{:02x})", other),
    }
}

/// Minimal script-number encoding (little-endian, sign bit in the last byte)
pub fn encode_script_number(value: i64) -> ByteString {
    if value == 0 {
        return vec![];
    }

    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut bytes = Vec::new();
    while magnitude > 0 {
        bytes.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    // An occupied sign bit needs an extra byte to carry the sign
    if bytes[bytes.len() - 1] & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = bytes.len() - 1;
        bytes[last] |= 0x80;
    }
    bytes
}

/// Append a number push: OP_0, OP_1NEGATE, OP_1..OP_16 or minimal data push
pub fn push_number(script: &mut ByteString, value: i64) {
    match value {
        0 => script.push(OP_0),
        -1 => script.push(OP_1NEGATE),
        1..=16 => script.push(OP_1 + (value as u8) - 1),
        _ => push_data(script, &encode_script_number(value)),
    }
}

/// Append a data push using the smallest push opcode for its length
pub fn push_data(script: &mut ByteString, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Serialize a list of instructions
pub fn serialize_instructions(instructions: &[Instruction]) -> ByteString {
    let mut script = Vec::new();
    for instruction in instructions {
        match instruction {
            Instruction::Op(op) => script.push(*op),
            Instruction::Push(data) => push_data(&mut script, data),
        }
    }
    script
}

/// Split raw script bytes into instructions
pub fn parse_instructions(script: &[u8]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut pos = 0;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let len = match opcode {
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 => read_push_len(script, &mut pos, 1)?,
            OP_PUSHDATA2 => read_push_len(script, &mut pos, 2)?,
            OP_PUSHDATA4 => read_push_len(script, &mut pos, 4)?,
            _ => {
                instructions.push(Instruction::Op(opcode));
                continue;
            }
        };

        let end = pos
            .checked_add(len)
            .filter(|end| *end <= script.len())
            .ok_or_else(|| {
                TimelockError::InvalidScript(format!("push of {} bytes runs past end of script", len))
            })?;
        instructions.push(Instruction::Push(script[pos..end].to_vec()));
        pos = end;
    }

    Ok(instructions)
}

fn read_push_len(script: &[u8], pos: &mut usize, width: usize) -> Result<usize> {
    let bytes = script
        .get(*pos..*pos + width)
        .ok_or_else(|| TimelockError::InvalidScript("truncated push length".to_string()))?;
    *pos += width;
    Ok(bytes
        .iter()
        .rev()
        .fold(0usize, |acc, byte| (acc << 8) | *byte as usize))
}

/// P2PKH locking script: OP_DUP OP_HASH160 <pkh> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh_script_pubkey(pubkey_hash: &PubkeyHash) -> ByteString {
    let mut script = vec![OP_DUP, OP_HASH160];
    push_data(&mut script, pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// P2SH locking script: OP_HASH160 <script hash> OP_EQUAL
pub fn p2sh_script_pubkey(script_hash: &PubkeyHash) -> ByteString {
    let mut script = vec![OP_HASH160];
    push_data(&mut script, script_hash);
    script.push(OP_EQUAL);
    script
}

/// Redeem script locking funds to a public key hash until a lock time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemScript {
    lock_time: LockTime,
    pubkey_hash: PubkeyHash,
}

/// Build the redeem script from an unchecked hash and lock time
///
/// Fails with `InvalidHash` when the hash is not 20 bytes and with
/// `InvalidLocktime` when the lock time does not fit in 32 unsigned bits.
pub fn build_redeem_script(pubkey_hash: &[u8], lock_time: i64) -> Result<RedeemScript> {
    let pubkey_hash: PubkeyHash = pubkey_hash
        .try_into()
        .map_err(|_| TimelockError::InvalidHash(pubkey_hash.len()))?;
    let lock_time = LockTime::from_i64(lock_time)?;
    Ok(RedeemScript::new(pubkey_hash, lock_time))
}

impl RedeemScript {
    pub fn new(pubkey_hash: PubkeyHash, lock_time: LockTime) -> Self {
        RedeemScript { lock_time, pubkey_hash }
    }

    pub fn lock_time(&self) -> LockTime {
        self.lock_time
    }

    pub fn pubkey_hash(&self) -> &PubkeyHash {
        &self.pubkey_hash
    }

    /// Structured form, in script order
    pub fn instructions(&self) -> Vec<Instruction> {
        let lock_time_instruction = match self.lock_time.to_consensus_u32() {
            0 => Instruction::Op(OP_0),
            n @ 1..=16 => Instruction::Op(OP_1 + n as u8 - 1),
            n => Instruction::Push(encode_script_number(n as i64)),
        };

        vec![
            lock_time_instruction,
            Instruction::Op(OP_CHECKLOCKTIMEVERIFY),
            Instruction::Op(OP_DROP),
            Instruction::Op(OP_DUP),
            Instruction::Op(OP_HASH160),
            Instruction::Push(self.pubkey_hash.to_vec()),
            Instruction::Op(OP_EQUALVERIFY),
            Instruction::Op(OP_CHECKSIG),
        ]
    }

    /// Canonical byte serialization
    pub fn to_bytes(&self) -> ByteString {
        let mut script = Vec::with_capacity(32);
        push_number(&mut script, self.lock_time.to_consensus_u32() as i64);
        script.push(OP_CHECKLOCKTIMEVERIFY);
        script.push(OP_DROP);
        script.push(OP_DUP);
        script.push(OP_HASH160);
        push_data(&mut script, &self.pubkey_hash);
        script.push(OP_EQUALVERIFY);
        script.push(OP_CHECKSIG);
        script
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// HASH160 of the serialized script, committed to by the P2SH address
    pub fn script_hash(&self) -> PubkeyHash {
        hash160(&self.to_bytes())
    }

    /// Recognise a serialized redeem script of the fixed template
    ///
    /// Only the canonical encoding is accepted: the parsed values must
    /// re-serialize to exactly the given bytes.
    pub fn from_bytes(script: &[u8]) -> Result<Self> {
        let instructions = parse_instructions(script)?;
        if instructions.len() != 8 {
            return Err(TimelockError::InvalidScript(format!(
                "expected 8 elements, found {}",
                instructions.len()
            )));
        }

        let lock_time = match &instructions[0] {
            Instruction::Op(OP_0) => 0,
            Instruction::Op(op @ OP_1..=OP_16) => (op - OP_1 + 1) as i64,
            Instruction::Push(data) if data.len() <= MAX_LOCKTIME_PUSH_LEN => {
                decode_script_number(data)?
            }
            other => {
                return Err(TimelockError::InvalidScript(format!(
                    "expected lock time push, found {}",
                    other
                )))
            }
        };

        let pubkey_hash = match &instructions[5] {
            Instruction::Push(data) => data.clone(),
            other => {
                return Err(TimelockError::InvalidScript(format!(
                    "expected public key hash push, found {}",
                    other
                )))
            }
        };

        let redeem_script = build_redeem_script(&pubkey_hash, lock_time)?;
        if redeem_script.to_bytes() != script {
            return Err(TimelockError::InvalidScript(
                "script does not match the timelock template".to_string(),
            ));
        }
        Ok(redeem_script)
    }

    pub fn from_hex(script_hex: &str) -> Result<Self> {
        let bytes = hex::decode(script_hex)
            .map_err(|e| TimelockError::InvalidScript(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for RedeemScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.lock_time)?;
        for instruction in self.instructions().iter().skip(1) {
            write!(f, ", {}", instruction)?;
        }
        write!(f, "]")
    }
}

/// Decode a minimally encoded script number
pub fn decode_script_number(bytes: &[u8]) -> Result<i64> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(TimelockError::InvalidScript("script number too long".to_string()));
    }

    let last = bytes[bytes.len() - 1];
    if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
        return Err(TimelockError::InvalidScript("non-minimal script number".to_string()));
    }

    let mut value: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        let byte = if i == bytes.len() - 1 { byte & 0x7f } else { *byte };
        value |= (byte as i64) << (8 * i);
    }
    if last & 0x80 != 0 {
        value = -value;
    }
    Ok(value)
}
