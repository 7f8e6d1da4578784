//! Consensus and policy constants used by the timelock engine

/// Lock time threshold: lock times below this are block heights, the rest UNIX timestamps
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number for final inputs; lock time is ignored when every input carries it
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Sequence number that keeps the transaction lock time active
pub const SEQUENCE_LOCKTIME_ENABLED: u32 = 0xfffffffe;

/// Version written into every spending transaction
pub const TX_VERSION: u32 = 2;

/// SIGHASH_ALL flag appended to signatures and to the signature-hash preimage
pub const SIGHASH_ALL: u32 = 0x01;

/// Length of a RIPEMD160(SHA256(x)) digest
pub const HASH160_LEN: usize = 20;

/// Length of a base58check-decoded address payload: version + hash160 + checksum
pub const ADDRESS_PAYLOAD_LEN: usize = 1 + HASH160_LEN + 4;

/// Satoshis per BTC
pub const SATOSHIS_PER_BTC: u64 = 100_000_000;

/// Maximum money supply: 21,000,000 BTC in satoshis
pub const MAX_MONEY: u64 = 21_000_000 * SATOSHIS_PER_BTC;

// Legacy size estimate: size = inputs * 148 + outputs * 34 + 10

/// Estimated bytes per input (compressed-key P2PKH style input)
pub const ESTIMATED_INPUT_SIZE: u64 = 148;

/// Estimated bytes per P2PKH output
pub const ESTIMATED_OUTPUT_SIZE: u64 = 34;

/// Estimated fixed overhead: version, counts, lock time
pub const ESTIMATED_TX_OVERHEAD: u64 = 10;

// Network version bytes

/// Mainnet P2PKH address version byte
pub const MAINNET_P2PKH_VERSION: u8 = 0x00;

/// Mainnet P2SH address version byte
pub const MAINNET_P2SH_VERSION: u8 = 0x05;

/// Mainnet WIF private key version byte
pub const MAINNET_WIF_VERSION: u8 = 0x80;

/// Testnet/regtest P2PKH address version byte
pub const TESTNET_P2PKH_VERSION: u8 = 0x6f;

/// Testnet/regtest P2SH address version byte
pub const TESTNET_P2SH_VERSION: u8 = 0xc4;

/// Testnet/regtest WIF private key version byte
pub const TESTNET_WIF_VERSION: u8 = 0xef;

// Opcodes used by the fixed script templates

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;

/// Largest script number CLTV accepts (5 bytes)
pub const MAX_LOCKTIME_PUSH_LEN: usize = 5;
