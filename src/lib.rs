//! # timelock-p2sh
//!
//! Absolute-timelock P2SH addresses and the transactions that spend them.
//!
//! Funds are locked to the redeem script
//! `<locktime> OP_CHECKLOCKTIMEVERIFY OP_DROP OP_DUP OP_HASH160 <pubkeyhash> OP_EQUALVERIFY OP_CHECKSIG`
//! and can only be spent by the owner of the key once the lock time has passed.
//!
//! ## Architecture
//!
//! The crate is split into a pure core and its collaborators:
//! - Script builder, address codec, fee estimator, transaction builder and
//!   signer (pure functions over in-memory values)
//! - Key provider, UTXO source, fee rate source and broadcast sink
//!   (external inputs, behind traits)
//! - The `generate` and `spend` flows that wire them together
//!
//! ## Design Principles
//!
//! 1. **Explicit network**: the network is always a parameter, never global state
//! 2. **Fail before signing**: construction errors abort before any key is used
//! 3. **Verify before sending**: signed transactions are checked locally first
//! 4. **Exact Version Pinning**: cryptographic dependencies are pinned to exact versions
//!
//! ## Usage
//!
//! ```rust
//! use timelock_p2sh::TimelockP2sh;
//! use timelock_p2sh::types::*;
//!
//! let timelock = TimelockP2sh::new(Network::Regtest);
//! let script = timelock.build_redeem_script(&[0u8; 20], 200).unwrap();
//! let address = timelock.p2sh_address(&script);
//! assert!(address.to_string().starts_with('2'));
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod crypto;
pub mod script;
pub mod address;
pub mod keys;
pub mod fee;
pub mod transaction;
pub mod signer;
pub mod rpc;
pub mod fee_api;
pub mod config;
pub mod workflow;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{Result, TimelockError};
pub use address::{Address, AddressKind};
pub use fee::{FeePriority, FeeRate, FeeRateSource, FixedFeeRate};
pub use keys::{KeySource, PrivateKey, PublicKey};
pub use script::RedeemScript;
pub use transaction::UnsignedSpend;
pub use workflow::{GenerateReport, SpendReport, SpendRequest, SpendStatus, Stage, WorkflowError};

/// Timelock operations bound to one network
///
/// # Examples
///
/// ```
/// use timelock_p2sh::TimelockP2sh;
/// use timelock_p2sh::types::*;
///
/// let timelock = TimelockP2sh::new(Network::Mainnet);
/// let pubkey_hash = hex::decode("f54a5851e9372b87810a8e60cdd2e7cfd80b6e31").unwrap();
/// let script = timelock.build_redeem_script(&pubkey_hash, 200).unwrap();
///
/// assert_eq!(
///     timelock.p2sh_address(&script).to_string(),
///     "34mB7TrhPhCB4rC2GmTSEk7wCEKJqUi6En"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelockP2sh {
    network: Network,
}

impl TimelockP2sh {
    /// Create a new instance for `network`
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Build the redeem script for a 20-byte public key hash and lock time
    pub fn build_redeem_script(&self, pubkey_hash: &[u8], lock_time: i64) -> Result<RedeemScript> {
        script::build_redeem_script(pubkey_hash, lock_time)
    }

    /// P2SH address committing to `redeem_script`
    pub fn p2sh_address(&self, redeem_script: &RedeemScript) -> Address {
        Address::p2sh(redeem_script, self.network)
    }

    /// Decode an address string for this network
    ///
    /// # Examples
    ///
    /// ```
    /// use timelock_p2sh::{AddressKind, TimelockP2sh};
    /// use timelock_p2sh::types::*;
    ///
    /// let timelock = TimelockP2sh::new(Network::Regtest);
    /// let address = timelock.decode_address("n3svudhm7bt6j3nTT9uu1A57Cs9pKK3iXW").unwrap();
    /// assert_eq!(address.kind(), AddressKind::P2pkh);
    /// ```
    pub fn decode_address(&self, address: &str) -> Result<Address> {
        Address::decode(address, self.network)
    }

    /// Estimated absolute fee for a transaction of the given shape
    ///
    /// # Examples
    ///
    /// ```
    /// use timelock_p2sh::{FeeRate, TimelockP2sh};
    /// use timelock_p2sh::types::*;
    ///
    /// let timelock = TimelockP2sh::new(Network::Regtest);
    /// assert_eq!(timelock.estimate_fee(FeeRate::from_sat_per_kb(5000), 2, 1), 1700);
    /// ```
    pub fn estimate_fee(&self, fee_rate: FeeRate, input_count: usize, output_count: usize) -> u64 {
        fee::estimate_fee(fee_rate, input_count, output_count)
    }

    /// Unsigned transaction spending `utxos` to a P2PKH recipient
    pub fn build_spend(
        &self,
        utxos: &[Utxo],
        recipient: &Address,
        fee_rate: FeeRate,
        lock_time: LockTime,
    ) -> Result<UnsignedSpend> {
        transaction::build_spend_transaction(utxos, recipient, fee_rate, lock_time)
    }

    /// Sign every input against the redeem script
    pub fn sign(&self, tx: &mut Transaction, private_key: &PrivateKey, redeem_script: &RedeemScript) -> Result<()> {
        signer::sign_transaction(tx, private_key, redeem_script)
    }

    /// Verify every signed input against the redeem script
    pub fn verify(&self, tx: &Transaction, redeem_script: &RedeemScript) -> Result<()> {
        signer::verify_transaction(tx, redeem_script)
    }

    /// Whether consensus enforces the lock time of `tx`
    pub fn is_lock_time_enforced(&self, tx: &Transaction) -> bool {
        transaction::is_lock_time_enforced(tx)
    }

    /// Run the generate flow
    pub fn generate(&self, source: &KeySource, lock_time: i64) -> std::result::Result<GenerateReport, WorkflowError> {
        workflow::generate(source, lock_time, self.network)
    }
}

impl Default for TimelockP2sh {
    fn default() -> Self {
        Self::new(Network::Regtest)
    }
}
