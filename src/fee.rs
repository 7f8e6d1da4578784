//! Fee estimation for legacy (non-segwit) spending transactions
//!
//! The size formula `inputs * 148 + outputs * 34 + 10` is an estimate, not
//! the exact serialized size. The 148-byte input figure is sized for a
//! compressed-key P2PKH input; a P2SH input that also carries the redeem
//! script is larger, so real signed transactions come out somewhat bigger.

use crate::constants::*;
use crate::error::{Result, TimelockError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fee rate in satoshis per 1000 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(u64);

impl FeeRate {
    pub fn from_sat_per_kb(sat_per_kb: u64) -> Self {
        FeeRate(sat_per_kb)
    }

    /// Convert a sat/vB quote into sat/kB, rounding to the nearest satoshi
    ///
    /// Zero, negative and non-finite quotes are `FeeRateUnavailable`.
    pub fn from_sat_per_vbyte(sat_per_vbyte: f64) -> Result<Self> {
        if !sat_per_vbyte.is_finite() || sat_per_vbyte <= 0.0 {
            return Err(TimelockError::FeeRateUnavailable(format!(
                "unusable fee rate {} sat/vB",
                sat_per_vbyte
            )));
        }
        Ok(FeeRate((sat_per_vbyte * 1000.0).round() as u64))
    }

    pub fn sat_per_kb(self) -> u64 {
        self.0
    }

    /// floor(rate * size / 1000)
    pub fn fee_for_size(self, size_bytes: u64) -> u64 {
        (self.0 as u128 * size_bytes as u128 / 1000) as u64
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/kB", self.0)
    }
}

/// Confirmation priority tier offered by fee rate sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePriority {
    Slow,
    Medium,
    Fast,
}

impl FeePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            FeePriority::Slow => "slow",
            FeePriority::Medium => "medium",
            FeePriority::Fast => "fast",
        }
    }
}

impl fmt::Display for FeePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeePriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow" => Ok(FeePriority::Slow),
            "medium" => Ok(FeePriority::Medium),
            "fast" => Ok(FeePriority::Fast),
            other => Err(format!("unknown fee priority '{}'", other)),
        }
    }
}

/// Source of the current network fee rate
///
/// Implementations must never report a zero rate in place of a missing one;
/// absence is `FeeRateUnavailable`.
pub trait FeeRateSource {
    fn fee_rate(&self, priority: FeePriority) -> Result<FeeRate>;
}

/// Fee rate supplied explicitly by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFeeRate(pub FeeRate);

impl FeeRateSource for FixedFeeRate {
    fn fee_rate(&self, _priority: FeePriority) -> Result<FeeRate> {
        if self.0.sat_per_kb() == 0 {
            return Err(TimelockError::FeeRateUnavailable("fixed fee rate is zero".to_string()));
        }
        Ok(self.0)
    }
}

/// Estimated size in bytes: inputs * 148 + outputs * 34 + 10
pub fn estimate_size(input_count: usize, output_count: usize) -> u64 {
    input_count as u64 * ESTIMATED_INPUT_SIZE
        + output_count as u64 * ESTIMATED_OUTPUT_SIZE
        + ESTIMATED_TX_OVERHEAD
}

/// Absolute fee for a transaction of the given shape
pub fn estimate_fee(fee_rate: FeeRate, input_count: usize, output_count: usize) -> u64 {
    fee_rate.fee_for_size(estimate_size(input_count, output_count))
}
