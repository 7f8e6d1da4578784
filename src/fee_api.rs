//! HTTP fee-rate source
//!
//! The API answers with per-tier rates in sat/vB, e.g.
//! `{"fast": 12.5, "medium": 8, "slow": 3, "block": 840000}`. Tiers may be
//! numbers or numeric strings.

use crate::config::FeeApiConfig;
use crate::error::{Result, TimelockError};
use crate::fee::{FeePriority, FeeRate, FeeRateSource};
use log::info;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fee rates fetched from a JSON HTTP endpoint
pub struct HttpFeeRateSource {
    config: FeeApiConfig,
    client: reqwest::blocking::Client,
}

impl HttpFeeRateSource {
    pub fn new(config: FeeApiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TimelockError::FeeRateUnavailable(format!("HTTP client: {}", e)))?;
        Ok(HttpFeeRateSource { config, client })
    }

    fn fetch(&self) -> Result<Value> {
        let mut request = self.client.get(&self.config.url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .map_err(|e| TimelockError::FeeRateUnavailable(format!("{}: {}", self.config.url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TimelockError::FeeRateUnavailable(format!(
                "{} returned HTTP {}",
                self.config.url, status
            )));
        }
        response
            .json::<Value>()
            .map_err(|e| TimelockError::FeeRateUnavailable(format!("response body: {}", e)))
    }
}

impl FeeRateSource for HttpFeeRateSource {
    fn fee_rate(&self, priority: FeePriority) -> Result<FeeRate> {
        let rate = parse_fee_response(&self.fetch()?, priority)?;
        info!("current {} fee rate: {}", priority, rate);
        Ok(rate)
    }
}

/// Extract the tier's sat/vB rate and convert it to sat/kB
pub fn parse_fee_response(body: &Value, priority: FeePriority) -> Result<FeeRate> {
    let field = body.get(priority.as_str()).ok_or_else(|| {
        TimelockError::FeeRateUnavailable(format!("response has no '{}' rate", priority))
    })?;

    let sat_per_vbyte = match field {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        TimelockError::FeeRateUnavailable(format!("'{}' rate is not numeric: {}", priority, field))
    })?;

    FeeRate::from_sat_per_vbyte(sat_per_vbyte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_numeric_tiers() {
        let body = json!({"fast": 12.5, "medium": 8, "slow": 3, "block": 840000});
        assert_eq!(parse_fee_response(&body, FeePriority::Fast).unwrap().sat_per_kb(), 12_500);
        assert_eq!(parse_fee_response(&body, FeePriority::Medium).unwrap().sat_per_kb(), 8_000);
        assert_eq!(parse_fee_response(&body, FeePriority::Slow).unwrap().sat_per_kb(), 3_000);
    }

    #[test]
    fn test_parse_string_tier() {
        let body = json!({"fast": "4.25"});
        assert_eq!(parse_fee_response(&body, FeePriority::Fast).unwrap().sat_per_kb(), 4_250);
    }

    #[test]
    fn test_missing_tier_is_unavailable() {
        let body = json!({"medium": 8});
        assert!(matches!(
            parse_fee_response(&body, FeePriority::Fast),
            Err(TimelockError::FeeRateUnavailable(_))
        ));
    }

    #[test]
    fn test_non_numeric_or_zero_is_unavailable() {
        for body in [json!({"fast": "soon"}), json!({"fast": null}), json!({"fast": 0}), json!({"fast": "0"})] {
            assert!(matches!(
                parse_fee_response(&body, FeePriority::Fast),
                Err(TimelockError::FeeRateUnavailable(_))
            ));
        }
    }
}
