//! Runtime configuration for the node and fee-rate collaborators
//!
//! Values normally arrive from the command line or the environment
//! (`RPCHOST`, `RPCPORT`, `RPCUSER`, `RPCPASSWORD`, `FEE_API_URL`,
//! `TATUM_API_KEY`, `FEE_SPEED`); unset values fall back to the defaults here.

use crate::types::Network;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_FEE_API_URL: &str = "https://api.tatum.io/v3/blockchain/fee/BTC";

/// bitcoind JSON-RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl RpcConfig {
    /// Local node on the network's default port, no credentials
    pub fn for_network(network: Network) -> Self {
        RpcConfig {
            host: DEFAULT_RPC_HOST.to_string(),
            port: network.default_rpc_port(),
            user: None,
            password: None,
        }
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_credentials(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = user;
        self.password = password;
        self
    }

    pub fn url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// HTTP fee-rate API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeApiConfig {
    pub url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for FeeApiConfig {
    fn default() -> Self {
        FeeApiConfig {
            url: DEFAULT_FEE_API_URL.to_string(),
            api_key: None,
        }
    }
}
