use std::path::{Path, PathBuf};
use std::time::Duration;

use cidvault_types::{Account, ChainId};
use serde::{Deserialize, Serialize};

pub const ENV_REGISTRY_ADDRESS: &str = "CIDVAULT_REGISTRY_ADDRESS";
pub const ENV_CHAIN_ID: &str = "CIDVAULT_CHAIN_ID";
pub const ENV_RPC_URL: &str = "CIDVAULT_RPC_URL";
pub const ENV_PIN_ENDPOINT: &str = "CIDVAULT_PIN_ENDPOINT";
pub const ENV_PIN_JWT: &str = "CIDVAULT_PIN_JWT";
pub const ENV_GATEWAYS: &str = "CIDVAULT_GATEWAYS";
pub const ENV_METADATA_JWT: &str = "CIDVAULT_METADATA_JWT";
pub const ENV_METADATA_ENDPOINT: &str = "CIDVAULT_METADATA_ENDPOINT";
pub const ENV_CONFIRMATIONS: &str = "CIDVAULT_CONFIRMATIONS";
pub const ENV_POLL_INTERVAL_MS: &str = "CIDVAULT_POLL_INTERVAL_MS";
pub const ENV_FROM_BLOCK: &str = "CIDVAULT_FROM_BLOCK";

pub const DEFAULT_PIN_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";
pub const DEFAULT_METADATA_ENDPOINT: &str = "https://api.pinata.cloud/data/pinList";
pub const DEFAULT_GATEWAYS: [&str; 3] = [
    "https://gateway.pinata.cloud/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
];

/// Errors raised while loading or validating a [`VaultConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("cannot read {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },

    #[error("cannot parse configuration: {0}")]
    Parse(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Installation settings for a CidVault pipeline.
///
/// Loaded from a TOML file, from `CIDVAULT_*` environment variables, or
/// both (environment wins). Call [`VaultConfig::validate`] once at startup.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VaultConfig {
    pub registry_address: Option<Account>,
    pub chain_id: Option<ChainId>,
    pub rpc_url: Option<String>,
    pub pin_endpoint: String,
    pub pin_jwt: Option<String>,
    /// Read mirrors, primary first.
    pub gateways: Vec<String>,
    pub metadata_jwt: Option<String>,
    pub metadata_endpoint: String,
    pub confirmations: u64,
    pub poll_interval_ms: u64,
    pub from_block: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            registry_address: None,
            chain_id: None,
            rpc_url: None,
            pin_endpoint: DEFAULT_PIN_ENDPOINT.into(),
            pin_jwt: None,
            gateways: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            metadata_jwt: None,
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.into(),
            confirmations: 1,
            poll_interval_ms: 1500,
            from_block: 0,
        }
    }
}

impl VaultConfig {
    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.overlay(lookup)?;
        Ok(config)
    }

    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.overlay(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Replace fields for which `lookup` yields a non-blank value.
    pub fn overlay(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_REGISTRY_ADDRESS) {
            self.registry_address = Some(v.parse().map_err(|e: cidvault_types::TypeError| {
                ConfigError::Invalid {
                    key: ENV_REGISTRY_ADDRESS,
                    reason: e.to_string(),
                }
            })?);
        }
        if let Some(v) = get(ENV_CHAIN_ID) {
            self.chain_id = Some(v.parse().map_err(|e: cidvault_types::TypeError| {
                ConfigError::Invalid {
                    key: ENV_CHAIN_ID,
                    reason: e.to_string(),
                }
            })?);
        }
        if let Some(v) = get(ENV_RPC_URL) {
            self.rpc_url = Some(v);
        }
        if let Some(v) = get(ENV_PIN_ENDPOINT) {
            self.pin_endpoint = v;
        }
        if let Some(v) = get(ENV_PIN_JWT) {
            self.pin_jwt = Some(v);
        }
        if let Some(v) = get(ENV_GATEWAYS) {
            self.gateways = v
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get(ENV_METADATA_JWT) {
            self.metadata_jwt = Some(v);
        }
        if let Some(v) = get(ENV_METADATA_ENDPOINT) {
            self.metadata_endpoint = v;
        }
        if let Some(v) = get(ENV_CONFIRMATIONS) {
            self.confirmations = parse_number(ENV_CONFIRMATIONS, &v)?;
        }
        if let Some(v) = get(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_number(ENV_POLL_INTERVAL_MS, &v)?;
        }
        if let Some(v) = get(ENV_FROM_BLOCK) {
            self.from_block = parse_number(ENV_FROM_BLOCK, &v)?;
        }
        Ok(())
    }

    /// Check that every required setting is present and usable.
    pub fn validate(&self) -> ConfigResult<()> {
        self.require_registry_address()?;
        self.require_chain_id()?;
        self.require_rpc_url()?;
        self.require_pin_jwt()?;
        if self.gateways.is_empty() {
            return Err(ConfigError::Missing(ENV_GATEWAYS));
        }
        if self.confirmations == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_CONFIRMATIONS,
                reason: "must be at least 1".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_POLL_INTERVAL_MS,
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn require_registry_address(&self) -> ConfigResult<Account> {
        self.registry_address
            .ok_or(ConfigError::Missing(ENV_REGISTRY_ADDRESS))
    }

    pub fn require_chain_id(&self) -> ConfigResult<ChainId> {
        self.chain_id.ok_or(ConfigError::Missing(ENV_CHAIN_ID))
    }

    pub fn require_rpc_url(&self) -> ConfigResult<&str> {
        self.rpc_url.as_deref().ok_or(ConfigError::Missing(ENV_RPC_URL))
    }

    pub fn require_pin_jwt(&self) -> ConfigResult<&str> {
        self.pin_jwt.as_deref().ok_or(ConfigError::Missing(ENV_PIN_JWT))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_number(key: &'static str, value: &str) -> ConfigResult<u64> {
    value.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

// Credentials stay out of logs.
impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("VaultConfig")
            .field("registry_address", &self.registry_address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("pin_endpoint", &self.pin_endpoint)
            .field("pin_jwt", &redact(&self.pin_jwt))
            .field("gateways", &self.gateways)
            .field("metadata_jwt", &redact(&self.metadata_jwt))
            .field("metadata_endpoint", &self.metadata_endpoint)
            .field("confirmations", &self.confirmations)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("from_block", &self.from_block)
            .finish()
    }
}
