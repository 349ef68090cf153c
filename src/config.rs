// src/config.rs
//! Agent configuration.
//!
//! Loaded with the `config` crate from an optional `anoncreds.{toml,json,yaml}`
//! file, overridden by `ANONCREDS__`-prefixed environment variables with `__`
//! separating nested keys, e.g. `ANONCREDS__LEDGER__VISIBILITY_LAG_MS=250`.
//! Every field has a default, so an empty environment yields a working local
//! agent.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub pool_name: String,
    /// Delay before a committed write becomes readable
    pub visibility_lag_ms: u64,
    /// Deadline for a single submit or read
    pub timeout_ms: u64,
    /// Seed of the steward identity placed in the pool's genesis
    pub steward_seed: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            pool_name: "local_pool".to_string(),
            visibility_lag_ms: 0,
            timeout_ms: 10_000,
            steward_seed: "000000000000000000000000Steward1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    pub id: String,
    pub timeout_ms: u64,
}

impl Default for WalletSettings {
    fn default() -> Self {
        WalletSettings {
            id: "agent_wallet".to_string(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub bind_addr: String,
    /// Per-request deadline enforced by the HTTP layer
    pub request_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            bind_addr: "127.0.0.1:3000".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ledger: LedgerSettings,
    pub wallet: WalletSettings,
    pub api: ApiSettings,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ledger: LedgerSettings::default(),
            wallet: WalletSettings::default(),
            api: ApiSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `anoncreds.*` in the working directory and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("anoncreds")
    }

    /// Loads settings from the file stem `name` and the environment.
    pub fn load_from(name: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(
                Environment::with_prefix("ANONCREDS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
