//! Payveil Configuration
//!
//! Shared configuration crate for payveil clients and tools.
//!
//! Handles loading configuration from:
//! 1. PV_CONFIG env var (explicit path)
//! 2. ./payveil.toml (current directory)
//! 3. ~/.payveil/payveil.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<PayveilConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "payveil.toml";
const CONFIG_DIR_NAME: &str = ".payveil";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_CHAIN_ID: u64 = 31337;
const DEFAULT_CHAIN_NAME: &str = "hardhat";
const DEFAULT_AUTH_DURATION_SECS: u64 = 10 * 24 * 60 * 60;
const DEFAULT_AUTH_STORE_PATH: &str = "./payveil-authorizations";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayveilConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
    #[serde(default)]
    pub authorization: AuthorizationConfig,
    #[serde(default)]
    pub features: FeatureFlags,
}

/// Network the client connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_chain_name")]
    pub chain_name: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            chain_name: DEFAULT_CHAIN_NAME.into(),
        }
    }
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_chain_name() -> String {
    DEFAULT_CHAIN_NAME.into()
}

/// A deployed salary ledger (`[[deployments]]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub chain_id: u64,
    /// 0x-prefixed ledger address
    pub address: String,
    #[serde(default)]
    pub chain_name: String,
}

/// Where decryption authorizations are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStoreKind {
    #[default]
    Memory,
    Rocksdb,
}

/// Decryption authorization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default = "default_auth_duration")]
    pub duration_secs: u64,
    #[serde(default)]
    pub store: AuthorizationStoreKind,
    #[serde(default = "default_auth_store_path")]
    pub store_path: String,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_AUTH_DURATION_SECS,
            store: AuthorizationStoreKind::Memory,
            store_path: DEFAULT_AUTH_STORE_PATH.into(),
        }
    }
}

fn default_auth_duration() -> u64 {
    DEFAULT_AUTH_DURATION_SECS
}

fn default_auth_store_path() -> String {
    DEFAULT_AUTH_STORE_PATH.into()
}

/// Feature flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Run against the in-process dev network
    #[serde(default)]
    pub dev_mode: bool,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        } else {
            log::warn!("Ignoring unparseable {key}={v}");
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl PayveilConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check PV_CONFIG env var
        if let Ok(path) = env::var("PV_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("PV_CONFIG points to a missing file: {}", path.display());
        }

        // 2. Check ./payveil.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.payveil/payveil.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Network
        env_parse("PV_CHAIN_ID", &mut self.network.chain_id);

        // Authorization
        env_parse("PV_AUTH_DURATION_SECS", &mut self.authorization.duration_secs);
        if let Ok(v) = env::var("PV_AUTH_STORE") {
            self.authorization.store = match v.to_ascii_lowercase().as_str() {
                "rocksdb" => AuthorizationStoreKind::Rocksdb,
                _ => AuthorizationStoreKind::Memory,
            };
        }
        env_string("PV_AUTH_STORE_PATH", &mut self.authorization.store_path);

        // Features
        if let Some(v) = env_bool("PV_DEV_MODE") {
            self.features.dev_mode = v;
        }
    }

    /// Deployment registered for `chain_id`, if any.
    pub fn deployment(&self, chain_id: u64) -> Option<&DeploymentConfig> {
        self.deployments.iter().find(|d| d.chain_id == chain_id)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.features.dev_mode = true;
        sample.deployments.push(DeploymentConfig {
            chain_id: 11155111,
            address: "0x0000000000000000000000000000000000000000".into(),
            chain_name: "sepolia".into(),
        });
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static PayveilConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static PayveilConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: PayveilConfig) -> Result<(), PayveilConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `PayveilConfig::global()`.
#[inline]
pub fn global_config() -> &'static PayveilConfig {
    PayveilConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PayveilConfig::default();
        assert_eq!(config.network.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.authorization.duration_secs, DEFAULT_AUTH_DURATION_SECS);
        assert_eq!(config.authorization.store, AuthorizationStoreKind::Memory);
        assert!(config.deployments.is_empty());
        assert!(!config.features.dev_mode);
    }

    #[test]
    fn test_generate_sample() {
        let sample = PayveilConfig::generate_sample();
        assert!(sample.contains("[network]"));
        assert!(sample.contains("[[deployments]]"));
        assert!(sample.contains("[authorization]"));
        assert!(sample.contains("[features]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = PayveilConfig::generate_sample();
        let parsed: PayveilConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.network.chain_id, DEFAULT_CHAIN_ID);
        assert!(parsed.features.dev_mode);
        assert_eq!(parsed.deployment(11155111).unwrap().chain_name, "sepolia");
        assert!(parsed.deployment(1).is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[authorization]
store = "rocksdb"

[[deployments]]
chain_id = 31337
address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#
        )
        .unwrap();

        let parsed = PayveilConfig::parse_file(file.path()).unwrap();
        assert_eq!(parsed.authorization.store, AuthorizationStoreKind::Rocksdb);
        assert_eq!(parsed.authorization.duration_secs, DEFAULT_AUTH_DURATION_SECS);
        assert_eq!(parsed.authorization.store_path, DEFAULT_AUTH_STORE_PATH);
        assert_eq!(parsed.deployments.len(), 1);
        assert_eq!(parsed.deployments[0].chain_name, "");
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network\nchain_id = ").unwrap();

        let err = PayveilConfig::parse_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
