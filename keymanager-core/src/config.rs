//! Vault and store specs handed in by the provisioning layer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashicorpSpecs {
    pub address: String,
    #[serde(default = "default_mount")]
    pub mount_point: String,
    #[serde(default)]
    pub token: Option<String>,
    /// File holding the token; read once when the client is built.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
    #[serde(default)]
    pub skip_verify: bool,
}

fn default_mount() -> String {
    crate::backend::hashicorp::DEFAULT_MOUNT.to_string()
}

impl HashicorpSpecs {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            mount_point: default_mount(),
            token: None,
            token_path: None,
            namespace: None,
            timeout_secs: None,
            ca_bundle: None,
            skip_verify: false,
        }
    }

    /// Reads `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`, `KEYMANAGER_VAULT_MOUNT`
    /// and `KEYMANAGER_VAULT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let address = std::env::var("VAULT_ADDR").context("set VAULT_ADDR to the Vault server URL")?;
        let mount_point =
            std::env::var("KEYMANAGER_VAULT_MOUNT").unwrap_or_else(|_| default_mount());
        let timeout_secs = std::env::var("KEYMANAGER_VAULT_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0);

        Ok(Self {
            address,
            mount_point,
            token: std::env::var("VAULT_TOKEN").ok(),
            token_path: None,
            namespace: std::env::var("VAULT_NAMESPACE").ok(),
            timeout_secs,
            ca_bundle: None,
            skip_verify: false,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSpecs {
    pub vault_name: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsSpecs {
    pub region: String,
    #[serde(default)]
    pub access_id: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

/// Exactly one of `vault` or `secret_store` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreSpecs {
    #[serde(default)]
    pub vault: Option<String>,
    #[serde(default)]
    pub secret_store: Option<String>,
}

impl KeyStoreSpecs {
    pub fn vault(name: impl Into<String>) -> Self {
        Self {
            vault: Some(name.into()),
            secret_store: None,
        }
    }

    pub fn secret_store(name: impl Into<String>) -> Self {
        Self {
            vault: None,
            secret_store: Some(name.into()),
        }
    }
}

/// Where the key store behind an ethereum store comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EthereumSpecs {
    /// An already registered key store.
    KeyStore(String),
    /// A vendor key store built on the named vault.
    Vault(String),
    /// A local key store over the named secret store.
    SecretStore(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashicorp_specs_defaults() {
        let specs: HashicorpSpecs =
            serde_json::from_value(serde_json::json!({"address": "http://127.0.0.1:8200"}))
                .unwrap();
        assert_eq!(specs.mount_point, "secret");
        assert_eq!(specs.timeout(), Duration::from_secs(15));
        assert!(!specs.skip_verify);
    }

    #[test]
    fn hashicorp_specs_from_env() {
        unsafe {
            std::env::set_var("VAULT_ADDR", "http://vault:8200");
            std::env::set_var("KEYMANAGER_VAULT_MOUNT", "kv");
            std::env::set_var("KEYMANAGER_VAULT_TIMEOUT_SECS", "0");
            std::env::remove_var("VAULT_NAMESPACE");
        }
        let specs = HashicorpSpecs::from_env().unwrap();
        assert_eq!(specs.address, "http://vault:8200");
        assert_eq!(specs.mount_point, "kv");
        assert_eq!(specs.timeout_secs, None);
        assert_eq!(specs.namespace, None);
    }

    #[test]
    fn ethereum_specs_are_externally_tagged() {
        let specs: EthereumSpecs =
            serde_json::from_value(serde_json::json!({"secret_store": "vault-1"})).unwrap();
        assert_eq!(specs, EthereumSpecs::SecretStore("vault-1".into()));
    }

    #[test]
    fn key_store_specs_accept_either_source() {
        let specs: KeyStoreSpecs =
            serde_json::from_value(serde_json::json!({"vault": "akv"})).unwrap();
        assert_eq!(specs, KeyStoreSpecs::vault("akv"));
    }
}
