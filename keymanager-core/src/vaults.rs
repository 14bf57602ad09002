//! Named registry of vendor vaults.
//!
//! A vault is a configured capability client. Stores are built on top of
//! vaults by the connector; the registry itself only creates and hands out
//! clients.

use crate::config::{AwsSpecs, AzureSpecs, HashicorpSpecs};
use keymanager_spec::vendor::{AzureClient, KmsClient, KvClient, SecretsManagerClient, TokenClient};
use keymanager_spec::{Error, Result, VaultKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct HashicorpHandle {
    pub kv: Arc<dyn KvClient>,
    /// Present when the client can be driven by a token refresh loop.
    pub token: Option<Arc<dyn TokenClient>>,
    pub mount: String,
}

#[derive(Clone)]
pub struct AwsClients {
    pub kms: Arc<dyn KmsClient>,
    pub secrets: Arc<dyn SecretsManagerClient>,
}

#[derive(Clone)]
pub enum VaultClient {
    Hashicorp(HashicorpHandle),
    Azure(Arc<dyn AzureClient>),
    Aws(AwsClients),
}

impl VaultClient {
    pub fn kind(&self) -> VaultKind {
        match self {
            Self::Hashicorp(_) => VaultKind::Hashicorp,
            Self::Azure(_) => VaultKind::Azure,
            Self::Aws(_) => VaultKind::Aws,
        }
    }
}

pub struct Vault {
    pub name: String,
    pub client: VaultClient,
}

impl Vault {
    pub fn kind(&self) -> VaultKind {
        self.client.kind()
    }
}

/// Builds vendor clients from their specs.
pub trait ClientFactory: Send + Sync {
    fn hashicorp(&self, specs: &HashicorpSpecs) -> Result<HashicorpHandle>;
    fn azure(&self, specs: &AzureSpecs) -> Result<Arc<dyn AzureClient>>;
    fn aws(&self, specs: &AwsSpecs) -> Result<AwsClients>;
}

/// Factory for the clients this crate ships: HashiCorp over HTTP.
///
/// Azure and AWS need an SDK backed factory supplied by the embedding service.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    #[cfg(feature = "hashicorp-http")]
    fn hashicorp(&self, specs: &HashicorpSpecs) -> Result<HashicorpHandle> {
        let client = Arc::new(crate::backend::HashicorpClient::new(specs)?);
        Ok(HashicorpHandle {
            kv: client.clone(),
            token: Some(client),
            mount: specs.mount_point.clone(),
        })
    }

    #[cfg(not(feature = "hashicorp-http"))]
    fn hashicorp(&self, _specs: &HashicorpSpecs) -> Result<HashicorpHandle> {
        Err(Error::NotSupported(
            "built without the hashicorp-http feature".into(),
        ))
    }

    fn azure(&self, specs: &AzureSpecs) -> Result<Arc<dyn AzureClient>> {
        Err(Error::NotSupported(format!(
            "no azure client available for key vault '{}'",
            specs.vault_name
        )))
    }

    fn aws(&self, specs: &AwsSpecs) -> Result<AwsClients> {
        Err(Error::NotSupported(format!(
            "no aws client available for region '{}'",
            specs.region
        )))
    }
}

pub struct Vaults {
    factory: Arc<dyn ClientFactory>,
    vaults: RwLock<HashMap<String, Arc<Vault>>>,
}

impl Default for Vaults {
    fn default() -> Self {
        Self::new(Arc::new(HttpClientFactory))
    }
}

impl Vaults {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            vaults: RwLock::new(HashMap::new()),
        }
    }

    pub fn create_hashicorp(&self, name: &str, specs: &HashicorpSpecs) -> Result<Arc<Vault>> {
        self.ensure_free(name)?;
        let handle = self.factory.hashicorp(specs);
        self.insert(name, handle.map(VaultClient::Hashicorp))
    }

    pub fn create_azure(&self, name: &str, specs: &AzureSpecs) -> Result<Arc<Vault>> {
        self.ensure_free(name)?;
        let client = self.factory.azure(specs);
        self.insert(name, client.map(VaultClient::Azure))
    }

    pub fn create_aws(&self, name: &str, specs: &AwsSpecs) -> Result<Arc<Vault>> {
        self.ensure_free(name)?;
        let clients = self.factory.aws(specs);
        self.insert(name, clients.map(VaultClient::Aws))
    }

    /// Registers an already built client.
    pub fn register(&self, name: &str, client: VaultClient) -> Result<Arc<Vault>> {
        self.insert(name, Ok(client))
    }

    pub fn get(&self, name: &str) -> Result<Arc<Vault>> {
        self.vaults
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("vault '{name}'")))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vaults.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.vaults.read().contains_key(name) {
            return Err(Error::already_exists(format!("vault '{name}'")));
        }
        Ok(())
    }

    fn insert(&self, name: &str, client: Result<VaultClient>) -> Result<Arc<Vault>> {
        let client = match client {
            Ok(client) => client,
            Err(err) => {
                warn!(vault = name, error = %err, "failed to build vault client");
                return Err(err);
            }
        };
        let kind = client.kind();
        let vault = Arc::new(Vault {
            name: name.to_string(),
            client,
        });
        match self.vaults.write().entry(name.to_string()) {
            Entry::Occupied(_) => return Err(Error::already_exists(format!("vault '{name}'"))),
            Entry::Vacant(slot) => {
                slot.insert(vault.clone());
            }
        }
        info!(vault = name, kind = %kind, "registered vault");
        Ok(vault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryKvClient;

    struct MemoryFactory;

    impl ClientFactory for MemoryFactory {
        fn hashicorp(&self, specs: &HashicorpSpecs) -> Result<HashicorpHandle> {
            Ok(HashicorpHandle {
                kv: Arc::new(MemoryKvClient::new()),
                token: None,
                mount: specs.mount_point.clone(),
            })
        }

        fn azure(&self, specs: &AzureSpecs) -> Result<Arc<dyn AzureClient>> {
            HttpClientFactory.azure(specs)
        }

        fn aws(&self, specs: &AwsSpecs) -> Result<AwsClients> {
            HttpClientFactory.aws(specs)
        }
    }

    #[test]
    fn create_get_and_list() {
        let vaults = Vaults::new(Arc::new(MemoryFactory));
        let specs = HashicorpSpecs::new("http://127.0.0.1:8200");
        let vault = vaults.create_hashicorp("vault-1", &specs).unwrap();
        assert_eq!(vault.kind(), VaultKind::Hashicorp);
        assert_eq!(vaults.get("vault-1").unwrap().name, "vault-1");
        assert_eq!(vaults.list(), vec!["vault-1"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let vaults = Vaults::new(Arc::new(MemoryFactory));
        let specs = HashicorpSpecs::new("http://127.0.0.1:8200");
        vaults.create_hashicorp("vault-1", &specs).unwrap();
        let err = vaults.create_hashicorp("vault-1", &specs).err().unwrap();
        assert!(err.is_already_exists());
    }

    #[test]
    fn unknown_vault_is_not_found() {
        let vaults = Vaults::new(Arc::new(MemoryFactory));
        assert!(vaults.get("missing").err().unwrap().is_not_found());
    }

    #[test]
    fn http_factory_refuses_sdk_vendors() {
        let vaults = Vaults::default();
        let specs = AwsSpecs {
            region: "eu-west-1".into(),
            access_id: None,
            secret_key: None,
            debug: false,
        };
        let err = vaults.create_aws("aws-1", &specs).err().unwrap();
        assert_eq!(err.code(), "not_supported");
        assert!(vaults.list().is_empty());
    }
}
