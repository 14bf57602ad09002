//! Store registry and the authorizing, logging connectors it hands out.
//!
//! Stores are registered per category under a unique name with the tenants
//! allowed to reach them. Lookups check tenant access once and return a
//! connector bound to the caller; each connector call then checks the
//! matching `action:resource` permission before touching the backing store.

mod ethereum;
mod keys;
mod secrets;

pub use ethereum::EthConnector;
pub use keys::KeyConnector;
pub use secrets::SecretConnector;

use crate::backend::{
    AwsKeyStore, AwsSecretStore, AzureKeyStore, AzureSecretStore, HashicorpSecretStore,
};
use crate::config::{EthereumSpecs, KeyStoreSpecs};
use crate::ethereum::EthereumStore;
use crate::local::LocalKeyStore;
use crate::persistence::Database;
use crate::policy::Resolver;
use crate::telemetry::store_span;
use crate::vaults::{ClientFactory, VaultClient, Vaults};
use keymanager_spec::auth::{Action, Operation, Resource};
use keymanager_spec::{
    Address, Error, EthStore, KeyStore, Result, ResultExt, SecretStore, StoreCategory, UserInfo,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of reconciling a vendor store with persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Clone)]
pub enum StoreBacking {
    Secret(Arc<dyn SecretStore>),
    Key(Arc<dyn KeyStore>),
    Ethereum(Arc<EthereumStore>),
}

impl StoreBacking {
    pub fn category(&self) -> StoreCategory {
        match self {
            Self::Secret(_) => StoreCategory::Secret,
            Self::Key(_) => StoreCategory::Key,
            Self::Ethereum(_) => StoreCategory::Ethereum,
        }
    }
}

#[derive(Clone)]
struct StoreEntry {
    allowed_tenants: Vec<String>,
    backing: StoreBacking,
}

/// Permission check plus structured logging around one connector call.
#[derive(Clone)]
pub(crate) struct Gate {
    category: StoreCategory,
    store: String,
    resolver: Arc<Resolver>,
}

impl Gate {
    fn new(category: StoreCategory, store: &str, resolver: Arc<Resolver>) -> Self {
        Self {
            category,
            store: store.to_string(),
            resolver,
        }
    }

    pub(crate) fn store(&self) -> &str {
        &self.store
    }

    pub(crate) fn run<T>(
        &self,
        action: Action,
        operation: &str,
        id: &str,
        work: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let category = self.category.to_string();
        let span = store_span(&category, &self.store, operation);
        let _guard = span.enter();

        let required = Operation::new(action, Resource::from(self.category));
        if let Err(err) = self.resolver.check(&[required]) {
            warn!(tenant = %self.resolver.tenant(), id, error = %err, "permission denied");
            return Err(err);
        }

        debug!(id, "starting");
        let res = work();
        match &res {
            Ok(_) => info!(id, "completed"),
            Err(err) => warn!(id, error = %err, kind = err.code(), "failed"),
        }
        res.context_with(|| format!("{category} store '{}'", self.store))
    }
}

/// Builder for [`Connector`]. Defaults to the HTTP client factory and in-memory persistence.
#[derive(Default)]
pub struct ConnectorBuilder {
    factory: Option<Arc<dyn ClientFactory>>,
    vaults: Option<Arc<Vaults>>,
    db: Option<Database>,
}

impl ConnectorBuilder {
    /// Factory used to build vendor clients for new vaults.
    pub fn client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Share an existing vault registry; takes precedence over `client_factory`.
    pub fn vaults(mut self, vaults: Arc<Vaults>) -> Self {
        self.vaults = Some(vaults);
        self
    }

    pub fn database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn build(self) -> Connector {
        let vaults = match (self.vaults, self.factory) {
            (Some(vaults), _) => vaults,
            (None, Some(factory)) => Arc::new(Vaults::new(factory)),
            (None, None) => Arc::new(Vaults::default()),
        };
        Connector::new(vaults, self.db.unwrap_or_default())
    }
}

pub struct Connector {
    vaults: Arc<Vaults>,
    stores: RwLock<HashMap<(StoreCategory, String), StoreEntry>>,
    db: Database,
}

impl Connector {
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::default()
    }

    pub fn new(vaults: Arc<Vaults>, db: Database) -> Self {
        Self {
            vaults,
            stores: RwLock::new(HashMap::new()),
            db,
        }
    }

    pub fn vaults(&self) -> &Arc<Vaults> {
        &self.vaults
    }

    pub fn create_secret(
        &self,
        name: &str,
        vault: &str,
        allowed_tenants: Vec<String>,
        user: &UserInfo,
    ) -> Result<()> {
        self.ensure_free(StoreCategory::Secret, name)?;
        let vault = self.vaults.get(vault)?;
        let store: Arc<dyn SecretStore> = match &vault.client {
            VaultClient::Hashicorp(handle) => Arc::new(HashicorpSecretStore::new(
                handle.kv.clone(),
                handle.mount.clone(),
            )),
            VaultClient::Azure(client) => Arc::new(AzureSecretStore::new(client.clone())),
            VaultClient::Aws(clients) => Arc::new(AwsSecretStore::new(clients.secrets.clone())),
        };
        self.register(name, allowed_tenants, StoreBacking::Secret(store), user)
    }

    /// Exactly one of `specs.vault` and `specs.secret_store` must be set.
    pub fn create_key(
        &self,
        name: &str,
        specs: &KeyStoreSpecs,
        allowed_tenants: Vec<String>,
        user: &UserInfo,
    ) -> Result<()> {
        self.ensure_free(StoreCategory::Key, name)?;
        let store: Arc<dyn KeyStore> = match (&specs.vault, &specs.secret_store) {
            (Some(vault), None) => self.vendor_key_store(vault)?,
            (None, Some(secret_store)) => {
                self.local_keys(StoreCategory::Key, name, secret_store, user)?
            }
            _ => {
                return Err(Error::InvalidParameter(
                    "key store needs exactly one of vault or secret_store".into(),
                ));
            }
        };
        self.register(name, allowed_tenants, StoreBacking::Key(store), user)
    }

    pub fn create_ethereum(
        &self,
        name: &str,
        specs: &EthereumSpecs,
        allowed_tenants: Vec<String>,
        user: &UserInfo,
    ) -> Result<()> {
        self.ensure_free(StoreCategory::Ethereum, name)?;
        let keys: Arc<dyn KeyStore> = match specs {
            EthereumSpecs::KeyStore(key_store) => self.key_backing(key_store, user)?,
            EthereumSpecs::Vault(vault) => self.vendor_key_store(vault)?,
            EthereumSpecs::SecretStore(secret_store) => {
                self.local_keys(StoreCategory::Ethereum, name, secret_store, user)?
            }
        };
        let store = EthereumStore::new(name, keys, self.db.accounts.clone());
        self.register(
            name,
            allowed_tenants,
            StoreBacking::Ethereum(Arc::new(store)),
            user,
        )
    }

    pub fn get_secret_store(&self, name: &str, user: &UserInfo) -> Result<SecretConnector> {
        let (resolver, backing) = self.lookup(StoreCategory::Secret, name, user)?;
        let StoreBacking::Secret(store) = backing else {
            return Err(category_mismatch(StoreCategory::Secret, name));
        };
        let gate = Gate::new(StoreCategory::Secret, name, resolver);
        Ok(SecretConnector::new(gate, store, self.db.secrets.clone()))
    }

    pub fn get_key_store(&self, name: &str, user: &UserInfo) -> Result<KeyConnector> {
        let (resolver, backing) = self.lookup(StoreCategory::Key, name, user)?;
        let StoreBacking::Key(store) = backing else {
            return Err(category_mismatch(StoreCategory::Key, name));
        };
        let gate = Gate::new(StoreCategory::Key, name, resolver);
        Ok(KeyConnector::new(gate, store, self.db.keys.clone()))
    }

    pub fn get_eth_store(&self, name: &str, user: &UserInfo) -> Result<EthConnector> {
        let (resolver, backing) = self.lookup(StoreCategory::Ethereum, name, user)?;
        let StoreBacking::Ethereum(store) = backing else {
            return Err(category_mismatch(StoreCategory::Ethereum, name));
        };
        let gate = Gate::new(StoreCategory::Ethereum, name, resolver);
        Ok(EthConnector::new(gate, store))
    }

    /// Names of the stores in `category` the caller's tenant may access, sorted.
    pub fn list(&self, category: StoreCategory, user: &UserInfo) -> Vec<String> {
        let resolver = Resolver::new(user);
        let mut names: Vec<String> = self
            .stores
            .read()
            .iter()
            .filter(|((entry_category, _), entry)| {
                *entry_category == category && resolver.can_access(&entry.allowed_tenants)
            })
            .map(|((_, name), _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// First visible ethereum store holding `address`.
    pub fn ethereum_by_addr(&self, address: &Address, user: &UserInfo) -> Result<EthConnector> {
        Resolver::new(user).check(&[Operation::new(Action::Read, Resource::Ethereum)])?;
        for name in self.list(StoreCategory::Ethereum, user) {
            let connector = self.get_eth_store(&name, user)?;
            if connector.get(address).found()?.is_some() {
                return Ok(connector);
            }
        }
        Err(Error::not_found(format!("account {address}")))
    }

    pub fn import_secrets(&self, store: &str, user: &UserInfo) -> Result<ImportReport> {
        self.get_secret_store(store, user)?.reconcile()
    }

    pub fn import_keys(&self, store: &str, user: &UserInfo) -> Result<ImportReport> {
        self.get_key_store(store, user)?.reconcile()
    }

    pub fn import_ethereum(&self, store: &str, user: &UserInfo) -> Result<ImportReport> {
        self.get_eth_store(store, user)?.reconcile()
    }

    fn vendor_key_store(&self, vault: &str) -> Result<Arc<dyn KeyStore>> {
        let vault = self.vaults.get(vault)?;
        match &vault.client {
            VaultClient::Hashicorp(_) => Err(Error::NotSupported(format!(
                "hashicorp vault '{}' cannot hold keys, use a secret store",
                vault.name
            ))),
            VaultClient::Azure(client) => Ok(Arc::new(AzureKeyStore::new(client.clone()))),
            VaultClient::Aws(clients) => Ok(Arc::new(AwsKeyStore::new(clients.kms.clone()))),
        }
    }

    /// Local key store over a registered secret store, namespaced by the owning store.
    fn local_keys(
        &self,
        category: StoreCategory,
        name: &str,
        secret_store: &str,
        user: &UserInfo,
    ) -> Result<Arc<dyn KeyStore>> {
        let secrets = self.secret_backing(secret_store, user)?;
        Ok(Arc::new(LocalKeyStore::new(format!("{category}-{name}"), secrets)))
    }

    fn secret_backing(&self, name: &str, user: &UserInfo) -> Result<Arc<dyn SecretStore>> {
        match self.lookup(StoreCategory::Secret, name, user)?.1 {
            StoreBacking::Secret(store) => Ok(store),
            _ => Err(category_mismatch(StoreCategory::Secret, name)),
        }
    }

    fn key_backing(&self, name: &str, user: &UserInfo) -> Result<Arc<dyn KeyStore>> {
        match self.lookup(StoreCategory::Key, name, user)?.1 {
            StoreBacking::Key(store) => Ok(store),
            _ => Err(category_mismatch(StoreCategory::Key, name)),
        }
    }

    fn lookup(
        &self,
        category: StoreCategory,
        name: &str,
        user: &UserInfo,
    ) -> Result<(Arc<Resolver>, StoreBacking)> {
        let entry = self
            .stores
            .read()
            .get(&(category, name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{category} store '{name}'")))?;
        let resolver = Resolver::new(user);
        if let Err(err) = resolver.check_access(&entry.allowed_tenants) {
            warn!(store = name, category = %category, tenant = %user.tenant, "store access denied");
            return Err(err.with_context(format!("{category} store '{name}'")));
        }
        Ok((Arc::new(resolver), entry.backing))
    }

    fn ensure_free(&self, category: StoreCategory, name: &str) -> Result<()> {
        if self
            .stores
            .read()
            .contains_key(&(category, name.to_string()))
        {
            return Err(Error::already_exists(format!("{category} store '{name}'")));
        }
        Ok(())
    }

    fn register(
        &self,
        name: &str,
        allowed_tenants: Vec<String>,
        backing: StoreBacking,
        user: &UserInfo,
    ) -> Result<()> {
        let category = backing.category();
        match self.stores.write().entry((category, name.to_string())) {
            Entry::Occupied(_) => {
                return Err(Error::already_exists(format!("{category} store '{name}'")));
            }
            Entry::Vacant(slot) => {
                slot.insert(StoreEntry {
                    allowed_tenants: allowed_tenants.clone(),
                    backing,
                });
            }
        }
        info!(
            store = name,
            category = %category,
            tenant = %user.tenant,
            allowed_tenants = ?allowed_tenants,
            "registered store"
        );
        Ok(())
    }
}

fn category_mismatch(category: StoreCategory, name: &str) -> Error {
    Error::DependencyFailure(format!("store '{name}' is not a {category} store"))
}
