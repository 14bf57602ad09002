//! Vault and store registries, the local key store, the Ethereum account
//! projection and the vendor adapters behind them.

pub mod backend;
pub mod config;
pub mod connector;
pub mod crypto;
pub mod ethereum;
pub mod local;
pub mod persistence;
pub mod policy;
pub mod telemetry;
pub mod vaults;

pub use backend::{
    AwsKeyStore, AwsSecretStore, AzureKeyStore, AzureSecretStore, HashicorpSecretStore,
    MemoryKvClient,
};
#[cfg(feature = "hashicorp-http")]
pub use backend::HashicorpClient;
pub use config::{AwsSpecs, AzureSpecs, EthereumSpecs, HashicorpSpecs, KeyStoreSpecs};
pub use connector::{
    Connector, ConnectorBuilder, EthConnector, ImportReport, KeyConnector, SecretConnector,
    StoreBacking,
};
pub use ethereum::EthereumStore;
pub use local::LocalKeyStore;
pub use persistence::{Database, MemoryLifecycle};
pub use policy::Resolver;
pub use vaults::{
    AwsClients, ClientFactory, HashicorpHandle, HttpClientFactory, Vault, VaultClient, Vaults,
};

pub use keymanager_spec as spec;
