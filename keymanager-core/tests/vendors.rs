use keymanager_conformance::fakes::{FakeAzureClient, FakeKms, FakeSecretsManager};
use keymanager_conformance::{Capabilities, KeyLifecycleSuite, SecretLifecycleSuite, tagged};
use keymanager_core::backend::aws::{ARN_ANNOTATION, KEY_ID_ANNOTATION};
use keymanager_core::ethereum::address_from_public_key;
use keymanager_core::spec::vendor::{AzureClient, KmsClient};
use keymanager_core::spec::{
    Algorithm, Attributes, EthStore, KeyStore, Payload, SecretStore, UserInfo, VaultKind,
};
use keymanager_core::{
    AwsClients, AwsKeyStore, AwsSecretStore, AwsSpecs, AzureKeyStore, AzureSecretStore,
    AzureSpecs, ClientFactory, Connector, EthereumSpecs, HashicorpHandle, HashicorpSpecs,
    KeyStoreSpecs, MemoryKvClient,
};
use keymanager_core::spec::Result;
use std::sync::Arc;

#[derive(Default)]
struct FakeFactory {
    azure: Arc<FakeAzureClient>,
    kms: Arc<FakeKms>,
    secrets: Arc<FakeSecretsManager>,
}

impl ClientFactory for FakeFactory {
    fn hashicorp(&self, specs: &HashicorpSpecs) -> Result<HashicorpHandle> {
        Ok(HashicorpHandle {
            kv: Arc::new(MemoryKvClient::new()),
            token: None,
            mount: specs.mount_point.clone(),
        })
    }

    fn azure(&self, _specs: &AzureSpecs) -> Result<Arc<dyn AzureClient>> {
        Ok(self.azure.clone())
    }

    fn aws(&self, _specs: &AwsSpecs) -> Result<AwsClients> {
        Ok(AwsClients {
            kms: self.kms.clone(),
            secrets: self.secrets.clone(),
        })
    }
}

fn azure_specs() -> AzureSpecs {
    AzureSpecs {
        vault_name: "kv-test".into(),
        tenant_id: "tenant".into(),
        client_id: "client".into(),
        client_secret: "secret".into(),
    }
}

fn aws_specs() -> AwsSpecs {
    AwsSpecs {
        region: "us-east-1".into(),
        access_id: None,
        secret_key: None,
        debug: false,
    }
}

fn admin() -> UserInfo {
    UserInfo::admin("tenant-a")
}

fn connector(factory: Arc<FakeFactory>) -> Connector {
    let connector = Connector::builder().client_factory(factory).build();
    connector.vaults().create_azure("azure", &azure_specs()).unwrap();
    connector.vaults().create_aws("aws", &aws_specs()).unwrap();
    connector
}

#[test]
fn vault_registry_builds_clients_through_factory() {
    let connector = connector(Arc::default());
    assert_eq!(connector.vaults().get("azure").unwrap().kind(), VaultKind::Azure);
    assert_eq!(connector.vaults().get("aws").unwrap().kind(), VaultKind::Aws);
    let err = connector
        .vaults()
        .create_aws("aws", &aws_specs())
        .err()
        .unwrap();
    assert_eq!(err.code(), "already_exists");
    assert_eq!(connector.vaults().list(), vec!["aws".to_string(), "azure".to_string()]);
}

#[test]
fn azure_stores_pass_lifecycle_suites() {
    let client = Arc::new(FakeAzureClient::new());
    let caps = Capabilities::default()
        .with_read()
        .with_restore()
        .with_destroy();

    let keys = AzureKeyStore::new(client.clone());
    KeyLifecycleSuite::new("azure-keys", &keys, caps).run().unwrap();

    let secrets = AzureSecretStore::new(client);
    SecretLifecycleSuite::new("azure-secrets", &secrets, caps)
        .run()
        .unwrap();
}

#[test]
fn aws_stores_pass_lifecycle_suites() {
    let keys = AwsKeyStore::new(Arc::new(FakeKms::new()));
    KeyLifecycleSuite::new("aws-keys", &keys, Capabilities::default().with_read())
        .run()
        .unwrap();

    let secrets = AwsSecretStore::new(Arc::new(FakeSecretsManager::new()));
    let caps = Capabilities::default().with_read().with_restore().with_destroy();
    SecretLifecycleSuite::new("aws-secrets", &secrets, caps)
        .run()
        .unwrap();
}

#[test]
fn vendor_connectors_pass_lifecycle_suites() {
    let connector = connector(Arc::default());
    let user = admin();
    connector
        .create_key("azure-keys", &KeyStoreSpecs::vault("azure"), vec![], &user)
        .unwrap();
    connector
        .create_key("aws-keys", &KeyStoreSpecs::vault("aws"), vec![], &user)
        .unwrap();
    connector.create_secret("azure-secrets", "azure", vec![], &user).unwrap();
    connector.create_secret("aws-secrets", "aws", vec![], &user).unwrap();

    let keys = connector.get_key_store("azure-keys", &user).unwrap();
    KeyLifecycleSuite::new("azure-keys", &keys, Capabilities::full())
        .run()
        .unwrap();

    // A restored record cannot cancel the scheduled KMS deletion, so a second delete conflicts.
    let keys = connector.get_key_store("aws-keys", &user).unwrap();
    let caps = Capabilities {
        restore: false,
        ..Capabilities::full()
    };
    KeyLifecycleSuite::new("aws-keys", &keys, caps).run().unwrap();

    for name in ["azure-secrets", "aws-secrets"] {
        let secrets = connector.get_secret_store(name, &user).unwrap();
        SecretLifecycleSuite::new(name, &secrets, Capabilities::full())
            .run()
            .unwrap();
    }
}

#[test]
fn aws_keys_carry_annotations_and_verify_remotely() {
    let store = AwsKeyStore::new(Arc::new(FakeKms::new()));
    let key = store
        .create("signer", &Algorithm::ethereum(), &Attributes::default())
        .unwrap();
    assert!(key.annotations.contains_key(KEY_ID_ANNOTATION));
    assert!(key.annotations.contains_key(ARN_ANNOTATION));

    let signature = store
        .sign("signer", Payload::Message(b"payload"), &Algorithm::ethereum())
        .unwrap();
    assert_eq!(signature.len(), 64);
    assert!(store.verify("signer", Payload::Message(b"payload"), &signature).unwrap());
    assert!(!store.verify("signer", Payload::Message(b"other"), &signature).unwrap());

    let err = store
        .create("bjj", &Algorithm::babyjubjub(), &Attributes::default())
        .unwrap_err();
    assert_eq!(err.code(), "not_supported");
    let err = store
        .import("imported", &[1; 32], &Algorithm::ethereum(), &Attributes::default())
        .unwrap_err();
    assert_eq!(err.code(), "not_supported");
}

#[test]
fn azure_import_keeps_supplied_key() {
    let store = AzureKeyStore::new(Arc::new(FakeAzureClient::new()));
    let key = store
        .import("imported", &[0x46; 32], &Algorithm::ethereum(), &Attributes::default())
        .unwrap();
    let address = address_from_public_key(&key.public_key).unwrap();
    assert_eq!(address.to_hex(), "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f");
}

#[test]
fn import_reconciles_vendor_keys_and_secrets() {
    let factory = Arc::new(FakeFactory::default());
    let connector = connector(factory.clone());
    let user = admin();
    connector
        .create_key("azure-keys", &KeyStoreSpecs::vault("azure"), vec![], &user)
        .unwrap();
    connector.create_secret("aws-secrets", "aws", vec![], &user).unwrap();

    let raw_keys = AzureKeyStore::new(factory.azure.clone());
    raw_keys
        .create("outside-1", &Algorithm::ethereum(), &tagged(&[("origin", "portal")]))
        .unwrap();
    let keys = connector.get_key_store("azure-keys", &user).unwrap();
    keys.create("managed", &Algorithm::ethereum(), &Attributes::default())
        .unwrap();

    let report = connector.import_keys("azure-keys", &user).unwrap();
    assert_eq!(report.imported, vec!["outside-1".to_string()]);
    assert!(report.failed.is_empty());
    let imported = keys.get("outside-1").unwrap();
    assert_eq!(imported.tags.get("origin").map(String::as_str), Some("portal"));

    let report = connector.import_keys("azure-keys", &user).unwrap();
    assert!(report.imported.is_empty());

    let raw_secrets = AwsSecretStore::new(factory.secrets.clone());
    raw_secrets
        .set("outside-secret", "value", &Attributes::default())
        .unwrap();
    let report = connector.import_secrets("aws-secrets", &user).unwrap();
    assert_eq!(report.imported, vec!["outside-secret".to_string()]);
    let secrets = connector.get_secret_store("aws-secrets", &user).unwrap();
    assert_eq!(secrets.get("outside-secret", None).unwrap().value, "value");
}

#[test]
fn import_registers_accounts_for_vendor_keys() {
    let factory = Arc::new(FakeFactory::default());
    let connector = connector(factory.clone());
    let user = admin();
    connector
        .create_ethereum("accounts", &EthereumSpecs::Vault("aws".into()), vec![], &user)
        .unwrap();

    factory
        .kms
        .create_key("outside", "ECC_SECG_P256K1", &Default::default())
        .unwrap();
    let report = connector.import_ethereum("accounts", &user).unwrap();
    assert_eq!(report.imported, vec!["outside".to_string()]);

    let accounts = connector.get_eth_store("accounts", &user).unwrap();
    let listed = accounts.list().unwrap();
    assert_eq!(listed.len(), 1);
    let account = accounts.get(&listed[0]).unwrap();
    assert_eq!(account.key_id, "outside");
    let signature = accounts.sign(&account.address, b"data").unwrap();
    assert_eq!(signature.len(), 65);

    let err = connector
        .import_ethereum("accounts", &UserInfo::new("tenant-a", ["read:ethereum"]))
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");
}
