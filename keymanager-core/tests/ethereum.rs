use keymanager_core::ethereum::transaction::{encode_signed, signing_hash};
use keymanager_core::ethereum::{address_from_public_key, ecrecover};
use keymanager_core::spec::{Address, Attributes, EthStore, Transaction, UserInfo};
use keymanager_core::{Connector, EthereumSpecs, HashicorpHandle, KeyStoreSpecs, MemoryKvClient, VaultClient};
use std::sync::Arc;

fn connector() -> Connector {
    let connector = Connector::builder().build();
    connector
        .vaults()
        .register(
            "hashicorp",
            VaultClient::Hashicorp(HashicorpHandle {
                kv: Arc::new(MemoryKvClient::new()),
                token: None,
                mount: "secret".into(),
            }),
        )
        .unwrap();
    let user = admin();
    connector
        .create_secret("vault-1", "hashicorp", vec![], &user)
        .unwrap();
    connector
        .create_ethereum(
            "accounts",
            &EthereumSpecs::SecretStore("vault-1".into()),
            vec!["tenant-a".into()],
            &user,
        )
        .unwrap();
    connector
}

fn admin() -> UserInfo {
    UserInfo::admin("tenant-a")
}

#[test]
fn address_is_stable_and_derived_from_public_key() {
    let connector = connector();
    let accounts = connector.get_eth_store("accounts", &admin()).unwrap();

    let created = accounts.create("acc-1", &Attributes::default()).unwrap();
    let first = accounts.get(&created.address).unwrap();
    let second = accounts.get(&created.address).unwrap();

    assert_eq!(first.address, created.address);
    assert_eq!(second.address, created.address);
    assert_eq!(
        address_from_public_key(&created.public_key).unwrap(),
        created.address
    );
    assert_eq!(created.public_key.len(), 65);
    assert_eq!(created.compressed_public_key.len(), 33);
    assert_eq!(created.key_id, "acc-1");
}

#[test]
fn imported_key_signs_eip155_transaction() {
    let connector = connector();
    let accounts = connector.get_eth_store("accounts", &admin()).unwrap();
    let account = accounts
        .import("eip155", &[0x46; 32], &Attributes::default())
        .unwrap();
    let expected: Address = "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F".parse().unwrap();
    assert_eq!(account.address, expected);

    let tx = Transaction {
        nonce: 9,
        gas_price: 20_000_000_000,
        gas_limit: 21_000,
        to: Some(Address::from_slice(&[0x35; 20]).unwrap()),
        value: 1_000_000_000_000_000_000,
        data: Vec::new(),
    };
    let signature = accounts
        .sign_transaction(&account.address, Some(1), &tx)
        .unwrap();
    assert_eq!(signature.len(), 65);
    assert_eq!(
        ecrecover(&signing_hash(&tx, Some(1)), &signature).unwrap(),
        account.address
    );

    let raw = encode_signed(&tx, Some(1), &signature).unwrap();
    assert_eq!(
        hex::encode(raw),
        "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
    );
}

#[test]
fn message_signatures_recover_to_account() {
    let connector = connector();
    let accounts = connector.get_eth_store("accounts", &admin()).unwrap();
    let account = accounts.create("acc-1", &Attributes::default()).unwrap();

    let signature = accounts
        .sign_message(&account.address, b"Hello World")
        .unwrap();
    let hash = keymanager_core::ethereum::transaction::message_hash(b"Hello World");
    assert_eq!(ecrecover(&hash, &signature).unwrap(), account.address);
}

#[test]
fn lookup_by_address_spans_visible_stores() {
    let connector = connector();
    let user = admin();
    connector
        .create_key("keys", &KeyStoreSpecs::secret_store("vault-1"), vec![], &user)
        .unwrap();
    connector
        .create_ethereum(
            "shared",
            &EthereumSpecs::KeyStore("keys".into()),
            vec![],
            &user,
        )
        .unwrap();

    let private = connector
        .get_eth_store("accounts", &user)
        .unwrap()
        .create("private-acc", &Attributes::default())
        .unwrap();
    let shared = connector
        .get_eth_store("shared", &user)
        .unwrap()
        .create("shared-acc", &Attributes::default())
        .unwrap();

    let found = connector.ethereum_by_addr(&private.address, &user).unwrap();
    assert_eq!(found.name(), "accounts");
    let found = connector.ethereum_by_addr(&shared.address, &user).unwrap();
    assert_eq!(found.name(), "shared");

    // Another tenant only sees the public store.
    let outsider = UserInfo::admin("tenant-b");
    let err = connector
        .ethereum_by_addr(&private.address, &outsider)
        .err()
        .unwrap();
    assert_eq!(err.code(), "not_found");
    assert!(connector.ethereum_by_addr(&shared.address, &outsider).is_ok());

    let reader = UserInfo::new("tenant-a", ["read:keys"]);
    let err = connector
        .ethereum_by_addr(&shared.address, &reader)
        .err()
        .unwrap();
    assert_eq!(err.code(), "forbidden");
}

#[test]
fn account_lifecycle_cascades_to_key() {
    let connector = connector();
    let accounts = connector.get_eth_store("accounts", &admin()).unwrap();
    let account = accounts.create("acc-1", &Attributes::default()).unwrap();

    let err = accounts.destroy(&account.address).unwrap_err();
    assert_eq!(err.code(), "status_conflict");

    accounts.delete(&account.address).unwrap();
    assert!(accounts.list().unwrap().is_empty());
    assert_eq!(accounts.list_deleted().unwrap(), vec![account.address]);
    let err = accounts.sign(&account.address, b"data").unwrap_err();
    assert_eq!(err.code(), "not_found");

    accounts.restore(&account.address).unwrap();
    assert!(accounts.sign(&account.address, b"data").is_ok());

    accounts.delete(&account.address).unwrap();
    accounts.destroy(&account.address).unwrap();
    assert_eq!(
        accounts.get_deleted(&account.address).unwrap_err().code(),
        "not_found"
    );
    // The key id is free again once the account is gone.
    assert!(accounts.create("acc-1", &Attributes::default()).is_ok());
}

#[test]
fn signing_requires_sign_permission() {
    let connector = connector();
    let account = connector
        .get_eth_store("accounts", &admin())
        .unwrap()
        .create("acc-1", &Attributes::default())
        .unwrap();

    let reader = UserInfo::new("tenant-a", ["read:ethereum"]);
    let accounts = connector.get_eth_store("accounts", &reader).unwrap();
    assert!(accounts.get(&account.address).is_ok());
    let err = accounts.sign(&account.address, b"data").unwrap_err();
    assert_eq!(err.code(), "forbidden");
}

#[test]
fn duplicate_account_id_keeps_first_account_signing() {
    let connector = connector();
    let accounts = connector.get_eth_store("accounts", &admin()).unwrap();
    let account = accounts.create("acc-1", &Attributes::default()).unwrap();

    let err = accounts.create("acc-1", &Attributes::default()).unwrap_err();
    assert_eq!(err.code(), "already_exists");
    assert_eq!(accounts.list().unwrap(), vec![account.address]);

    let signature = accounts
        .sign_message(&account.address, b"still mine")
        .unwrap();
    let hash = keymanager_core::ethereum::transaction::message_hash(b"still mine");
    assert_eq!(ecrecover(&hash, &signature).unwrap(), account.address);
}

#[test]
fn same_private_key_cannot_back_two_accounts() {
    let connector = connector();
    let accounts = connector.get_eth_store("accounts", &admin()).unwrap();
    let account = accounts
        .import("acc-1", &[0x46; 32], &Attributes::default())
        .unwrap();

    let err = accounts
        .import("acc-2", &[0x46; 32], &Attributes::default())
        .unwrap_err();
    assert_eq!(err.code(), "already_exists");
    assert_eq!(accounts.list().unwrap(), vec![account.address]);
    assert!(accounts.list_deleted().unwrap().is_empty());

    // The second id is free again once its key was discarded.
    let other = accounts
        .import("acc-2", &[0x47; 32], &Attributes::default())
        .unwrap();
    assert_ne!(other.address, account.address);
}
