//! Key store that generates and signs in-process.
//!
//! The only copy of a private key is the base64 value of a secret in the
//! backing secret store. Those secrets live under a reserved id prefix, scoped
//! by the owning key store, so ordinary secret ids can never reach them. Public
//! keys are produced at create/import time; everything else about a key lives
//! in the persistence table managed by the key connector.

use crate::crypto::{self, KeyPair};
use base64::{Engine, engine::general_purpose::STANDARD};
use keymanager_spec::{
    Algorithm, Attributes, Error, Key, KeyStore, Outcome, Payload, Result, Secret, SecretStore,
    Tags,
};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Prefix of every backing secret that holds key material.
pub const KEY_SECRET_PREFIX: &str = "keymanager-key-";

/// Backing secret id of key `id` in the key store `namespace`.
///
/// The namespace length is spelled out so distinct `(namespace, id)` pairs
/// never map to the same secret.
pub fn key_secret_id(namespace: &str, id: &str) -> String {
    format!("{KEY_SECRET_PREFIX}{}-{namespace}-{id}", namespace.len())
}

pub fn is_key_secret(id: &str) -> bool {
    id.starts_with(KEY_SECRET_PREFIX)
}

pub struct LocalKeyStore {
    namespace: String,
    secrets: Arc<dyn SecretStore>,
}

impl LocalKeyStore {
    pub fn new(namespace: impl Into<String>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            namespace: namespace.into(),
            secrets,
        }
    }

    fn secret_id(&self, id: &str) -> String {
        key_secret_id(&self.namespace, id)
    }

    /// Stores `pair` unless the id already holds key material.
    ///
    /// Existing material is never overwritten: a generated key falls back to
    /// the stored one, a supplied key must match it.
    fn persist(
        &self,
        id: &str,
        pair: KeyPair,
        algorithm: &Algorithm,
        attrs: &Attributes,
        supplied: bool,
    ) -> Result<Key> {
        let secret_id = self.secret_id(id);
        let (secret, public_key) = match self.existing(&secret_id, algorithm)? {
            Some((secret, public_key)) => {
                if supplied && public_key != pair.public_key {
                    return Err(Error::already_exists(format!(
                        "key '{id}' holds different key material"
                    )));
                }
                debug!(id, "private key already stored, reusing existing secret");
                (secret, public_key)
            }
            None => {
                let encoded = Zeroizing::new(STANDARD.encode(&pair.private_key[..]));
                match self.secrets.set(&secret_id, &encoded, attrs) {
                    Ok(secret) => (secret, pair.public_key),
                    Err(err) if err.is_already_exists() => {
                        debug!(id, "private key stored concurrently, reusing existing secret");
                        self.existing(&secret_id, algorithm)?
                            .ok_or_else(|| Error::not_found(format!("key '{id}'")))?
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        Ok(Key {
            id: id.to_string(),
            public_key,
            algorithm: *algorithm,
            metadata: secret.metadata,
            tags: attrs.tags.clone(),
            annotations: Tags::new(),
        })
    }

    fn existing(&self, secret_id: &str, algorithm: &Algorithm) -> Result<Option<(Secret, Vec<u8>)>> {
        match self.secrets.get(secret_id, None) {
            Ok(secret) => {
                let pair = crypto::from_private(algorithm, &decode_private(&secret)?)?;
                Ok(Some((secret, pair.public_key)))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn decode_private(secret: &Secret) -> Result<Zeroizing<Vec<u8>>> {
    STANDARD
        .decode(secret.value.as_bytes())
        .map(Zeroizing::new)
        .map_err(|err| {
            Error::DependencyFailure(format!(
                "stored private key for '{}' is not valid base64: {err}",
                secret.id
            ))
        })
}

fn not_supported(operation: &str) -> Error {
    Error::NotSupported(format!("{operation} is not available on local key stores"))
}

impl KeyStore for LocalKeyStore {
    fn create(&self, id: &str, algorithm: &Algorithm, attrs: &Attributes) -> Result<Key> {
        let pair = crypto::generate(algorithm)?;
        self.persist(id, pair, algorithm, attrs, false)
    }

    fn import(
        &self,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attrs: &Attributes,
    ) -> Result<Key> {
        let pair = crypto::from_private(algorithm, private_key)?;
        self.persist(id, pair, algorithm, attrs, true)
    }

    fn get(&self, _id: &str) -> Result<Key> {
        Err(not_supported("get"))
    }

    fn list(&self) -> Result<Vec<String>> {
        Err(not_supported("list"))
    }

    fn update(&self, _id: &str, _attrs: &Attributes) -> Result<Key> {
        Err(not_supported("update"))
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        self.secrets.delete(&self.secret_id(id))
    }

    fn get_deleted(&self, _id: &str) -> Result<Key> {
        Err(not_supported("get deleted"))
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        Err(not_supported("list deleted"))
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        self.secrets.restore(&self.secret_id(id))
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        self.secrets.destroy(&self.secret_id(id))
    }

    fn sign(&self, id: &str, payload: Payload<'_>, algorithm: &Algorithm) -> Result<Vec<u8>> {
        let secret = self
            .secrets
            .get(&self.secret_id(id), None)
            .map_err(|err| match err {
                Error::NotFound { .. } => Error::not_found(format!("key '{id}'")),
                err => err,
            })?;
        let private_key = decode_private(&secret)?;
        crypto::sign(algorithm, &private_key, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HashicorpSecretStore, MemoryKvClient};

    /// KV store that refuses to overwrite, like vendors with create-only semantics.
    struct CreateOnly(HashicorpSecretStore);

    impl SecretStore for CreateOnly {
        fn set(&self, id: &str, value: &str, attrs: &Attributes) -> Result<Secret> {
            if self.0.get(id, None).is_ok() {
                return Err(Error::already_exists(format!("secret '{id}'")));
            }
            self.0.set(id, value, attrs)
        }
        fn get(&self, id: &str, version: Option<&str>) -> Result<Secret> {
            self.0.get(id, version)
        }
        fn list(&self) -> Result<Vec<String>> {
            self.0.list()
        }
        fn delete(&self, id: &str) -> Result<Outcome> {
            self.0.delete(id)
        }
        fn get_deleted(&self, id: &str) -> Result<Secret> {
            self.0.get_deleted(id)
        }
        fn list_deleted(&self) -> Result<Vec<String>> {
            self.0.list_deleted()
        }
        fn restore(&self, id: &str) -> Result<Outcome> {
            self.0.restore(id)
        }
        fn destroy(&self, id: &str) -> Result<Outcome> {
            self.0.destroy(id)
        }
    }

    fn kv() -> HashicorpSecretStore {
        HashicorpSecretStore::new(Arc::new(MemoryKvClient::new()), "secret")
    }

    #[test]
    fn private_key_is_stored_as_base64_secret() {
        let secrets = Arc::new(kv());
        let store = LocalKeyStore::new("keys", secrets.clone());
        let key = store
            .create("k1", &Algorithm::ethereum(), &Attributes::default())
            .unwrap();
        assert_eq!(key.public_key.len(), 65);

        let stored = secrets.get(&key_secret_id("keys", "k1"), None).unwrap();
        let private = STANDARD.decode(stored.value).unwrap();
        assert_eq!(private.len(), 32);
        assert_eq!(crate::crypto::ecdsa::public_key(&private).unwrap(), key.public_key);
        assert_eq!(key.metadata.version, stored.metadata.version);
    }

    #[test]
    fn existing_secret_is_reused_on_create() {
        let store = LocalKeyStore::new("keys", Arc::new(CreateOnly(kv())));
        let first = store
            .create("k1", &Algorithm::babyjubjub(), &Attributes::default())
            .unwrap();
        let second = store
            .create("k1", &Algorithm::babyjubjub(), &Attributes::default())
            .unwrap();
        assert_eq!(first.public_key, second.public_key);
    }

    #[test]
    fn existing_key_material_is_never_overwritten() {
        let store = LocalKeyStore::new("keys", Arc::new(kv()));
        let first = store
            .create("k1", &Algorithm::ethereum(), &Attributes::default())
            .unwrap();
        let second = store
            .create("k1", &Algorithm::ethereum(), &Attributes::default())
            .unwrap();
        assert_eq!(first.public_key, second.public_key);

        let err = store
            .import("k1", &[0x46; 32], &Algorithm::ethereum(), &Attributes::default())
            .unwrap_err();
        assert!(err.is_already_exists());
        let sig = store
            .sign("k1", Payload::Message(b"x"), &Algorithm::ethereum())
            .unwrap();
        assert!(
            crypto::verify(&first.public_key, Payload::Message(b"x"), &sig, &Algorithm::ethereum())
                .unwrap()
        );
    }

    #[test]
    fn namespaces_keep_equal_ids_apart() {
        let secrets: Arc<dyn SecretStore> = Arc::new(kv());
        let left = LocalKeyStore::new("key-a", secrets.clone());
        let right = LocalKeyStore::new("key-a-b", secrets.clone());
        let one = left
            .create("b-k", &Algorithm::ethereum(), &Attributes::default())
            .unwrap();
        let two = right
            .create("k", &Algorithm::ethereum(), &Attributes::default())
            .unwrap();
        assert_ne!(one.public_key, two.public_key);
        assert!(is_key_secret(&key_secret_id("key-a", "b-k")));
        assert_ne!(key_secret_id("key-a", "b-k"), key_secret_id("key-a-b", "k"));
        assert!(secrets.get("b-k", None).unwrap_err().is_not_found());
    }

    #[test]
    fn signatures_verify_against_created_key() {
        let store = LocalKeyStore::new("keys", Arc::new(kv()));
        for (id, algorithm) in [
            ("ecdsa", Algorithm::ethereum()),
            ("bjj", Algorithm::babyjubjub()),
            ("ed", Algorithm::x25519()),
        ] {
            let key = store.create(id, &algorithm, &Attributes::default()).unwrap();
            let sig = store.sign(id, Payload::Message(b""), &algorithm).unwrap();
            assert!(crypto::verify(&key.public_key, Payload::Message(b""), &sig, &algorithm).unwrap());
        }
    }

    #[test]
    fn deleted_keys_cannot_sign() {
        let store = LocalKeyStore::new("keys", Arc::new(kv()));
        store
            .create("k1", &Algorithm::ethereum(), &Attributes::default())
            .unwrap();
        assert_eq!(store.delete("k1").unwrap(), Outcome::Applied);
        let err = store
            .sign("k1", Payload::Message(b"x"), &Algorithm::ethereum())
            .unwrap_err();
        assert!(err.is_not_found());
        store.restore("k1").unwrap();
        assert!(
            store
                .sign("k1", Payload::Message(b"x"), &Algorithm::ethereum())
                .is_ok()
        );
    }

    #[test]
    fn identity_reads_are_not_supported() {
        let store = LocalKeyStore::new("keys", Arc::new(kv()));
        assert_eq!(store.get("k1").unwrap_err().code(), "not_supported");
        assert_eq!(store.list().unwrap_err().code(), "not_supported");
        assert_eq!(
            store.update("k1", &Attributes::default()).unwrap_err().code(),
            "not_supported"
        );
    }

    #[test]
    fn corrupt_secret_is_a_dependency_failure() {
        let secrets = Arc::new(kv());
        secrets
            .set(&key_secret_id("keys", "k1"), "not base64!", &Attributes::default())
            .unwrap();
        let store = LocalKeyStore::new("keys", secrets);
        let err = store
            .sign("k1", Payload::Message(b"x"), &Algorithm::ethereum())
            .unwrap_err();
        assert_eq!(err.code(), "dependency_failure");
    }
}
