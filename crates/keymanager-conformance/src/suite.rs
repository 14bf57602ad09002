use crate::{
    Capabilities, TestEnv, assert_kind, assert_listed, assert_not_listed,
    assert_secp256k1_signature, secret_value, sign_payloads, tagged,
};
use anyhow::{Context, Result, bail};
use keymanager_spec::{Algorithm, Attributes, KeyStore, Payload, SecretStore};

/// Runs the key lifecycle suite against a key store.
///
/// Keys are created as `ecdsa+secp256k1`, the one algorithm every backend offers.
pub struct KeyLifecycleSuite<'a> {
    store_name: String,
    store: &'a dyn KeyStore,
    caps: Capabilities,
    env: TestEnv,
}

impl<'a> KeyLifecycleSuite<'a> {
    pub fn new(store_name: impl Into<String>, store: &'a dyn KeyStore, caps: Capabilities) -> Self {
        let store_name = store_name.into();
        Self {
            env: TestEnv::from_env(&store_name),
            store_name,
            store,
            caps,
        }
    }

    pub fn run(&self) -> Result<()> {
        let name = &self.store_name;
        let id = self.env.prefix.id("key");
        let algorithm = Algorithm::ethereum();

        let key = self
            .store
            .create(&id, &algorithm, &tagged(&[("suite", "keys")]))
            .with_context(|| format!("create failed for {name}:{id}"))?;
        if key.metadata.deleted_at.is_some() {
            bail!("fresh key {name}:{id} is marked deleted");
        }
        if !matches!(key.public_key.len(), 64 | 65) {
            bail!("unexpected public key length {} for {name}:{id}", key.public_key.len());
        }

        if self.caps.read {
            let fetched = self
                .store
                .get(&id)
                .with_context(|| format!("get failed for {name}:{id}"))?;
            if fetched.public_key != key.public_key {
                bail!("public key changed between create and get for {name}:{id}");
            }
            let ids = self.store.list().with_context(|| format!("list failed for {name}"))?;
            assert_listed(&ids, &id, "list")?;
        }

        for payload in sign_payloads() {
            let signature = self
                .store
                .sign(&id, Payload::Message(&payload), &algorithm)
                .with_context(|| format!("sign failed for {name}:{id}"))?;
            assert_secp256k1_signature(&key.public_key, &payload, &signature)
                .with_context(|| format!("{name}:{id}"))?;
        }

        if self.caps.strict_destroy {
            assert_kind(self.store.destroy(&id), "status_conflict", "destroy of active key")?;
        }

        self.store
            .delete(&id)
            .with_context(|| format!("delete failed for {name}:{id}"))?;

        if self.caps.read {
            assert_kind(self.store.get(&id), "not_found", "get of deleted key")?;
            let ids = self.store.list().with_context(|| format!("list failed for {name}"))?;
            assert_not_listed(&ids, &id, "list")?;
            let deleted = self
                .store
                .list_deleted()
                .with_context(|| format!("list deleted failed for {name}"))?;
            assert_listed(&deleted, &id, "list deleted")?;
        }

        if self.caps.restore {
            self.store
                .restore(&id)
                .with_context(|| format!("restore failed for {name}:{id}"))?;
            if self.caps.read {
                let restored = self.store.get(&id)?;
                if restored.public_key != key.public_key {
                    bail!("public key changed across restore for {name}:{id}");
                }
            }
            self.store.delete(&id)?;
        }

        if self.caps.destroy && self.env.cleanup {
            self.store
                .destroy(&id)
                .with_context(|| format!("destroy failed for {name}:{id}"))?;
            if self.caps.read {
                assert_kind(self.store.get_deleted(&id), "not_found", "get of destroyed key")?;
            }
        }

        Ok(())
    }
}

/// Runs the secret lifecycle suite against a secret store.
pub struct SecretLifecycleSuite<'a> {
    store_name: String,
    store: &'a dyn SecretStore,
    caps: Capabilities,
    env: TestEnv,
}

impl<'a> SecretLifecycleSuite<'a> {
    pub fn new(
        store_name: impl Into<String>,
        store: &'a dyn SecretStore,
        caps: Capabilities,
    ) -> Self {
        let store_name = store_name.into();
        Self {
            env: TestEnv::from_env(&store_name),
            store_name,
            store,
            caps,
        }
    }

    pub fn run(&self) -> Result<()> {
        let name = &self.store_name;
        let id = self.env.prefix.id("secret");
        let initial = secret_value();
        let updated = secret_value();

        let first = self
            .store
            .set(&id, &initial, &tagged(&[("suite", "secrets")]))
            .with_context(|| format!("set failed for {name}:{id}"))?;
        self.assert_value(&id, None, &initial)?;

        let second = self
            .store
            .set(&id, &updated, &Attributes::default())
            .with_context(|| format!("overwrite failed for {name}:{id}"))?;
        if first.version() == second.version() {
            bail!("overwrite of {name}:{id} kept version {}", first.version());
        }
        self.assert_value(&id, None, &updated)?;
        self.assert_value(&id, Some(first.version()), &initial)?;

        let ids = self.store.list().with_context(|| format!("list failed for {name}"))?;
        assert_listed(&ids, &id, "list")?;

        if self.caps.strict_destroy {
            assert_kind(self.store.destroy(&id), "status_conflict", "destroy of active secret")?;
        }

        self.store
            .delete(&id)
            .with_context(|| format!("delete failed for {name}:{id}"))?;
        assert_kind(self.store.get(&id, None), "not_found", "get of deleted secret")?;
        let ids = self.store.list()?;
        assert_not_listed(&ids, &id, "list")?;
        let deleted = self.store.list_deleted()?;
        assert_listed(&deleted, &id, "list deleted")?;
        self.store
            .get_deleted(&id)
            .with_context(|| format!("get deleted failed for {name}:{id}"))?;

        if self.caps.restore {
            self.store
                .restore(&id)
                .with_context(|| format!("restore failed for {name}:{id}"))?;
            self.assert_value(&id, None, &updated)?;
            self.store.delete(&id)?;
        }

        if self.caps.destroy && self.env.cleanup {
            self.store
                .destroy(&id)
                .with_context(|| format!("destroy failed for {name}:{id}"))?;
            assert_kind(self.store.get_deleted(&id), "not_found", "get of destroyed secret")?;
        }

        Ok(())
    }

    fn assert_value(&self, id: &str, version: Option<&str>, expected: &str) -> Result<()> {
        let name = &self.store_name;
        let secret = self
            .store
            .get(id, version)
            .with_context(|| format!("get failed for {name}:{id} at {version:?}"))?;
        if secret.value != expected {
            bail!(
                "value mismatch for {name}:{id} at {version:?} ({} vs {} bytes)",
                secret.value.len(),
                expected.len()
            );
        }
        Ok(())
    }
}
