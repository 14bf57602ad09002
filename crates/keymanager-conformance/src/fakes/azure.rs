use super::{next_version, random_secret_key, secp};
use keymanager_spec::Tags;
use keymanager_spec::vendor::{
    AzureClient, AzureJwk, AzureKey, AzureKeyOptions, AzureSecret, HttpError,
};
use parking_lot::Mutex;
use secp256k1::{Message, PublicKey, SecretKey};
use std::collections::BTreeMap;
use time::OffsetDateTime;

struct StoredKey {
    secret: SecretKey,
    bundle: AzureKey,
}

#[derive(Default)]
struct State {
    counter: u64,
    keys: BTreeMap<String, StoredKey>,
    secrets: BTreeMap<String, Vec<AzureSecret>>,
}

/// Key Vault with soft-delete enabled.
#[derive(Default)]
pub struct FakeAzureClient {
    state: Mutex<State>,
}

impl FakeAzureClient {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: &str, name: &str) -> HttpError {
    HttpError::new(404, format!("{kind} '{name}' was not found"))
}

fn conflict(kind: &str, name: &str) -> HttpError {
    HttpError::new(409, format!("{kind} '{name}' is currently in a deleted but recoverable state"))
}

fn bundle(name: &str, version: String, secret: &SecretKey, options: &AzureKeyOptions) -> AzureKey {
    let point = PublicKey::from_secret_key(secp(), secret).serialize_uncompressed();
    let now = OffsetDateTime::now_utc();
    AzureKey {
        name: name.to_string(),
        version,
        kty: "EC".into(),
        crv: "P-256K".into(),
        x: point[1..33].to_vec(),
        y: point[33..].to_vec(),
        tags: options.tags.clone(),
        enabled: true,
        created: now,
        updated: now,
        expires: options.expires,
        deleted_date: None,
    }
}

impl State {
    fn put_key(&mut self, name: &str, secret: SecretKey, options: &AzureKeyOptions) -> Result<AzureKey, HttpError> {
        if let Some(existing) = self.keys.get(name)
            && existing.bundle.deleted_date.is_some()
        {
            return Err(conflict("key", name));
        }
        let version = next_version(&mut self.counter);
        let bundle = bundle(name, version, &secret, options);
        self.keys.insert(
            name.to_string(),
            StoredKey {
                secret,
                bundle: bundle.clone(),
            },
        );
        Ok(bundle)
    }

    fn key(&mut self, name: &str, deleted: bool) -> Result<&mut StoredKey, HttpError> {
        self.keys
            .get_mut(name)
            .filter(|key| key.bundle.deleted_date.is_some() == deleted)
            .ok_or_else(|| not_found("key", name))
    }

    fn key_names(&self, deleted: bool) -> Vec<String> {
        self.keys
            .iter()
            .filter(|(_, key)| key.bundle.deleted_date.is_some() == deleted)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn secret(&mut self, name: &str, deleted: bool) -> Result<&mut Vec<AzureSecret>, HttpError> {
        self.secrets
            .get_mut(name)
            .filter(|versions| {
                versions
                    .last()
                    .map(|latest| latest.deleted_date.is_some() == deleted)
                    .unwrap_or(false)
            })
            .ok_or_else(|| not_found("secret", name))
    }

    fn secret_names(&self, deleted: bool) -> Vec<String> {
        self.secrets
            .iter()
            .filter(|(_, versions)| {
                versions
                    .last()
                    .map(|latest| latest.deleted_date.is_some() == deleted)
                    .unwrap_or(false)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn without_value(secret: &AzureSecret) -> AzureSecret {
    AzureSecret {
        value: None,
        ..secret.clone()
    }
}

impl AzureClient for FakeAzureClient {
    fn create_key(
        &self,
        name: &str,
        kty: &str,
        crv: &str,
        options: &AzureKeyOptions,
    ) -> Result<AzureKey, HttpError> {
        if kty != "EC" || crv != "P-256K" {
            return Err(HttpError::new(400, format!("unsupported key type {kty}/{crv}")));
        }
        self.state.lock().put_key(name, random_secret_key(), options)
    }

    fn import_key(
        &self,
        name: &str,
        jwk: &AzureJwk,
        options: &AzureKeyOptions,
    ) -> Result<AzureKey, HttpError> {
        let secret = SecretKey::from_slice(&jwk.d)
            .map_err(|err| HttpError::new(400, format!("invalid private key: {err}")))?;
        let point = PublicKey::from_secret_key(secp(), &secret).serialize_uncompressed();
        if point[1..33] != jwk.x[..] || point[33..] != jwk.y[..] {
            return Err(HttpError::new(400, "public coordinates do not match the private key"));
        }
        self.state.lock().put_key(name, secret, options)
    }

    fn get_key(&self, name: &str) -> Result<AzureKey, HttpError> {
        Ok(self.state.lock().key(name, false)?.bundle.clone())
    }

    fn get_keys(&self) -> Result<Vec<String>, HttpError> {
        Ok(self.state.lock().key_names(false))
    }

    fn update_key(&self, name: &str, options: &AzureKeyOptions) -> Result<AzureKey, HttpError> {
        let mut state = self.state.lock();
        let key = state.key(name, false)?;
        key.bundle.tags = options.tags.clone();
        key.bundle.expires = options.expires;
        key.bundle.updated = OffsetDateTime::now_utc();
        Ok(key.bundle.clone())
    }

    fn delete_key(&self, name: &str) -> Result<AzureKey, HttpError> {
        let mut state = self.state.lock();
        let key = state.key(name, false)?;
        key.bundle.deleted_date = Some(OffsetDateTime::now_utc());
        Ok(key.bundle.clone())
    }

    fn get_deleted_key(&self, name: &str) -> Result<AzureKey, HttpError> {
        Ok(self.state.lock().key(name, true)?.bundle.clone())
    }

    fn get_deleted_keys(&self) -> Result<Vec<String>, HttpError> {
        Ok(self.state.lock().key_names(true))
    }

    fn recover_deleted_key(&self, name: &str) -> Result<AzureKey, HttpError> {
        let mut state = self.state.lock();
        let key = state.key(name, true)?;
        key.bundle.deleted_date = None;
        Ok(key.bundle.clone())
    }

    fn purge_deleted_key(&self, name: &str) -> Result<(), HttpError> {
        let mut state = self.state.lock();
        state.key(name, true)?;
        state.keys.remove(name);
        Ok(())
    }

    fn sign(&self, name: &str, algorithm: &str, digest: &[u8]) -> Result<Vec<u8>, HttpError> {
        if algorithm != "ES256K" {
            return Err(HttpError::new(400, format!("unsupported algorithm {algorithm}")));
        }
        let mut state = self.state.lock();
        let key = state.key(name, false)?;
        let message = Message::from_digest_slice(digest)
            .map_err(|err| HttpError::new(400, format!("invalid digest: {err}")))?;
        Ok(secp()
            .sign_ecdsa(&message, &key.secret)
            .serialize_compact()
            .to_vec())
    }

    fn set_secret(
        &self,
        name: &str,
        value: &str,
        tags: &Tags,
        expires: Option<OffsetDateTime>,
    ) -> Result<AzureSecret, HttpError> {
        let mut state = self.state.lock();
        if state.secret(name, true).is_ok() {
            return Err(conflict("secret", name));
        }
        let now = OffsetDateTime::now_utc();
        let secret = AzureSecret {
            name: name.to_string(),
            version: next_version(&mut state.counter),
            value: Some(value.to_string()),
            tags: tags.clone(),
            enabled: true,
            created: now,
            updated: now,
            expires,
            deleted_date: None,
        };
        state
            .secrets
            .entry(name.to_string())
            .or_default()
            .push(secret.clone());
        Ok(secret)
    }

    fn get_secret(&self, name: &str, version: Option<&str>) -> Result<AzureSecret, HttpError> {
        let mut state = self.state.lock();
        let versions = state.secret(name, false)?;
        let found = match version {
            Some(version) => versions.iter().find(|secret| secret.version == version),
            None => versions.last(),
        };
        found.cloned().ok_or_else(|| not_found("secret version", name))
    }

    fn get_secrets(&self) -> Result<Vec<String>, HttpError> {
        Ok(self.state.lock().secret_names(false))
    }

    fn delete_secret(&self, name: &str) -> Result<AzureSecret, HttpError> {
        let mut state = self.state.lock();
        let versions = state.secret(name, false)?;
        let now = OffsetDateTime::now_utc();
        for secret in versions.iter_mut() {
            secret.deleted_date = Some(now);
        }
        versions
            .last()
            .map(without_value)
            .ok_or_else(|| not_found("secret", name))
    }

    fn get_deleted_secret(&self, name: &str) -> Result<AzureSecret, HttpError> {
        let mut state = self.state.lock();
        let versions = state.secret(name, true)?;
        versions
            .last()
            .map(without_value)
            .ok_or_else(|| not_found("secret", name))
    }

    fn get_deleted_secrets(&self) -> Result<Vec<String>, HttpError> {
        Ok(self.state.lock().secret_names(true))
    }

    fn recover_deleted_secret(&self, name: &str) -> Result<AzureSecret, HttpError> {
        let mut state = self.state.lock();
        let versions = state.secret(name, true)?;
        for secret in versions.iter_mut() {
            secret.deleted_date = None;
        }
        versions
            .last()
            .map(without_value)
            .ok_or_else(|| not_found("secret", name))
    }

    fn purge_deleted_secret(&self, name: &str) -> Result<(), HttpError> {
        let mut state = self.state.lock();
        state.secret(name, true)?;
        state.secrets.remove(name);
        Ok(())
    }
}
