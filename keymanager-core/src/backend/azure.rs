//! Azure Key Vault adapters.
//!
//! Keys are `EC`/`P-256K` keys signed with `ES256K`, so only `ecdsa+secp256k1`
//! is accepted. Deleted keys and secrets go through the vault's soft-delete:
//! restore is a recover, destroy is a purge.

use crate::crypto::ecdsa;
use keymanager_spec::vendor::{AzureClient, AzureJwk, AzureKey, AzureKeyOptions, AzureSecret, HttpError};
use keymanager_spec::{
    Algorithm, Attributes, Error, Key, KeyStore, Metadata, Outcome, Payload, Result, Secret,
    SecretStore, Tags, VaultKind,
};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

const KEY_TYPE: &str = "EC";
const CURVE: &str = "P-256K";
const SIGNING_ALGORITHM: &str = "ES256K";
const COORDINATE_LEN: usize = 32;

/// Maps a Key Vault failure onto the error taxonomy.
pub fn translate(err: HttpError) -> Error {
    match err.status {
        404 => Error::not_found(err.message),
        400 => Error::InvalidParameter(err.message),
        409 => Error::StatusConflict(err.message),
        405 | 501 => Error::NotSupported(err.message),
        _ => Error::vendor(VaultKind::Azure, err.to_string()),
    }
}

fn require_secp256k1(algorithm: &Algorithm) -> Result<()> {
    if *algorithm == Algorithm::ethereum() {
        Ok(())
    } else {
        Err(Error::NotSupported(format!(
            "azure key vault does not support {algorithm}"
        )))
    }
}

fn key_options(attrs: &Attributes) -> AzureKeyOptions {
    let operations = if attrs.operations.is_empty() {
        vec!["sign".to_string(), "verify".to_string()]
    } else {
        attrs.operations.clone()
    };
    AzureKeyOptions {
        operations,
        tags: attrs.tags.clone(),
        expires: attrs.expire_at(OffsetDateTime::now_utc()),
    }
}

fn pad(coordinate: &[u8]) -> Result<[u8; COORDINATE_LEN]> {
    if coordinate.len() > COORDINATE_LEN {
        return Err(Error::DependencyFailure(format!(
            "key coordinate is {} bytes",
            coordinate.len()
        )));
    }
    let mut out = [0u8; COORDINATE_LEN];
    out[COORDINATE_LEN - coordinate.len()..].copy_from_slice(coordinate);
    Ok(out)
}

/// Uncompressed SEC1 point from the JWK coordinates.
fn public_key(key: &AzureKey) -> Result<Vec<u8>> {
    if key.kty != KEY_TYPE || key.crv != CURVE {
        return Err(Error::DependencyFailure(format!(
            "azure key '{}' is {}/{}, expected {KEY_TYPE}/{CURVE}",
            key.name, key.kty, key.crv
        )));
    }
    let mut point = Vec::with_capacity(1 + 2 * COORDINATE_LEN);
    point.push(0x04);
    point.extend_from_slice(&pad(&key.x)?);
    point.extend_from_slice(&pad(&key.y)?);
    Ok(point)
}

fn key_from(key: AzureKey) -> Result<Key> {
    let public_key = public_key(&key)?;
    Ok(Key {
        id: key.name,
        public_key,
        algorithm: Algorithm::ethereum(),
        metadata: Metadata {
            version: key.version,
            disabled: !key.enabled,
            created_at: key.created,
            updated_at: key.updated,
            deleted_at: key.deleted_date,
            expire_at: key.expires,
        },
        tags: key.tags,
        annotations: Tags::new(),
    })
}

fn secret_from(secret: AzureSecret) -> Secret {
    Secret {
        id: secret.name,
        value: secret.value.unwrap_or_default(),
        metadata: Metadata {
            version: secret.version,
            disabled: !secret.enabled,
            created_at: secret.created,
            updated_at: secret.updated,
            deleted_at: secret.deleted_date,
            expire_at: secret.expires,
        },
        tags: secret.tags,
    }
}

pub struct AzureKeyStore {
    client: Arc<dyn AzureClient>,
}

impl AzureKeyStore {
    pub fn new(client: Arc<dyn AzureClient>) -> Self {
        Self { client }
    }
}

impl KeyStore for AzureKeyStore {
    fn create(&self, id: &str, algorithm: &Algorithm, attrs: &Attributes) -> Result<Key> {
        require_secp256k1(algorithm)?;
        let key = self
            .client
            .create_key(id, KEY_TYPE, CURVE, &key_options(attrs))
            .map_err(translate)?;
        debug!(id, version = %key.version, "created azure key");
        key_from(key)
    }

    fn import(
        &self,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attrs: &Attributes,
    ) -> Result<Key> {
        require_secp256k1(algorithm)?;
        let point = ecdsa::public_key(private_key)?;
        let jwk = AzureJwk {
            kty: KEY_TYPE.to_string(),
            crv: CURVE.to_string(),
            d: private_key.to_vec(),
            x: point[1..1 + COORDINATE_LEN].to_vec(),
            y: point[1 + COORDINATE_LEN..].to_vec(),
        };
        let key = self
            .client
            .import_key(id, &jwk, &key_options(attrs))
            .map_err(translate)?;
        key_from(key)
    }

    fn get(&self, id: &str) -> Result<Key> {
        self.client.get_key(id).map_err(translate).and_then(key_from)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.client.get_keys().map_err(translate)
    }

    fn update(&self, id: &str, attrs: &Attributes) -> Result<Key> {
        self.client
            .update_key(id, &key_options(attrs))
            .map_err(translate)
            .and_then(key_from)
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        self.client.delete_key(id).map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn get_deleted(&self, id: &str) -> Result<Key> {
        self.client
            .get_deleted_key(id)
            .map_err(translate)
            .and_then(key_from)
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        self.client.get_deleted_keys().map_err(translate)
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        self.client.recover_deleted_key(id).map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        self.client.purge_deleted_key(id).map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn sign(&self, id: &str, payload: Payload<'_>, algorithm: &Algorithm) -> Result<Vec<u8>> {
        require_secp256k1(algorithm)?;
        let digest = ecdsa::digest(payload)?;
        let signature = self
            .client
            .sign(id, SIGNING_ALGORITHM, &digest)
            .map_err(translate)?;
        Ok(ecdsa::normalize(&signature)?.to_vec())
    }
}

pub struct AzureSecretStore {
    client: Arc<dyn AzureClient>,
}

impl AzureSecretStore {
    pub fn new(client: Arc<dyn AzureClient>) -> Self {
        Self { client }
    }
}

impl SecretStore for AzureSecretStore {
    fn set(&self, id: &str, value: &str, attrs: &Attributes) -> Result<Secret> {
        let expires = attrs.expire_at(OffsetDateTime::now_utc());
        self.client
            .set_secret(id, value, &attrs.tags, expires)
            .map_err(translate)
            .map(secret_from)
    }

    fn get(&self, id: &str, version: Option<&str>) -> Result<Secret> {
        self.client
            .get_secret(id, version)
            .map_err(translate)
            .map(secret_from)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.client.get_secrets().map_err(translate)
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        self.client.delete_secret(id).map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn get_deleted(&self, id: &str) -> Result<Secret> {
        self.client
            .get_deleted_secret(id)
            .map_err(translate)
            .map(secret_from)
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        self.client.get_deleted_secrets().map_err(translate)
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        self.client.recover_deleted_secret(id).map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        self.client.purge_deleted_secret(id).map_err(translate)?;
        Ok(Outcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(x: Vec<u8>, y: Vec<u8>) -> AzureKey {
        let now = OffsetDateTime::now_utc();
        AzureKey {
            name: "k1".into(),
            version: "abc".into(),
            kty: KEY_TYPE.into(),
            crv: CURVE.into(),
            x,
            y,
            tags: Tags::new(),
            enabled: true,
            created: now,
            updated: now,
            expires: None,
            deleted_date: None,
        }
    }

    #[test]
    fn short_coordinates_are_left_padded() {
        let key = key_from(bundle(vec![1; 31], vec![2; 32])).unwrap();
        assert_eq!(key.public_key.len(), 65);
        assert_eq!(key.public_key[0], 0x04);
        assert_eq!(key.public_key[1], 0);
        assert_eq!(key.public_key[2], 1);
        assert_eq!(key.metadata.version, "abc");
    }

    #[test]
    fn other_curves_are_rejected() {
        let mut key = bundle(vec![1; 32], vec![2; 32]);
        key.crv = "P-256".into();
        assert_eq!(key_from(key).unwrap_err().code(), "dependency_failure");
    }

    #[test]
    fn default_operations_are_sign_and_verify() {
        let options = key_options(&Attributes::default());
        assert_eq!(options.operations, vec!["sign", "verify"]);
        assert!(options.expires.is_none());
    }

    #[test]
    fn status_codes_translate_to_kinds() {
        assert!(translate(HttpError::new(404, "KeyNotFound")).is_not_found());
        assert_eq!(translate(HttpError::new(409, "conflict")).code(), "status_conflict");
        assert_eq!(translate(HttpError::new(429, "throttled")).code(), "vendor");
    }
}
