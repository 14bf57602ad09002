//! AWS adapters: KMS for keys, Secrets Manager for secrets.
//!
//! KMS keys are addressed by alias and only sign with `ECDSA_SHA_256` over
//! `ECC_SECG_P256K1`. KMS cannot import or undo a scheduled deletion through
//! this surface, so restore and destroy on keys report `NotApplicable`.

use crate::crypto::ecdsa;
use keymanager_spec::vendor::{
    AwsError, AwsSecret, AwsSecretDescription, KmsClient, KmsKey, SecretsManagerClient,
};
use keymanager_spec::{
    Algorithm, Attributes, Error, Key, KeyStore, Metadata, Outcome, Payload, Result, Secret,
    SecretStore, Tags, VaultKind,
};
use std::sync::Arc;
use tracing::debug;

const KEY_SPEC: &str = "ECC_SECG_P256K1";
const SIGNING_ALGORITHM: &str = "ECDSA_SHA_256";
const PENDING_WINDOW_DAYS: u32 = 7;

pub const KEY_ID_ANNOTATION: &str = "aws-KeyID";
pub const ARN_ANNOTATION: &str = "aws-ARN";

/// Maps an AWS service error code onto the error taxonomy.
pub fn translate(err: AwsError) -> Error {
    match err.code.as_str() {
        "ResourceNotFoundException" | "NotFoundException" => Error::not_found(err.message),
        "ResourceExistsException" | "AlreadyExistsException" => {
            Error::already_exists(err.message)
        }
        "InvalidParameterException" | "ValidationException" => {
            Error::InvalidParameter(err.message)
        }
        "InvalidRequestException" | "KMSInvalidStateException" => {
            Error::StatusConflict(err.message)
        }
        "UnsupportedOperationException" => Error::NotSupported(err.message),
        _ => Error::vendor(VaultKind::Aws, err.to_string()),
    }
}

fn require_secp256k1(algorithm: &Algorithm) -> Result<()> {
    if *algorithm == Algorithm::ethereum() {
        Ok(())
    } else {
        Err(Error::NotSupported(format!("aws kms does not support {algorithm}")))
    }
}

fn key_from(key: KmsKey, public_key: Vec<u8>) -> Key {
    let mut annotations = Tags::new();
    annotations.insert(KEY_ID_ANNOTATION.to_string(), key.key_id);
    annotations.insert(ARN_ANNOTATION.to_string(), key.arn);
    Key {
        id: key.alias,
        public_key,
        algorithm: Algorithm::ethereum(),
        metadata: Metadata {
            version: "1".to_string(),
            disabled: !key.enabled,
            created_at: key.created,
            updated_at: key.created,
            deleted_at: key.deletion_date,
            expire_at: None,
        },
        tags: key.tags,
        annotations,
    }
}

pub struct AwsKeyStore {
    kms: Arc<dyn KmsClient>,
}

impl AwsKeyStore {
    pub fn new(kms: Arc<dyn KmsClient>) -> Self {
        Self { kms }
    }

    fn public_key(&self, id: &str) -> Result<Vec<u8>> {
        let der = self.kms.get_public_key(id).map_err(translate)?;
        ecdsa::from_spki(&der)
    }

    fn aliases(&self, deleted: bool) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for alias in self.kms.list_keys().map_err(translate)? {
            let key = self.kms.describe_key(&alias).map_err(translate)?;
            if key.deletion_date.is_some() == deleted {
                ids.push(alias);
            }
        }
        Ok(ids)
    }

    /// Asks KMS to check a 64-byte `r || s` signature.
    pub fn verify(&self, id: &str, payload: Payload<'_>, signature: &[u8]) -> Result<bool> {
        let digest = ecdsa::digest(payload)?;
        let der = ecdsa::to_der(signature)?;
        self.kms
            .verify(id, &digest, &der, SIGNING_ALGORITHM)
            .map_err(translate)
    }
}

impl KeyStore for AwsKeyStore {
    fn create(&self, id: &str, algorithm: &Algorithm, attrs: &Attributes) -> Result<Key> {
        require_secp256k1(algorithm)?;
        let key = self
            .kms
            .create_key(id, KEY_SPEC, &attrs.tags)
            .map_err(translate)?;
        debug!(id, key_id = %key.key_id, "created kms key");
        let public_key = self.public_key(id)?;
        Ok(key_from(key, public_key))
    }

    fn import(
        &self,
        _id: &str,
        _private_key: &[u8],
        _algorithm: &Algorithm,
        _attrs: &Attributes,
    ) -> Result<Key> {
        Err(Error::NotSupported(
            "aws kms does not import asymmetric keys".into(),
        ))
    }

    fn get(&self, id: &str) -> Result<Key> {
        let key = self.kms.describe_key(id).map_err(translate)?;
        if key.deletion_date.is_some() {
            return Err(Error::not_found(format!("key '{id}'")));
        }
        let public_key = self.public_key(id)?;
        Ok(key_from(key, public_key))
    }

    fn list(&self) -> Result<Vec<String>> {
        self.aliases(false)
    }

    fn update(&self, id: &str, attrs: &Attributes) -> Result<Key> {
        self.kms.tag_key(id, &attrs.tags).map_err(translate)?;
        self.get(id)
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        self.kms
            .delete_key(id, PENDING_WINDOW_DAYS)
            .map_err(translate)?;
        Ok(Outcome::Applied)
    }

    /// KMS refuses `GetPublicKey` on keys pending deletion, so the public key is left empty.
    fn get_deleted(&self, id: &str) -> Result<Key> {
        let key = self.kms.describe_key(id).map_err(translate)?;
        if key.deletion_date.is_none() {
            return Err(Error::not_found(format!("deleted key '{id}'")));
        }
        Ok(key_from(key, Vec::new()))
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        self.aliases(true)
    }

    fn restore(&self, _id: &str) -> Result<Outcome> {
        Ok(Outcome::NotApplicable)
    }

    fn destroy(&self, _id: &str) -> Result<Outcome> {
        Ok(Outcome::NotApplicable)
    }

    fn sign(&self, id: &str, payload: Payload<'_>, algorithm: &Algorithm) -> Result<Vec<u8>> {
        require_secp256k1(algorithm)?;
        let digest = ecdsa::digest(payload)?;
        let der = self
            .kms
            .sign(id, &digest, SIGNING_ALGORITHM)
            .map_err(translate)?;
        Ok(ecdsa::from_der(&der)?.to_vec())
    }
}

pub struct AwsSecretStore {
    client: Arc<dyn SecretsManagerClient>,
}

fn secret_from(secret: AwsSecret, description: &AwsSecretDescription) -> Secret {
    Secret {
        id: secret.name,
        value: secret.value.unwrap_or_default(),
        metadata: Metadata {
            version: secret.version_id,
            disabled: false,
            created_at: secret.created,
            updated_at: description.updated,
            deleted_at: description.deleted_date,
            expire_at: None,
        },
        tags: description.tags.clone(),
    }
}

impl AwsSecretStore {
    pub fn new(client: Arc<dyn SecretsManagerClient>) -> Self {
        Self { client }
    }

    fn describe(&self, id: &str) -> Result<AwsSecretDescription> {
        self.client.describe_secret(id).map_err(translate)
    }

    fn names(&self, deleted: bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for name in self.client.list_secrets().map_err(translate)? {
            if self.describe(&name)?.deleted_date.is_some() == deleted {
                names.push(name);
            }
        }
        Ok(names)
    }
}

impl SecretStore for AwsSecretStore {
    fn set(&self, id: &str, value: &str, attrs: &Attributes) -> Result<Secret> {
        let written = match self.client.create_secret(id, value, &attrs.tags) {
            Ok(secret) => secret,
            Err(err) if err.code == "ResourceExistsException" => {
                debug!(id, "secret exists, adding a version");
                let secret = self
                    .client
                    .put_secret_value(id, value)
                    .map_err(translate)?;
                if !attrs.tags.is_empty() {
                    self.client
                        .update_secret(id, &attrs.tags)
                        .map_err(translate)?;
                }
                secret
            }
            Err(err) => return Err(translate(err)),
        };
        let description = self.describe(id)?;
        let mut secret = secret_from(written, &description);
        secret.value = value.to_string();
        secret.metadata = secret.metadata.with_expiry(attrs);
        Ok(secret)
    }

    fn get(&self, id: &str, version: Option<&str>) -> Result<Secret> {
        let description = self.describe(id)?;
        if description.deleted_date.is_some() {
            return Err(Error::not_found(format!("secret '{id}'")));
        }
        let secret = self.client.get_secret(id, version).map_err(translate)?;
        Ok(secret_from(secret, &description))
    }

    fn list(&self) -> Result<Vec<String>> {
        self.names(false)
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        self.client.delete_secret(id, false).map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn get_deleted(&self, id: &str) -> Result<Secret> {
        let description = self.describe(id)?;
        if description.deleted_date.is_none() {
            return Err(Error::not_found(format!("deleted secret '{id}'")));
        }
        Ok(Secret {
            id: id.to_string(),
            value: String::new(),
            metadata: Metadata {
                version: description.current_version.clone().unwrap_or_default(),
                disabled: false,
                created_at: description.created,
                updated_at: description.updated,
                deleted_at: description.deleted_date,
                expire_at: None,
            },
            tags: description.tags,
        })
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        self.names(true)
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        self.client.restore_secret(id).map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        self.client.delete_secret(id, true).map_err(translate)?;
        Ok(Outcome::Applied)
    }
}
