use super::{next_version, random_secret_key, secp};
use keymanager_spec::Tags;
use keymanager_spec::vendor::{
    AwsError, AwsSecret, AwsSecretDescription, KmsClient, KmsKey, SecretsManagerClient,
};
use parking_lot::Mutex;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, SecretKey};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

const KEY_SPEC: &str = "ECC_SECG_P256K1";
const SIGNING_ALGORITHM: &str = "ECDSA_SHA_256";
const SPKI_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

struct StoredKey {
    secret: SecretKey,
    description: KmsKey,
}

#[derive(Default)]
struct KmsState {
    counter: u64,
    keys: BTreeMap<String, StoredKey>,
}

/// KMS holding secp256k1 keys by alias.
#[derive(Default)]
pub struct FakeKms {
    state: Mutex<KmsState>,
}

impl FakeKms {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(alias: &str) -> AwsError {
    AwsError::new("NotFoundException", format!("alias/{alias} is not found"))
}

fn pending(alias: &str) -> AwsError {
    AwsError::new(
        "KMSInvalidStateException",
        format!("alias/{alias} is pending deletion"),
    )
}

fn require_algorithm(algorithm: &str) -> Result<(), AwsError> {
    if algorithm == SIGNING_ALGORITHM {
        Ok(())
    } else {
        Err(AwsError::new(
            "ValidationException",
            format!("unsupported signing algorithm {algorithm}"),
        ))
    }
}

fn message(digest: &[u8]) -> Result<Message, AwsError> {
    Message::from_digest_slice(digest)
        .map_err(|err| AwsError::new("ValidationException", format!("invalid digest: {err}")))
}

impl KmsState {
    fn key(&self, alias: &str) -> Result<&StoredKey, AwsError> {
        self.keys.get(alias).ok_or_else(|| not_found(alias))
    }

    fn active(&self, alias: &str) -> Result<&StoredKey, AwsError> {
        let key = self.key(alias)?;
        if key.description.deletion_date.is_some() {
            return Err(pending(alias));
        }
        Ok(key)
    }
}

impl KmsClient for FakeKms {
    fn create_key(&self, alias: &str, key_spec: &str, tags: &Tags) -> Result<KmsKey, AwsError> {
        if key_spec != KEY_SPEC {
            return Err(AwsError::new(
                "ValidationException",
                format!("unsupported key spec {key_spec}"),
            ));
        }
        let mut state = self.state.lock();
        if state.keys.contains_key(alias) {
            return Err(AwsError::new(
                "AlreadyExistsException",
                format!("alias/{alias} already exists"),
            ));
        }
        let key_id = next_version(&mut state.counter);
        let description = KmsKey {
            arn: format!("arn:aws:kms:us-east-1:000000000000:key/{key_id}"),
            key_id,
            alias: alias.to_string(),
            enabled: true,
            created: OffsetDateTime::now_utc(),
            deletion_date: None,
            tags: tags.clone(),
        };
        state.keys.insert(
            alias.to_string(),
            StoredKey {
                secret: random_secret_key(),
                description: description.clone(),
            },
        );
        Ok(description)
    }

    fn describe_key(&self, alias: &str) -> Result<KmsKey, AwsError> {
        Ok(self.state.lock().key(alias)?.description.clone())
    }

    fn get_public_key(&self, alias: &str) -> Result<Vec<u8>, AwsError> {
        let state = self.state.lock();
        let key = state.active(alias)?;
        let point = PublicKey::from_secret_key(secp(), &key.secret).serialize_uncompressed();
        let mut der = SPKI_PREFIX.to_vec();
        der.extend_from_slice(&point);
        Ok(der)
    }

    fn sign(&self, alias: &str, digest: &[u8], algorithm: &str) -> Result<Vec<u8>, AwsError> {
        require_algorithm(algorithm)?;
        let state = self.state.lock();
        let key = state.active(alias)?;
        let signature = secp().sign_ecdsa(&message(digest)?, &key.secret);
        Ok(signature.serialize_der().to_vec())
    }

    fn verify(
        &self,
        alias: &str,
        digest: &[u8],
        signature: &[u8],
        algorithm: &str,
    ) -> Result<bool, AwsError> {
        require_algorithm(algorithm)?;
        let state = self.state.lock();
        let key = state.active(alias)?;
        let Ok(signature) = Signature::from_der(signature) else {
            return Ok(false);
        };
        let public = PublicKey::from_secret_key(secp(), &key.secret);
        Ok(secp()
            .verify_ecdsa(&message(digest)?, &signature, &public)
            .is_ok())
    }

    fn list_keys(&self) -> Result<Vec<String>, AwsError> {
        Ok(self.state.lock().keys.keys().cloned().collect())
    }

    fn tag_key(&self, alias: &str, tags: &Tags) -> Result<(), AwsError> {
        let mut state = self.state.lock();
        state.active(alias)?;
        if let Some(key) = state.keys.get_mut(alias) {
            key.description.tags.extend(tags.clone());
        }
        Ok(())
    }

    fn delete_key(&self, alias: &str, pending_days: u32) -> Result<KmsKey, AwsError> {
        if !(7..=30).contains(&pending_days) {
            return Err(AwsError::new(
                "ValidationException",
                format!("pending window of {pending_days} days is out of range"),
            ));
        }
        let mut state = self.state.lock();
        state.active(alias)?;
        let key = state
            .keys
            .get_mut(alias)
            .ok_or_else(|| not_found(alias))?;
        key.description.deletion_date =
            Some(OffsetDateTime::now_utc() + Duration::days(i64::from(pending_days)));
        key.description.enabled = false;
        Ok(key.description.clone())
    }
}

struct StoredSecret {
    description: AwsSecretDescription,
    versions: Vec<AwsSecret>,
}

#[derive(Default)]
struct SecretsState {
    counter: u64,
    secrets: BTreeMap<String, StoredSecret>,
}

/// Secrets Manager with a recovery window on delete.
#[derive(Default)]
pub struct FakeSecretsManager {
    state: Mutex<SecretsState>,
}

impl FakeSecretsManager {
    pub fn new() -> Self {
        Self::default()
    }
}

fn secret_not_found(name: &str) -> AwsError {
    AwsError::new(
        "ResourceNotFoundException",
        format!("secrets manager can't find the secret '{name}'"),
    )
}

fn marked_for_deletion(name: &str) -> AwsError {
    AwsError::new(
        "InvalidRequestException",
        format!("secret '{name}' is marked for deletion"),
    )
}

impl SecretsState {
    fn stored(&mut self, name: &str) -> Result<&mut StoredSecret, AwsError> {
        self.secrets
            .get_mut(name)
            .ok_or_else(|| secret_not_found(name))
    }

    fn active(&mut self, name: &str) -> Result<&mut StoredSecret, AwsError> {
        let stored = self.stored(name)?;
        if stored.description.deleted_date.is_some() {
            return Err(marked_for_deletion(name));
        }
        Ok(stored)
    }

    fn version(&mut self, name: &str, value: &str) -> AwsSecret {
        AwsSecret {
            name: name.to_string(),
            version_id: next_version(&mut self.counter),
            value: Some(value.to_string()),
            created: OffsetDateTime::now_utc(),
        }
    }
}

impl SecretsManagerClient for FakeSecretsManager {
    fn create_secret(&self, name: &str, value: &str, tags: &Tags) -> Result<AwsSecret, AwsError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.secrets.get(name) {
            return Err(if existing.description.deleted_date.is_some() {
                marked_for_deletion(name)
            } else {
                AwsError::new(
                    "ResourceExistsException",
                    format!("secret '{name}' already exists"),
                )
            });
        }
        let secret = state.version(name, value);
        let description = AwsSecretDescription {
            name: name.to_string(),
            tags: tags.clone(),
            created: secret.created,
            updated: secret.created,
            deleted_date: None,
            current_version: Some(secret.version_id.clone()),
        };
        state.secrets.insert(
            name.to_string(),
            StoredSecret {
                description,
                versions: vec![secret.clone()],
            },
        );
        Ok(secret)
    }

    fn put_secret_value(&self, name: &str, value: &str) -> Result<AwsSecret, AwsError> {
        let mut state = self.state.lock();
        state.active(name)?;
        let secret = state.version(name, value);
        let stored = state.active(name)?;
        stored.description.updated = secret.created;
        stored.description.current_version = Some(secret.version_id.clone());
        stored.versions.push(secret.clone());
        Ok(secret)
    }

    fn get_secret(&self, name: &str, version_id: Option<&str>) -> Result<AwsSecret, AwsError> {
        let mut state = self.state.lock();
        let stored = state.active(name)?;
        let found = match version_id {
            Some(version_id) => stored
                .versions
                .iter()
                .find(|secret| secret.version_id == version_id),
            None => stored.versions.last(),
        };
        found.cloned().ok_or_else(|| {
            AwsError::new(
                "ResourceNotFoundException",
                format!("secret '{name}' has no version {version_id:?}"),
            )
        })
    }

    fn update_secret(&self, name: &str, tags: &Tags) -> Result<(), AwsError> {
        let mut state = self.state.lock();
        let stored = state.active(name)?;
        stored.description.tags = tags.clone();
        stored.description.updated = OffsetDateTime::now_utc();
        Ok(())
    }

    fn describe_secret(&self, name: &str) -> Result<AwsSecretDescription, AwsError> {
        let mut state = self.state.lock();
        Ok(state.stored(name)?.description.clone())
    }

    fn list_secrets(&self) -> Result<Vec<String>, AwsError> {
        Ok(self.state.lock().secrets.keys().cloned().collect())
    }

    fn delete_secret(&self, name: &str, force: bool) -> Result<(), AwsError> {
        let mut state = self.state.lock();
        if force {
            state.stored(name)?;
            state.secrets.remove(name);
            return Ok(());
        }
        let stored = state.active(name)?;
        stored.description.deleted_date = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    fn restore_secret(&self, name: &str) -> Result<(), AwsError> {
        let mut state = self.state.lock();
        let stored = state.stored(name)?;
        stored.description.deleted_date = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kms_signatures_verify() {
        let kms = FakeKms::new();
        kms.create_key("k", KEY_SPEC, &Tags::new()).unwrap();
        let digest = [7u8; 32];
        let signature = kms.sign("k", &digest, SIGNING_ALGORITHM).unwrap();
        assert!(kms.verify("k", &digest, &signature, SIGNING_ALGORITHM).unwrap());
        assert!(!kms.verify("k", &[8u8; 32], &signature, SIGNING_ALGORITHM).unwrap());
    }

    #[test]
    fn pending_keys_refuse_public_key() {
        let kms = FakeKms::new();
        kms.create_key("k", KEY_SPEC, &Tags::new()).unwrap();
        kms.delete_key("k", 7).unwrap();
        let err = kms.get_public_key("k").unwrap_err();
        assert_eq!(err.code, "KMSInvalidStateException");
        assert!(kms.describe_key("k").unwrap().deletion_date.is_some());
    }

    #[test]
    fn deleted_secrets_reject_new_values() {
        let manager = FakeSecretsManager::new();
        manager.create_secret("s", "one", &Tags::new()).unwrap();
        manager.delete_secret("s", false).unwrap();
        let err = manager.put_secret_value("s", "two").unwrap_err();
        assert_eq!(err.code, "InvalidRequestException");
        manager.restore_secret("s").unwrap();
        assert_eq!(
            manager.put_secret_value("s", "two").unwrap().value.as_deref(),
            Some("two")
        );
    }
}
