//! KV version 2 secrets engine adapter.
//!
//! Secrets live at `<mount>/data/<id>` with the value under the `value` key and
//! tags in the secret's `custom_metadata`. KV v2 soft-deletes per version, so
//! the deletion state of a secret is the state of its current version.

use super::parse_timestamp;
use keymanager_spec::vendor::{HttpError, KvClient};
use keymanager_spec::{
    Attributes, Error, Metadata, Outcome, Result, Secret, SecretStore, Tags, VaultKind,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

pub const DEFAULT_MOUNT: &str = "secret";

/// Maps a HashiCorp API failure onto the error taxonomy.
pub fn translate(err: HttpError) -> Error {
    match err.status {
        404 => Error::not_found(err.message),
        400 | 422 => Error::InvalidParameter(err.message),
        409 | 412 => Error::StatusConflict(err.message),
        405 | 501 => Error::NotSupported(err.message),
        _ => Error::vendor(VaultKind::Hashicorp, err.to_string()),
    }
}

pub struct HashicorpSecretStore {
    client: Arc<dyn KvClient>,
    mount: String,
}

#[derive(Deserialize)]
struct ReadData {
    #[serde(default)]
    data: Option<BTreeMap<String, Value>>,
    metadata: VersionMetadata,
}

#[derive(Deserialize, Default)]
struct VersionMetadata {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    created_time: String,
    #[serde(default)]
    deletion_time: String,
    #[serde(default)]
    destroyed: bool,
    #[serde(default)]
    custom_metadata: Option<Tags>,
}

#[derive(Deserialize)]
struct SecretMetadata {
    #[serde(default)]
    current_version: u64,
    #[serde(default)]
    created_time: String,
    #[serde(default)]
    updated_time: String,
    #[serde(default)]
    custom_metadata: Option<Tags>,
    #[serde(default)]
    versions: BTreeMap<String, VersionMetadata>,
}

impl SecretMetadata {
    fn current(&self) -> Option<&VersionMetadata> {
        self.versions.get(&self.current_version.to_string())
    }

    fn is_deleted(&self) -> bool {
        self.current()
            .map(|v| !v.deletion_time.is_empty())
            .unwrap_or(false)
    }

    fn is_destroyed(&self) -> bool {
        self.current().map(|v| v.destroyed).unwrap_or(true)
    }
}

impl HashicorpSecretStore {
    pub fn new(client: Arc<dyn KvClient>, mount: impl Into<String>) -> Self {
        Self {
            client,
            mount: mount.into(),
        }
    }

    fn path(&self, section: &str, id: &str) -> String {
        format!(
            "{}/{section}/{}",
            self.mount.trim_matches('/'),
            id.trim_start_matches('/')
        )
    }

    fn describe(&self, id: &str) -> Result<SecretMetadata> {
        let data = self
            .client
            .read(&self.path("metadata", id))
            .map_err(translate)?
            .ok_or_else(|| Error::not_found(format!("secret '{id}'")))?;
        serde_json::from_value(data).map_err(|err| {
            Error::DependencyFailure(format!("failed to decode metadata of '{id}': {err}"))
        })
    }

    fn ids(&self, deleted: bool) -> Result<Vec<String>> {
        let keys = self
            .client
            .list(&format!("{}/metadata/", self.mount.trim_matches('/')))
            .map_err(translate)?;
        let mut ids = Vec::new();
        for key in keys {
            if key.ends_with('/') {
                continue;
            }
            let meta = self.describe(&key)?;
            if meta.is_destroyed() {
                continue;
            }
            if meta.is_deleted() == deleted {
                ids.push(key);
            }
        }
        Ok(ids)
    }
}

fn metadata_from(version: &VersionMetadata, updated: Option<&str>) -> Metadata {
    let created = parse_timestamp(&version.created_time).unwrap_or_else(OffsetDateTime::now_utc);
    Metadata {
        version: version.version.to_string(),
        disabled: false,
        created_at: created,
        updated_at: updated.and_then(parse_timestamp).unwrap_or(created),
        deleted_at: parse_timestamp(&version.deletion_time),
        expire_at: None,
    }
}

impl SecretStore for HashicorpSecretStore {
    fn set(&self, id: &str, value: &str, attrs: &Attributes) -> Result<Secret> {
        let written = self
            .client
            .write(&self.path("data", id), json!({ "data": { "value": value } }))
            .map_err(translate)?
            .ok_or_else(|| Error::DependencyFailure(format!("empty write response for '{id}'")))?;
        let version: VersionMetadata = serde_json::from_value(written).map_err(|err| {
            Error::DependencyFailure(format!("failed to decode write response of '{id}': {err}"))
        })?;

        if !attrs.tags.is_empty() {
            self.client
                .write(
                    &self.path("metadata", id),
                    json!({ "custom_metadata": attrs.tags }),
                )
                .map_err(translate)?;
        }
        debug!(id, version = version.version, "wrote kv secret");

        Ok(Secret {
            id: id.to_string(),
            value: value.to_string(),
            metadata: metadata_from(&version, None).with_expiry(attrs),
            tags: attrs.tags.clone(),
        })
    }

    fn get(&self, id: &str, version: Option<&str>) -> Result<Secret> {
        let mut path = self.path("data", id);
        if let Some(version) = version {
            path.push_str(&format!("?version={version}"));
        }
        let data = self
            .client
            .read(&path)
            .map_err(translate)?
            .ok_or_else(|| Error::not_found(format!("secret '{id}'")))?;
        let read: ReadData = serde_json::from_value(data).map_err(|err| {
            Error::DependencyFailure(format!("failed to decode secret '{id}': {err}"))
        })?;
        if read.metadata.destroyed || !read.metadata.deletion_time.is_empty() {
            return Err(Error::not_found(format!("secret '{id}'")));
        }
        let value = read
            .data
            .as_ref()
            .and_then(|data| data.get("value"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::DependencyFailure(format!("secret '{id}' has no value")))?
            .to_string();

        Ok(Secret {
            id: id.to_string(),
            value,
            metadata: metadata_from(&read.metadata, None),
            tags: read.metadata.custom_metadata.unwrap_or_default(),
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        self.ids(false)
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        if self.describe(id)?.is_deleted() {
            return Err(Error::not_found(format!("secret '{id}'")));
        }
        self.client
            .delete(&self.path("data", id))
            .map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn get_deleted(&self, id: &str) -> Result<Secret> {
        let meta = self.describe(id)?;
        let current = meta
            .current()
            .filter(|v| !v.deletion_time.is_empty() && !v.destroyed)
            .ok_or_else(|| Error::not_found(format!("deleted secret '{id}'")))?;
        let mut metadata = metadata_from(current, Some(&meta.updated_time));
        metadata.version = meta.current_version.to_string();
        if let Some(created) = parse_timestamp(&meta.created_time) {
            metadata.created_at = created;
        }
        Ok(Secret {
            id: id.to_string(),
            value: String::new(),
            metadata,
            tags: meta.custom_metadata.clone().unwrap_or_default(),
        })
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        self.ids(true)
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        let meta = self.describe(id)?;
        if !meta.is_deleted() || meta.is_destroyed() {
            return Err(Error::not_found(format!("deleted secret '{id}'")));
        }
        self.client
            .write(
                &self.path("undelete", id),
                json!({ "versions": [meta.current_version] }),
            )
            .map_err(translate)?;
        Ok(Outcome::Applied)
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        self.describe(id)?;
        self.client
            .delete(&self.path("metadata", id))
            .map_err(translate)?;
        Ok(Outcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryKvClient;

    fn store() -> HashicorpSecretStore {
        HashicorpSecretStore::new(Arc::new(MemoryKvClient::new()), DEFAULT_MOUNT)
    }

    #[test]
    fn versions_increase_and_old_versions_stay_readable() {
        let store = store();
        let first = store.set("db", "one", &Attributes::default()).unwrap();
        let second = store.set("db", "two", &Attributes::default()).unwrap();
        assert_eq!(first.version(), "1");
        assert_eq!(second.version(), "2");
        assert_eq!(store.get("db", None).unwrap().value, "two");
        assert_eq!(store.get("db", Some("1")).unwrap().value, "one");
    }

    #[test]
    fn delete_restore_destroy_cycle() {
        let store = store();
        let mut tags = Tags::new();
        tags.insert("team".into(), "payments".into());
        store.set("api", "token", &Attributes::with_tags(tags.clone())).unwrap();
        assert_eq!(store.list().unwrap(), vec!["api"]);

        assert_eq!(store.delete("api").unwrap(), Outcome::Applied);
        assert!(store.get("api", None).unwrap_err().is_not_found());
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.list_deleted().unwrap(), vec!["api"]);
        let deleted = store.get_deleted("api").unwrap();
        assert!(deleted.metadata.is_deleted());
        assert_eq!(deleted.tags, tags);

        store.restore("api").unwrap();
        assert_eq!(store.get("api", None).unwrap().value, "token");

        store.delete("api").unwrap();
        store.destroy("api").unwrap();
        assert!(store.get_deleted("api").unwrap_err().is_not_found());
        assert!(store.list_deleted().unwrap().is_empty());
    }

    #[test]
    fn status_codes_translate_to_kinds() {
        assert!(translate(HttpError::new(404, "missing")).is_not_found());
        assert_eq!(
            translate(HttpError::new(400, "bad")).code(),
            "invalid_parameter"
        );
        assert_eq!(
            translate(HttpError::new(503, "sealed")),
            Error::vendor(VaultKind::Hashicorp, "http 503: sealed")
        );
    }
}
