use crate::address::Address;
use crate::algorithm::Algorithm;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

pub type Tags = BTreeMap<String, String>;

/// Lifecycle bookkeeping shared by keys, secrets and accounts.
///
/// `deleted_at` is the single source of truth for the soft-delete state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metadata {
    pub version: String,
    pub disabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
    pub expire_at: Option<OffsetDateTime>,
}

impl Metadata {
    pub fn new(version: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            version: version.into(),
            disabled: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            expire_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn with_expiry(mut self, attrs: &Attributes) -> Self {
        self.expire_at = attrs.expire_at(self.created_at);
        self
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new("")
    }
}

/// Caller supplied attributes for create/import/update calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attributes {
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Tags,
    #[cfg_attr(feature = "serde", serde(default))]
    pub ttl: Option<Duration>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub operations: Vec<String>,
}

impl Attributes {
    pub fn with_tags(tags: Tags) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }

    pub fn expire_at(&self, from: OffsetDateTime) -> Option<OffsetDateTime> {
        let ttl = self.ttl?;
        time::Duration::try_from(ttl).ok().map(|ttl| from + ttl)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Key {
    pub id: String,
    pub public_key: Vec<u8>,
    pub algorithm: Algorithm,
    pub metadata: Metadata,
    pub tags: Tags,
    pub annotations: Tags,
}

/// Secret value at a given version. The version also lives in `metadata.version`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Secret {
    pub id: String,
    pub value: String,
    pub metadata: Metadata,
    pub tags: Tags,
}

impl Secret {
    pub fn version(&self) -> &str {
        &self.metadata.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EthAccount {
    pub address: Address,
    pub key_id: String,
    pub public_key: Vec<u8>,
    pub compressed_public_key: Vec<u8>,
    pub metadata: Metadata,
    pub tags: Tags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_follows_ttl() {
        let attrs = Attributes {
            ttl: Some(Duration::from_secs(60)),
            ..Attributes::default()
        };
        let meta = Metadata::new("1").with_expiry(&attrs);
        let expire = meta.expire_at.expect("expiry set");
        assert_eq!(expire - meta.created_at, time::Duration::seconds(60));
        assert!(!meta.is_deleted());
    }

    #[test]
    fn no_ttl_means_no_expiry() {
        let meta = Metadata::new("1").with_expiry(&Attributes::default());
        assert!(meta.expire_at.is_none());
    }
}
