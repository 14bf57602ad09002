#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wildcard token accepted in permissions and allowed-tenant lists.
pub const ANY: &str = "*";

/// Identity handed in by the authentication layer on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UserInfo {
    pub tenant: String,
    /// Permission strings of the form `action:resource`; `*` matches any token.
    pub permissions: Vec<String>,
}

impl UserInfo {
    pub fn new(tenant: impl Into<String>, permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tenant: tenant.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Caller holding every permission on every resource.
    pub fn admin(tenant: impl Into<String>) -> Self {
        Self::new(tenant, ["*:*"])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    Sign,
    Delete,
    Destroy,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Write,
        Action::Sign,
        Action::Delete,
        Action::Destroy,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Secrets,
    Keys,
    Ethereum,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Secrets, Resource::Keys, Resource::Ethereum];
}

impl From<crate::vault::StoreCategory> for Resource {
    fn from(category: crate::vault::StoreCategory) -> Self {
        use crate::vault::StoreCategory;
        match category {
            StoreCategory::Secret => Self::Secrets,
            StoreCategory::Key => Self::Keys,
            StoreCategory::Ethereum => Self::Ethereum,
        }
    }
}

/// A single `(action, resource)` pair checked by the authorization resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    pub action: Action,
    pub resource: Resource,
}

impl Operation {
    pub const fn new(action: Action, resource: Resource) -> Self {
        Self { action, resource }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Sign => "sign",
            Self::Delete => "delete",
            Self::Destroy => "destroy",
        })
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Secrets => "secrets",
            Self::Keys => "keys",
            Self::Ethereum => "ethereum",
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.resource)
    }
}

impl FromStr for Action {
    type Err = crate::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.to_string() == value)
            .ok_or_else(|| crate::Error::InvalidFormat(format!("unknown action '{value}'")))
    }
}

impl FromStr for Resource {
    type Err = crate::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.to_string() == value)
            .ok_or_else(|| crate::Error::InvalidFormat(format!("unknown resource '{value}'")))
    }
}
