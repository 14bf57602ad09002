#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vendor family a vault handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VaultKind {
    Hashicorp,
    Azure,
    Aws,
}

impl VaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hashicorp => "hashicorp",
            Self::Azure => "azure",
            Self::Aws => "aws",
        }
    }
}

impl fmt::Display for VaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaultKind {
    type Err = crate::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "hashicorp" => Ok(Self::Hashicorp),
            "azure" => Ok(Self::Azure),
            "aws" => Ok(Self::Aws),
            other => Err(crate::Error::InvalidParameter(format!(
                "unknown vault kind '{other}'"
            ))),
        }
    }
}

/// Category a store is registered under. Names are unique per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StoreCategory {
    Secret,
    Key,
    Ethereum,
}

impl fmt::Display for StoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Secret => "secret",
            Self::Key => "key",
            Self::Ethereum => "ethereum",
        })
    }
}
