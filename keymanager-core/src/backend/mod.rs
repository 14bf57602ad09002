//! Vendor adapters. Each adapter turns a vendor capability client into a
//! [`keymanager_spec::SecretStore`] or [`keymanager_spec::KeyStore`] and is the
//! only place vendor errors are translated.

pub mod aws;
pub mod azure;
pub mod hashicorp;
#[cfg(feature = "hashicorp-http")]
pub mod hashicorp_http;
pub mod memory_kv;

pub use aws::{AwsKeyStore, AwsSecretStore};
pub use azure::{AzureKeyStore, AzureSecretStore};
pub use hashicorp::HashicorpSecretStore;
#[cfg(feature = "hashicorp-http")]
pub use hashicorp_http::HashicorpClient;
pub use memory_kv::MemoryKvClient;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub(crate) fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    if value.is_empty() {
        return None;
    }
    OffsetDateTime::parse(value, &Rfc3339).ok()
}
