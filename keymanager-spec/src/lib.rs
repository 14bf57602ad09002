//! Shared contracts for the key manager: domain entities, the error taxonomy,
//! store and persistence traits, and the vendor capability surfaces.

pub mod address;
pub mod algorithm;
pub mod auth;
pub mod entities;
pub mod error;
pub mod persistence;
pub mod result_ext;
pub mod store;
pub mod transaction;
pub mod vault;
pub mod vendor;

pub use address::Address;
pub use algorithm::{Algorithm, Curve, KeyType};
pub use auth::{Action, Operation, Resource, UserInfo};
pub use entities::{Attributes, EthAccount, Key, Metadata, Secret, Tags};
pub use error::{Error, Result};
pub use persistence::{Lifecycle, Persisted, in_transaction};
pub use result_ext::ResultExt;
pub use store::{EthStore, KeyStore, Outcome, Payload, SecretStore};
pub use transaction::{PrivateArgs, Transaction};
pub use vault::{StoreCategory, VaultKind};

pub mod prelude {
    pub use crate::{
        Address, Algorithm, Attributes, Error, EthAccount, EthStore, Key, KeyStore, Outcome,
        Payload, Result, ResultExt, Secret, SecretStore, UserInfo,
    };
}
