use crate::address::Address;
use crate::algorithm::Algorithm;
use crate::entities::{Attributes, EthAccount, Key, Secret};
use crate::error::Result;
use crate::transaction::{PrivateArgs, Transaction};
use std::sync::Arc;

/// What a backing store did with a lifecycle request.
///
/// `NotApplicable` means the backend has no equivalent of the action; callers
/// keep their own bookkeeping and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    NotApplicable,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Bytes handed to a signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Arbitrary data. ECDSA signers hash it with Keccak-256 first.
    Message(&'a [u8]),
    /// A precomputed 32-byte hash, signed as is.
    Digest(&'a [u8]),
}

impl<'a> Payload<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        match self {
            Self::Message(bytes) | Self::Digest(bytes) => bytes,
        }
    }
}

pub trait SecretStore: Send + Sync {
    /// Writes a new version of `id`.
    fn set(&self, id: &str, value: &str, attrs: &Attributes) -> Result<Secret>;
    /// Reads `version`, or the latest active version when `None`.
    fn get(&self, id: &str, version: Option<&str>) -> Result<Secret>;
    fn list(&self) -> Result<Vec<String>>;
    fn delete(&self, id: &str) -> Result<Outcome>;
    fn get_deleted(&self, id: &str) -> Result<Secret>;
    fn list_deleted(&self) -> Result<Vec<String>>;
    fn restore(&self, id: &str) -> Result<Outcome>;
    fn destroy(&self, id: &str) -> Result<Outcome>;
}

pub trait KeyStore: Send + Sync {
    fn create(&self, id: &str, algorithm: &Algorithm, attrs: &Attributes) -> Result<Key>;
    fn import(
        &self,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attrs: &Attributes,
    ) -> Result<Key>;
    fn get(&self, id: &str) -> Result<Key>;
    fn list(&self) -> Result<Vec<String>>;
    fn update(&self, id: &str, attrs: &Attributes) -> Result<Key>;
    fn delete(&self, id: &str) -> Result<Outcome>;
    fn get_deleted(&self, id: &str) -> Result<Key>;
    fn list_deleted(&self) -> Result<Vec<String>>;
    fn restore(&self, id: &str) -> Result<Outcome>;
    fn destroy(&self, id: &str) -> Result<Outcome>;
    /// ECDSA signatures are 64 bytes `r || s` with low `s`.
    fn sign(&self, id: &str, payload: Payload<'_>, algorithm: &Algorithm) -> Result<Vec<u8>>;
}

/// Ethereum accounts keyed by address. Signatures are 65 bytes `r || s || v`
/// with `v` the raw recovery id (0 or 1).
pub trait EthStore: Send + Sync {
    fn create(&self, id: &str, attrs: &Attributes) -> Result<EthAccount>;
    fn import(&self, id: &str, private_key: &[u8], attrs: &Attributes) -> Result<EthAccount>;
    fn get(&self, address: &Address) -> Result<EthAccount>;
    fn list(&self) -> Result<Vec<Address>>;
    fn update(&self, address: &Address, attrs: &Attributes) -> Result<EthAccount>;
    fn delete(&self, address: &Address) -> Result<Outcome>;
    fn get_deleted(&self, address: &Address) -> Result<EthAccount>;
    fn list_deleted(&self) -> Result<Vec<Address>>;
    fn restore(&self, address: &Address) -> Result<Outcome>;
    fn destroy(&self, address: &Address) -> Result<Outcome>;
    /// Signs Keccak-256 of `data`.
    fn sign(&self, address: &Address, data: &[u8]) -> Result<Vec<u8>>;
    /// Signs an EIP-191 personal message.
    fn sign_message(&self, address: &Address, message: &[u8]) -> Result<Vec<u8>>;
    /// Legacy signing hash when `chain_id` is `None`, EIP-155 otherwise.
    fn sign_transaction(
        &self,
        address: &Address,
        chain_id: Option<u64>,
        tx: &Transaction,
    ) -> Result<Vec<u8>>;
    fn sign_eea(
        &self,
        address: &Address,
        chain_id: u64,
        tx: &Transaction,
        args: &PrivateArgs,
    ) -> Result<Vec<u8>>;
    /// Quorum private transaction, hashed like a legacy transaction.
    fn sign_private(&self, address: &Address, tx: &Transaction) -> Result<Vec<u8>>;
}

macro_rules! delegate_secret_store {
    ($ty:ty) => {
        impl<T> SecretStore for $ty
        where
            T: SecretStore + ?Sized,
        {
            fn set(&self, id: &str, value: &str, attrs: &Attributes) -> Result<Secret> {
                (**self).set(id, value, attrs)
            }
            fn get(&self, id: &str, version: Option<&str>) -> Result<Secret> {
                (**self).get(id, version)
            }
            fn list(&self) -> Result<Vec<String>> {
                (**self).list()
            }
            fn delete(&self, id: &str) -> Result<Outcome> {
                (**self).delete(id)
            }
            fn get_deleted(&self, id: &str) -> Result<Secret> {
                (**self).get_deleted(id)
            }
            fn list_deleted(&self) -> Result<Vec<String>> {
                (**self).list_deleted()
            }
            fn restore(&self, id: &str) -> Result<Outcome> {
                (**self).restore(id)
            }
            fn destroy(&self, id: &str) -> Result<Outcome> {
                (**self).destroy(id)
            }
        }
    };
}

delegate_secret_store!(Arc<T>);
delegate_secret_store!(Box<T>);

impl<T> KeyStore for Arc<T>
where
    T: KeyStore + ?Sized,
{
    fn create(&self, id: &str, algorithm: &Algorithm, attrs: &Attributes) -> Result<Key> {
        (**self).create(id, algorithm, attrs)
    }

    fn import(
        &self,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attrs: &Attributes,
    ) -> Result<Key> {
        (**self).import(id, private_key, algorithm, attrs)
    }

    fn get(&self, id: &str) -> Result<Key> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<String>> {
        (**self).list()
    }

    fn update(&self, id: &str, attrs: &Attributes) -> Result<Key> {
        (**self).update(id, attrs)
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        (**self).delete(id)
    }

    fn get_deleted(&self, id: &str) -> Result<Key> {
        (**self).get_deleted(id)
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        (**self).list_deleted()
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        (**self).restore(id)
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        (**self).destroy(id)
    }

    fn sign(&self, id: &str, payload: Payload<'_>, algorithm: &Algorithm) -> Result<Vec<u8>> {
        (**self).sign(id, payload, algorithm)
    }
}
