//! Ethereum accounts projected from a secp256k1 key store.
//!
//! Accounts are persisted by address; the wrapped key store holds the key
//! under the caller's id. Every signature is produced over a 32-byte hash and
//! returned as `r || s || v` with the recovery id found by trial.

use super::address::account_from_key;
use super::transaction;
use crate::connector::ImportReport;
use crate::crypto::ecdsa;
use keymanager_spec::{
    Address, Algorithm, Attributes, Error, EthAccount, EthStore, Key, KeyStore, Lifecycle, Outcome,
    Payload, PrivateArgs, Result, ResultExt, Transaction, in_transaction,
};
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

pub struct EthereumStore {
    name: String,
    keys: Arc<dyn KeyStore>,
    db: Arc<dyn Lifecycle<EthAccount>>,
}

impl EthereumStore {
    pub fn new(
        name: impl Into<String>,
        keys: Arc<dyn KeyStore>,
        db: Arc<dyn Lifecycle<EthAccount>>,
    ) -> Self {
        Self {
            name: name.into(),
            keys,
            db,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn persist(&self, db: &dyn Lifecycle<EthAccount>, key: Key) -> Result<EthAccount> {
        let account = account_from_key(&key)?;
        debug!(store = %self.name, address = %account.address, key_id = %account.key_id, "derived account");
        db.add(&self.name, account)
    }

    /// Writes a new key through `write` and registers its account.
    ///
    /// `id` must not back any account of this store, active or deleted. When
    /// the account cannot be registered the key is deleted and destroyed again.
    fn register(&self, id: &str, write: impl FnOnce() -> Result<Key>) -> Result<EthAccount> {
        in_transaction(self.db.as_ref(), |tx| {
            let taken = tx
                .get_all(&self.name)?
                .into_iter()
                .chain(tx.get_all_deleted(&self.name)?)
                .any(|account| account.key_id == id);
            if taken {
                return Err(Error::already_exists(format!("account key '{id}'")));
            }
            let key = write()?;
            let res = self.persist(tx, key);
            if let Err(err) = &res {
                warn!(store = %self.name, key_id = id, error = %err, "discarding key of unregistered account");
                self.discard(id);
            }
            res
        })
    }

    fn discard(&self, id: &str) {
        let res = self.keys.delete(id).and_then(|_| self.keys.destroy(id));
        if let Err(err) = res {
            warn!(store = %self.name, key_id = id, error = %err, "failed to discard key");
        }
    }

    fn sign_hash(&self, address: &Address, hash: &[u8; 32]) -> Result<Vec<u8>> {
        let account = self.get(address)?;
        let signature = self
            .keys
            .sign(&account.key_id, Payload::Digest(hash), &Algorithm::ethereum())?;
        let compact = ecdsa::normalize(&signature)?;
        let recovery_id = (0..2u8)
            .find(|id| {
                ecdsa::recover(hash, &compact, *id)
                    .map(|recovered| recovered == account.public_key)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                Error::DependencyFailure(format!(
                    "signature from key '{}' does not recover to account {}",
                    account.key_id, account.address
                ))
            })?;
        let mut out = compact.to_vec();
        out.push(recovery_id);
        Ok(out)
    }

    /// Registers accounts for keys the key store knows but persistence does not.
    pub fn reconcile(&self) -> Result<ImportReport> {
        let known: HashSet<String> = self
            .db
            .get_all(&self.name)?
            .into_iter()
            .chain(self.db.get_all_deleted(&self.name)?)
            .map(|account| account.key_id)
            .collect();

        let mut report = ImportReport::default();
        for id in self.keys.list()? {
            if known.contains(&id) {
                continue;
            }
            let res = self.keys.get(&id).and_then(|key| self.persist(self.db.as_ref(), key));
            match res {
                Ok(account) => {
                    debug!(store = %self.name, key_id = %id, address = %account.address, "imported account");
                    report.imported.push(id);
                }
                Err(err) => {
                    warn!(store = %self.name, key_id = %id, error = %err, "failed to import account");
                    report.failed.push(id);
                }
            }
        }
        Ok(report)
    }
}

impl EthStore for EthereumStore {
    fn create(&self, id: &str, attrs: &Attributes) -> Result<EthAccount> {
        self.register(id, || self.keys.create(id, &Algorithm::ethereum(), attrs))
    }

    fn import(&self, id: &str, private_key: &[u8], attrs: &Attributes) -> Result<EthAccount> {
        self.register(id, || {
            self.keys
                .import(id, private_key, &Algorithm::ethereum(), attrs)
        })
    }

    fn get(&self, address: &Address) -> Result<EthAccount> {
        self.db.get(&self.name, &address.to_hex())
    }

    fn list(&self) -> Result<Vec<Address>> {
        Ok(self
            .db
            .get_all(&self.name)?
            .into_iter()
            .map(|account| account.address)
            .collect())
    }

    fn update(&self, address: &Address, attrs: &Attributes) -> Result<EthAccount> {
        let mut account = self.get(address)?;
        match self.keys.update(&account.key_id, attrs) {
            Ok(_) => {}
            Err(Error::NotSupported(_)) => {}
            Err(err) => return Err(err),
        }
        account.tags = attrs.tags.clone();
        account.metadata.expire_at = attrs.expire_at(OffsetDateTime::now_utc());
        self.db.update(&self.name, account)
    }

    fn delete(&self, address: &Address) -> Result<Outcome> {
        in_transaction(self.db.as_ref(), |tx| {
            let account = tx.get(&self.name, &address.to_hex())?;
            tx.delete(&self.name, &address.to_hex())?;
            self.keys
                .delete(&account.key_id)
                .context_with(|| format!("account {address}"))
        })
    }

    fn get_deleted(&self, address: &Address) -> Result<EthAccount> {
        self.db.get_deleted(&self.name, &address.to_hex())
    }

    fn list_deleted(&self) -> Result<Vec<Address>> {
        Ok(self
            .db
            .get_all_deleted(&self.name)?
            .into_iter()
            .map(|account| account.address)
            .collect())
    }

    fn restore(&self, address: &Address) -> Result<Outcome> {
        in_transaction(self.db.as_ref(), |tx| {
            let account = tx.get_deleted(&self.name, &address.to_hex())?;
            tx.restore(&self.name, &address.to_hex())?;
            self.keys
                .restore(&account.key_id)
                .context_with(|| format!("account {address}"))
        })
    }

    fn destroy(&self, address: &Address) -> Result<Outcome> {
        in_transaction(self.db.as_ref(), |tx| {
            if tx.get(&self.name, &address.to_hex()).is_ok() {
                return Err(Error::StatusConflict(format!(
                    "account {address} must be deleted before it is destroyed"
                )));
            }
            let account = tx.get_deleted(&self.name, &address.to_hex())?;
            tx.purge(&self.name, &address.to_hex())?;
            self.keys
                .destroy(&account.key_id)
                .context_with(|| format!("account {address}"))
        })
    }

    fn sign(&self, address: &Address, data: &[u8]) -> Result<Vec<u8>> {
        self.sign_hash(address, &ecdsa::keccak256(data))
    }

    fn sign_message(&self, address: &Address, message: &[u8]) -> Result<Vec<u8>> {
        self.sign_hash(address, &transaction::message_hash(message))
    }

    fn sign_transaction(
        &self,
        address: &Address,
        chain_id: Option<u64>,
        tx: &Transaction,
    ) -> Result<Vec<u8>> {
        self.sign_hash(address, &transaction::signing_hash(tx, chain_id))
    }

    fn sign_eea(
        &self,
        address: &Address,
        chain_id: u64,
        tx: &Transaction,
        args: &PrivateArgs,
    ) -> Result<Vec<u8>> {
        self.sign_hash(address, &transaction::eea_hash(tx, chain_id, args)?)
    }

    fn sign_private(&self, address: &Address, tx: &Transaction) -> Result<Vec<u8>> {
        self.sign_hash(address, &transaction::legacy_hash(tx))
    }
}
