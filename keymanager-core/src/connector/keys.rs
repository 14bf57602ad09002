use super::{Gate, ImportReport};
use crate::crypto;
use keymanager_spec::auth::Action;
use keymanager_spec::{
    Algorithm, Attributes, Error, Key, KeyStore, Lifecycle, Outcome, Payload, Result,
    in_transaction,
};
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Key store handle bound to one caller.
///
/// Reads are served from persistence. Lifecycle changes update persistence
/// first and then the backing store inside one transaction, so a failing
/// backing call leaves the record untouched.
pub struct KeyConnector {
    gate: Gate,
    store: Arc<dyn KeyStore>,
    db: Arc<dyn Lifecycle<Key>>,
}

impl KeyConnector {
    pub(crate) fn new(gate: Gate, store: Arc<dyn KeyStore>, db: Arc<dyn Lifecycle<Key>>) -> Self {
        Self { gate, store, db }
    }

    pub fn name(&self) -> &str {
        self.gate.store()
    }

    fn add_new(
        &self,
        id: &str,
        produce: impl FnOnce() -> Result<Key>,
    ) -> Result<Key> {
        let store = self.gate.store();
        in_transaction(self.db.as_ref(), |tx| {
            if tx.get(store, id).is_ok() || tx.get_deleted(store, id).is_ok() {
                return Err(Error::already_exists(format!("key '{id}'")));
            }
            let key = produce()?;
            tx.add(store, key)
        })
    }

    /// Checks `signature` against the recorded public key of `id`.
    pub fn verify(&self, id: &str, payload: Payload<'_>, signature: &[u8]) -> Result<bool> {
        self.gate.run(Action::Read, "verify", id, || {
            let key = self.db.get(self.gate.store(), id)?;
            crypto::verify(&key.public_key, payload, signature, &key.algorithm)
        })
    }

    /// Adds persistence records for keys the backing store has but persistence lacks.
    pub fn reconcile(&self) -> Result<ImportReport> {
        self.gate.run(Action::Write, "import", "*", || {
            let store = self.gate.store();
            let known: HashSet<String> = self
                .db
                .get_all(store)?
                .into_iter()
                .chain(self.db.get_all_deleted(store)?)
                .map(|key| key.id)
                .collect();

            let mut report = ImportReport::default();
            for id in self.store.list()? {
                if known.contains(&id) {
                    continue;
                }
                match self.store.get(&id).and_then(|key| self.db.add(store, key)) {
                    Ok(_) => report.imported.push(id),
                    Err(err) => {
                        warn!(store, id = %id, error = %err, "failed to import key");
                        report.failed.push(id);
                    }
                }
            }
            Ok(report)
        })
    }
}

impl KeyStore for KeyConnector {
    fn create(&self, id: &str, algorithm: &Algorithm, attrs: &Attributes) -> Result<Key> {
        self.gate.run(Action::Write, "create", id, || {
            self.add_new(id, || self.store.create(id, algorithm, attrs))
        })
    }

    fn import(
        &self,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attrs: &Attributes,
    ) -> Result<Key> {
        self.gate.run(Action::Write, "import", id, || {
            self.add_new(id, || self.store.import(id, private_key, algorithm, attrs))
        })
    }

    fn get(&self, id: &str) -> Result<Key> {
        self.gate
            .run(Action::Read, "get", id, || self.db.get(self.gate.store(), id))
    }

    fn list(&self) -> Result<Vec<String>> {
        self.gate.run(Action::Read, "list", "*", || {
            Ok(self
                .db
                .get_all(self.gate.store())?
                .into_iter()
                .map(|key| key.id)
                .collect())
        })
    }

    fn update(&self, id: &str, attrs: &Attributes) -> Result<Key> {
        self.gate.run(Action::Write, "update", id, || {
            let store = self.gate.store();
            in_transaction(self.db.as_ref(), |tx| {
                let mut key = tx.get(store, id)?;
                match self.store.update(id, attrs) {
                    Ok(updated) => key.tags = updated.tags,
                    Err(Error::NotSupported(_)) => {
                        debug!(id, "backing store keeps no attributes, updating record only");
                        key.tags = attrs.tags.clone();
                    }
                    Err(err) => return Err(err),
                }
                key.metadata.expire_at = attrs.expire_at(OffsetDateTime::now_utc());
                tx.update(store, key)
            })
        })
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        self.gate.run(Action::Delete, "delete", id, || {
            in_transaction(self.db.as_ref(), |tx| {
                tx.delete(self.gate.store(), id)?;
                self.store.delete(id)
            })
        })
    }

    fn get_deleted(&self, id: &str) -> Result<Key> {
        self.gate.run(Action::Read, "get_deleted", id, || {
            self.db.get_deleted(self.gate.store(), id)
        })
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        self.gate.run(Action::Read, "list_deleted", "*", || {
            Ok(self
                .db
                .get_all_deleted(self.gate.store())?
                .into_iter()
                .map(|key| key.id)
                .collect())
        })
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        self.gate.run(Action::Delete, "restore", id, || {
            in_transaction(self.db.as_ref(), |tx| {
                tx.restore(self.gate.store(), id)?;
                self.store.restore(id)
            })
        })
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        self.gate.run(Action::Destroy, "destroy", id, || {
            let store = self.gate.store();
            in_transaction(self.db.as_ref(), |tx| {
                if tx.get(store, id).is_ok() {
                    return Err(Error::StatusConflict(format!(
                        "key '{id}' must be deleted before it is destroyed"
                    )));
                }
                tx.purge(store, id)?;
                self.store.destroy(id)
            })
        })
    }

    /// Refuses to sign with an algorithm other than the one the key was created for.
    fn sign(&self, id: &str, payload: Payload<'_>, algorithm: &Algorithm) -> Result<Vec<u8>> {
        self.gate.run(Action::Sign, "sign", id, || {
            let key = self.db.get(self.gate.store(), id)?;
            if key.algorithm != *algorithm {
                return Err(Error::InvalidParameter(format!(
                    "key '{id}' was created for {}, not {algorithm}",
                    key.algorithm
                )));
            }
            self.store.sign(id, payload, algorithm)
        })
    }
}
