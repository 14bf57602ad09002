use super::{Gate, ImportReport};
use crate::local::is_key_secret;
use keymanager_spec::auth::Action;
use keymanager_spec::{
    Attributes, Error, Lifecycle, Outcome, Result, Secret, SecretStore, in_transaction,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Secret store handle bound to one caller.
///
/// Persistence keeps one record per secret id without its value; the backing
/// store remains the only holder of secret values.
pub struct SecretConnector {
    gate: Gate,
    store: Arc<dyn SecretStore>,
    db: Arc<dyn Lifecycle<Secret>>,
}

/// Ids under the key material prefix belong to local key stores.
fn ensure_plain(id: &str) -> Result<()> {
    if is_key_secret(id) {
        return Err(Error::InvalidParameter(format!(
            "secret id '{id}' is reserved for key material"
        )));
    }
    Ok(())
}

fn record(secret: &Secret) -> Secret {
    Secret {
        value: String::new(),
        ..secret.clone()
    }
}

impl SecretConnector {
    pub(crate) fn new(gate: Gate, store: Arc<dyn SecretStore>, db: Arc<dyn Lifecycle<Secret>>) -> Self {
        Self { gate, store, db }
    }

    pub fn name(&self) -> &str {
        self.gate.store()
    }

    /// Adds persistence records for secrets the backing store has but persistence lacks.
    pub fn reconcile(&self) -> Result<ImportReport> {
        self.gate.run(Action::Write, "import", "*", || {
            let store = self.gate.store();
            let known: HashSet<String> = self
                .db
                .get_all(store)?
                .into_iter()
                .chain(self.db.get_all_deleted(store)?)
                .map(|secret| secret.id)
                .collect();

            let mut report = ImportReport::default();
            for id in self.store.list()? {
                if known.contains(&id) || is_key_secret(&id) {
                    continue;
                }
                let res = self
                    .store
                    .get(&id, None)
                    .and_then(|secret| self.db.add(store, record(&secret)));
                match res {
                    Ok(_) => report.imported.push(id),
                    Err(err) => {
                        warn!(store, id = %id, error = %err, "failed to import secret");
                        report.failed.push(id);
                    }
                }
            }
            Ok(report)
        })
    }
}

impl SecretStore for SecretConnector {
    fn set(&self, id: &str, value: &str, attrs: &Attributes) -> Result<Secret> {
        self.gate.run(Action::Write, "set", id, || {
            ensure_plain(id)?;
            let store = self.gate.store();
            in_transaction(self.db.as_ref(), |tx| {
                if tx.get_deleted(store, id).is_ok() {
                    return Err(Error::already_exists(format!(
                        "deleted secret '{id}', restore or destroy it first"
                    )));
                }
                let exists = tx.get(store, id).is_ok();
                let secret = self.store.set(id, value, attrs)?;
                if exists {
                    tx.update(store, record(&secret))?;
                } else {
                    tx.add(store, record(&secret))?;
                }
                Ok(secret)
            })
        })
    }

    fn get(&self, id: &str, version: Option<&str>) -> Result<Secret> {
        self.gate.run(Action::Read, "get", id, || {
            ensure_plain(id)?;
            self.db.get(self.gate.store(), id)?;
            self.store.get(id, version)
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        self.gate.run(Action::Read, "list", "*", || {
            Ok(self
                .db
                .get_all(self.gate.store())?
                .into_iter()
                .map(|secret| secret.id)
                .collect())
        })
    }

    fn delete(&self, id: &str) -> Result<Outcome> {
        self.gate.run(Action::Delete, "delete", id, || {
            ensure_plain(id)?;
            in_transaction(self.db.as_ref(), |tx| {
                tx.delete(self.gate.store(), id)?;
                self.store.delete(id)
            })
        })
    }

    fn get_deleted(&self, id: &str) -> Result<Secret> {
        self.gate.run(Action::Read, "get_deleted", id, || {
            ensure_plain(id)?;
            self.db.get_deleted(self.gate.store(), id)
        })
    }

    fn list_deleted(&self) -> Result<Vec<String>> {
        self.gate.run(Action::Read, "list_deleted", "*", || {
            Ok(self
                .db
                .get_all_deleted(self.gate.store())?
                .into_iter()
                .map(|secret| secret.id)
                .collect())
        })
    }

    fn restore(&self, id: &str) -> Result<Outcome> {
        self.gate.run(Action::Delete, "restore", id, || {
            ensure_plain(id)?;
            in_transaction(self.db.as_ref(), |tx| {
                tx.restore(self.gate.store(), id)?;
                self.store.restore(id)
            })
        })
    }

    fn destroy(&self, id: &str) -> Result<Outcome> {
        self.gate.run(Action::Destroy, "destroy", id, || {
            ensure_plain(id)?;
            let store = self.gate.store();
            in_transaction(self.db.as_ref(), |tx| {
                if tx.get(store, id).is_ok() {
                    return Err(Error::StatusConflict(format!(
                        "secret '{id}' must be deleted before it is destroyed"
                    )));
                }
                tx.purge(store, id)?;
                self.store.destroy(id)
            })
        })
    }
}
