use crate::entities::{EthAccount, Key, Metadata, Secret};
use crate::error::{Error, Result};

/// Entity that can be stored through a [`Lifecycle`] table.
pub trait Persisted: Clone + Send + Sync + 'static {
    /// Human readable entity name used in error messages.
    const KIND: &'static str;

    fn record_id(&self) -> String;
    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;
}

impl Persisted for Key {
    const KIND: &'static str = "key";

    fn record_id(&self) -> String {
        self.id.clone()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Persisted for Secret {
    const KIND: &'static str = "secret";

    fn record_id(&self) -> String {
        self.id.clone()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Persisted for EthAccount {
    const KIND: &'static str = "ethereum account";

    fn record_id(&self) -> String {
        self.address.to_hex()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Soft-delete aware persistence for one entity category, scoped by store name.
///
/// `get`/`get_all` only see active records, `get_deleted`/`get_all_deleted`
/// only see soft-deleted ones.
pub trait Lifecycle<T: Persisted>: Send + Sync {
    /// Fails with `AlreadyExists` when the id is present in either state.
    fn add(&self, store: &str, item: T) -> Result<T>;
    fn get(&self, store: &str, id: &str) -> Result<T>;
    fn get_deleted(&self, store: &str, id: &str) -> Result<T>;
    fn get_all(&self, store: &str) -> Result<Vec<T>>;
    fn get_all_deleted(&self, store: &str) -> Result<Vec<T>>;
    /// Replaces an active record.
    fn update(&self, store: &str, item: T) -> Result<T>;
    /// Active to soft-deleted.
    fn delete(&self, store: &str, id: &str) -> Result<()>;
    /// Soft-deleted to active.
    fn restore(&self, store: &str, id: &str) -> Result<()>;
    /// Removes a soft-deleted record for good.
    fn purge(&self, store: &str, id: &str) -> Result<()>;
    /// Runs `work` atomically: either every change it makes is kept or none is.
    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&dyn Lifecycle<T>) -> Result<()>,
    ) -> Result<()>;
}

/// Convenience over [`Lifecycle::run_in_transaction`] for work that produces a value.
pub fn in_transaction<T, R, F>(db: &dyn Lifecycle<T>, work: F) -> Result<R>
where
    T: Persisted,
    F: FnOnce(&dyn Lifecycle<T>) -> Result<R>,
{
    let mut work = Some(work);
    let mut output = None;
    db.run_in_transaction(&mut |tx| {
        let work = work
            .take()
            .ok_or_else(|| Error::DependencyFailure("transaction body ran twice".into()))?;
        output = Some(work(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| Error::DependencyFailure("transaction produced no result".into()))
}
