use keymanager_spec::{Error, Lifecycle, Persisted, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// In-memory lifecycle table, suitable for embedded usage and tests.
///
/// Transactions work on a copy of the table and swap it in on success. The
/// table's write lock is held for the whole transaction, including any vendor
/// call the transaction body makes, so readers and writers of the same table
/// wait until the body returns.
pub struct MemoryLifecycle<T> {
    rows: RwLock<Table<T>>,
}

impl<T> Default for MemoryLifecycle<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Table {
                rows: BTreeMap::new(),
            }),
        }
    }
}

impl<T> MemoryLifecycle<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// View handed to transactional work. Nested transactions join the outer one.
struct TxScope<T> {
    rows: Mutex<Table<T>>,
}

#[derive(Clone)]
struct Table<T> {
    rows: BTreeMap<(String, String), T>,
}

fn row_key(store: &str, id: &str) -> (String, String) {
    (store.to_string(), id.to_string())
}

fn describe<T: Persisted>(store: &str, id: &str) -> String {
    format!("{} '{id}' in store '{store}'", T::KIND)
}

impl<T: Persisted> Table<T> {
    fn add(&mut self, store: &str, item: T) -> Result<T> {
        let id = item.record_id();
        let key = row_key(store, &id);
        if self.rows.contains_key(&key) {
            return Err(Error::already_exists(describe::<T>(store, &id)));
        }
        self.rows.insert(key, item.clone());
        Ok(item)
    }

    fn find(&self, store: &str, id: &str, deleted: bool) -> Result<&T> {
        self.rows
            .get(&row_key(store, id))
            .filter(|item| item.metadata().is_deleted() == deleted)
            .ok_or_else(|| Error::not_found(describe::<T>(store, id)))
    }

    fn find_mut(&mut self, store: &str, id: &str, deleted: bool) -> Result<&mut T> {
        self.rows
            .get_mut(&row_key(store, id))
            .filter(|item| item.metadata().is_deleted() == deleted)
            .ok_or_else(|| Error::not_found(describe::<T>(store, id)))
    }

    fn all(&self, store: &str, deleted: bool) -> Vec<T> {
        self.rows
            .iter()
            .filter(|((owner, _), item)| owner == store && item.metadata().is_deleted() == deleted)
            .map(|(_, item)| item.clone())
            .collect()
    }

    fn update(&mut self, store: &str, mut item: T) -> Result<T> {
        let id = item.record_id();
        let current = self.find_mut(store, &id, false)?;
        item.metadata_mut().updated_at = OffsetDateTime::now_utc();
        item.metadata_mut().deleted_at = None;
        *current = item.clone();
        Ok(item)
    }

    fn delete(&mut self, store: &str, id: &str) -> Result<()> {
        let item = self.find_mut(store, id, false)?;
        let now = OffsetDateTime::now_utc();
        item.metadata_mut().deleted_at = Some(now);
        item.metadata_mut().updated_at = now;
        Ok(())
    }

    fn restore(&mut self, store: &str, id: &str) -> Result<()> {
        let item = self.find_mut(store, id, true)?;
        item.metadata_mut().deleted_at = None;
        item.metadata_mut().updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    fn purge(&mut self, store: &str, id: &str) -> Result<()> {
        self.find(store, id, true)?;
        self.rows.remove(&row_key(store, id));
        Ok(())
    }
}

macro_rules! table_ops {
    ($read:ident, $write:ident) => {
        fn add(&self, store: &str, item: T) -> Result<T> {
            self.rows.$write().add(store, item)
        }

        fn get(&self, store: &str, id: &str) -> Result<T> {
            self.rows.$read().find(store, id, false).cloned()
        }

        fn get_deleted(&self, store: &str, id: &str) -> Result<T> {
            self.rows.$read().find(store, id, true).cloned()
        }

        fn get_all(&self, store: &str) -> Result<Vec<T>> {
            Ok(self.rows.$read().all(store, false))
        }

        fn get_all_deleted(&self, store: &str) -> Result<Vec<T>> {
            Ok(self.rows.$read().all(store, true))
        }

        fn update(&self, store: &str, item: T) -> Result<T> {
            self.rows.$write().update(store, item)
        }

        fn delete(&self, store: &str, id: &str) -> Result<()> {
            self.rows.$write().delete(store, id)
        }

        fn restore(&self, store: &str, id: &str) -> Result<()> {
            self.rows.$write().restore(store, id)
        }

        fn purge(&self, store: &str, id: &str) -> Result<()> {
            self.rows.$write().purge(store, id)
        }
    };
}

impl<T: Persisted> Lifecycle<T> for MemoryLifecycle<T> {
    table_ops!(read, write);

    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&dyn Lifecycle<T>) -> Result<()>,
    ) -> Result<()> {
        let mut committed = self.rows.write();
        let scope = TxScope {
            rows: Mutex::new(committed.clone()),
        };
        work(&scope)?;
        *committed = scope.rows.into_inner();
        Ok(())
    }
}

impl<T: Persisted> Lifecycle<T> for TxScope<T> {
    table_ops!(lock, lock);

    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&dyn Lifecycle<T>) -> Result<()>,
    ) -> Result<()> {
        work(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keymanager_spec::{Algorithm, Key, Metadata, Tags, in_transaction};

    fn key(id: &str) -> Key {
        Key {
            id: id.to_string(),
            public_key: vec![4; 65],
            algorithm: Algorithm::ethereum(),
            metadata: Metadata::new("1"),
            tags: Tags::new(),
            annotations: Tags::new(),
        }
    }

    fn ids(keys: Vec<Key>) -> Vec<String> {
        keys.into_iter().map(|k| k.id).collect()
    }

    #[test]
    fn soft_delete_partitions_listings() {
        let db = MemoryLifecycle::<Key>::new();
        db.add("store", key("a")).unwrap();
        db.add("store", key("b")).unwrap();
        db.add("other", key("a")).unwrap();

        db.delete("store", "a").unwrap();
        assert_eq!(ids(db.get_all("store").unwrap()), vec!["b"]);
        assert_eq!(ids(db.get_all_deleted("store").unwrap()), vec!["a"]);
        assert!(db.get("store", "a").unwrap_err().is_not_found());
        assert!(db.get_deleted("store", "a").unwrap().metadata.is_deleted());
        assert_eq!(ids(db.get_all("other").unwrap()), vec!["a"]);

        db.restore("store", "a").unwrap();
        assert_eq!(ids(db.get_all("store").unwrap()), vec!["a", "b"]);
        assert!(db.get_all_deleted("store").unwrap().is_empty());
    }

    #[test]
    fn add_rejects_duplicates_in_either_state() {
        let db = MemoryLifecycle::<Key>::new();
        db.add("store", key("a")).unwrap();
        assert!(db.add("store", key("a")).unwrap_err().is_already_exists());
        db.delete("store", "a").unwrap();
        assert!(db.add("store", key("a")).unwrap_err().is_already_exists());
    }

    #[test]
    fn purge_requires_soft_delete() {
        let db = MemoryLifecycle::<Key>::new();
        db.add("store", key("a")).unwrap();
        assert!(db.purge("store", "a").unwrap_err().is_not_found());
        db.delete("store", "a").unwrap();
        db.purge("store", "a").unwrap();
        assert!(db.get_deleted("store", "a").unwrap_err().is_not_found());
        assert!(db.get("store", "a").unwrap_err().is_not_found());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = MemoryLifecycle::<Key>::new();
        db.add("store", key("a")).unwrap();

        let err = in_transaction(&db, |tx| {
            tx.delete("store", "a")?;
            tx.add("store", key("b"))?;
            Err::<(), _>(Error::DependencyFailure("vendor down".into()))
        })
        .unwrap_err();
        assert_eq!(err.code(), "dependency_failure");

        assert_eq!(ids(db.get_all("store").unwrap()), vec!["a"]);
        assert!(db.get_all_deleted("store").unwrap().is_empty());
    }

    #[test]
    fn successful_transaction_commits() {
        let db = MemoryLifecycle::<Key>::new();
        db.add("store", key("a")).unwrap();
        let count = in_transaction(&db, |tx| {
            tx.delete("store", "a")?;
            tx.add("store", key("b"))?;
            Ok(tx.get_all("store")?.len())
        })
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(ids(db.get_all_deleted("store").unwrap()), vec!["a"]);
        assert_eq!(ids(db.get_all("store").unwrap()), vec!["b"]);
    }
}
