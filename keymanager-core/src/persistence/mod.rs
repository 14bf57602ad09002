//! Lifecycle persistence implementations.

pub mod memory;

pub use memory::MemoryLifecycle;

use keymanager_spec::{EthAccount, Key, Lifecycle, Secret};
use std::sync::Arc;

/// One lifecycle table per entity category.
#[derive(Clone)]
pub struct Database {
    pub keys: Arc<dyn Lifecycle<Key>>,
    pub secrets: Arc<dyn Lifecycle<Secret>>,
    pub accounts: Arc<dyn Lifecycle<EthAccount>>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            keys: Arc::new(MemoryLifecycle::new()),
            secrets: Arc::new(MemoryLifecycle::new()),
            accounts: Arc::new(MemoryLifecycle::new()),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::in_memory()
    }
}
