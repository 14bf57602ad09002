use super::{Gate, ImportReport};
use crate::ethereum::EthereumStore;
use keymanager_spec::auth::Action;
use keymanager_spec::{
    Address, Attributes, EthAccount, EthStore, Outcome, PrivateArgs, Result, Transaction,
};
use std::sync::Arc;

/// Ethereum store handle bound to one caller.
pub struct EthConnector {
    gate: Gate,
    store: Arc<EthereumStore>,
}

impl EthConnector {
    pub(crate) fn new(gate: Gate, store: Arc<EthereumStore>) -> Self {
        Self { gate, store }
    }

    pub fn name(&self) -> &str {
        self.gate.store()
    }

    /// Registers accounts for keys the wrapped key store has but persistence lacks.
    pub fn reconcile(&self) -> Result<ImportReport> {
        self.gate
            .run(Action::Write, "import", "*", || self.store.reconcile())
    }
}

impl EthStore for EthConnector {
    fn create(&self, id: &str, attrs: &Attributes) -> Result<EthAccount> {
        self.gate
            .run(Action::Write, "create", id, || self.store.create(id, attrs))
    }

    fn import(&self, id: &str, private_key: &[u8], attrs: &Attributes) -> Result<EthAccount> {
        self.gate.run(Action::Write, "import", id, || {
            self.store.import(id, private_key, attrs)
        })
    }

    fn get(&self, address: &Address) -> Result<EthAccount> {
        self.gate
            .run(Action::Read, "get", &address.to_hex(), || self.store.get(address))
    }

    fn list(&self) -> Result<Vec<Address>> {
        self.gate.run(Action::Read, "list", "*", || self.store.list())
    }

    fn update(&self, address: &Address, attrs: &Attributes) -> Result<EthAccount> {
        self.gate.run(Action::Write, "update", &address.to_hex(), || {
            self.store.update(address, attrs)
        })
    }

    fn delete(&self, address: &Address) -> Result<Outcome> {
        self.gate
            .run(Action::Delete, "delete", &address.to_hex(), || self.store.delete(address))
    }

    fn get_deleted(&self, address: &Address) -> Result<EthAccount> {
        self.gate.run(Action::Read, "get_deleted", &address.to_hex(), || {
            self.store.get_deleted(address)
        })
    }

    fn list_deleted(&self) -> Result<Vec<Address>> {
        self.gate
            .run(Action::Read, "list_deleted", "*", || self.store.list_deleted())
    }

    fn restore(&self, address: &Address) -> Result<Outcome> {
        self.gate.run(Action::Delete, "restore", &address.to_hex(), || {
            self.store.restore(address)
        })
    }

    fn destroy(&self, address: &Address) -> Result<Outcome> {
        self.gate.run(Action::Destroy, "destroy", &address.to_hex(), || {
            self.store.destroy(address)
        })
    }

    fn sign(&self, address: &Address, data: &[u8]) -> Result<Vec<u8>> {
        self.gate
            .run(Action::Sign, "sign", &address.to_hex(), || self.store.sign(address, data))
    }

    fn sign_message(&self, address: &Address, message: &[u8]) -> Result<Vec<u8>> {
        self.gate.run(Action::Sign, "sign_message", &address.to_hex(), || {
            self.store.sign_message(address, message)
        })
    }

    fn sign_transaction(
        &self,
        address: &Address,
        chain_id: Option<u64>,
        tx: &Transaction,
    ) -> Result<Vec<u8>> {
        self.gate.run(Action::Sign, "sign_transaction", &address.to_hex(), || {
            self.store.sign_transaction(address, chain_id, tx)
        })
    }

    fn sign_eea(
        &self,
        address: &Address,
        chain_id: u64,
        tx: &Transaction,
        args: &PrivateArgs,
    ) -> Result<Vec<u8>> {
        self.gate.run(Action::Sign, "sign_eea", &address.to_hex(), || {
            self.store.sign_eea(address, chain_id, tx, args)
        })
    }

    fn sign_private(&self, address: &Address, tx: &Transaction) -> Result<Vec<u8>> {
        self.gate.run(Action::Sign, "sign_private", &address.to_hex(), || {
            self.store.sign_private(address, tx)
        })
    }
}
