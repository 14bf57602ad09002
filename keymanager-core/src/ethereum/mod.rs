//! Ethereum account projection over a secp256k1 key store.

pub mod address;
pub mod store;
pub mod transaction;

pub use address::{account_from_key, address_from_public_key, ecrecover};
pub use store::EthereumStore;
