use crate::address::Address;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Legacy (pre-EIP-2718) Ethereum transaction fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: u128,
    pub data: Vec<u8>,
}

/// Privacy parameters of an EEA private transaction.
///
/// Enclave keys are base64 encoded. Either `private_for` or `privacy_group_id` is used, not both.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrivateArgs {
    pub private_from: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub private_for: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub privacy_group_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default = "default_restriction"))]
    pub restriction: String,
}

pub fn default_restriction() -> String {
    "restricted".to_string()
}
