#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum KeyType {
    Ecdsa,
    Eddsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Curve {
    Secp256k1,
    Babyjubjub,
    X25519,
    Bn254,
}

/// Signing algorithm a key is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Algorithm {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub key_type: KeyType,
    pub curve: Curve,
}

impl Algorithm {
    pub const fn new(key_type: KeyType, curve: Curve) -> Self {
        Self { key_type, curve }
    }

    /// ECDSA over secp256k1, the only algorithm Ethereum accounts accept.
    pub const fn ethereum() -> Self {
        Self::new(KeyType::Ecdsa, Curve::Secp256k1)
    }

    pub const fn babyjubjub() -> Self {
        Self::new(KeyType::Eddsa, Curve::Babyjubjub)
    }

    pub const fn x25519() -> Self {
        Self::new(KeyType::Eddsa, Curve::X25519)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ecdsa => "ecdsa",
            Self::Eddsa => "eddsa",
        })
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Secp256k1 => "secp256k1",
            Self::Babyjubjub => "babyjubjub",
            Self::X25519 => "x25519",
            Self::Bn254 => "bn254",
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.key_type, self.curve)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn algorithm_serializes_with_type_field() {
        let json = serde_json::to_value(Algorithm::ethereum()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ecdsa", "curve": "secp256k1"}));
        let back: Algorithm =
            serde_json::from_value(serde_json::json!({"type": "eddsa", "curve": "babyjubjub"}))
                .unwrap();
        assert_eq!(back, Algorithm::babyjubjub());
    }

    #[test]
    fn display_joins_type_and_curve() {
        assert_eq!(Algorithm::x25519().to_string(), "eddsa+x25519");
    }
}
