//! Key generation, signing and verification for the algorithms the local key
//! store supports.

pub mod babyjubjub;
pub mod ecdsa;
pub mod ed25519;

use keymanager_spec::{Algorithm, Curve, Error, KeyType, Payload, Result};
use rand::RngCore;
use zeroize::Zeroizing;

/// Freshly generated or imported key material. The private half is wiped on drop.
pub struct KeyPair {
    pub private_key: Zeroizing<Vec<u8>>,
    pub public_key: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    EcdsaSecp256k1,
    EddsaBabyjubjub,
    EddsaX25519,
}

fn scheme(algorithm: &Algorithm) -> Result<Scheme> {
    match (algorithm.key_type, algorithm.curve) {
        (KeyType::Ecdsa, Curve::Secp256k1) => Ok(Scheme::EcdsaSecp256k1),
        (KeyType::Eddsa, Curve::Babyjubjub) => Ok(Scheme::EddsaBabyjubjub),
        (KeyType::Eddsa, Curve::X25519) => Ok(Scheme::EddsaX25519),
        _ => Err(Error::InvalidParameter(format!(
            "unsupported signing algorithm {algorithm}"
        ))),
    }
}

pub fn generate(algorithm: &Algorithm) -> Result<KeyPair> {
    match scheme(algorithm)? {
        Scheme::EcdsaSecp256k1 => ecdsa::generate(),
        Scheme::EddsaBabyjubjub => from_private(algorithm, &random_seed()[..]),
        Scheme::EddsaX25519 => from_private(algorithm, &random_seed()[..]),
    }
}

/// Validates `private_key` for `algorithm` and derives its public key.
pub fn from_private(algorithm: &Algorithm, private_key: &[u8]) -> Result<KeyPair> {
    let public_key = match scheme(algorithm)? {
        Scheme::EcdsaSecp256k1 => ecdsa::public_key(private_key)?,
        Scheme::EddsaBabyjubjub => babyjubjub::public_key(private_key)?,
        Scheme::EddsaX25519 => ed25519::public_key(private_key)?,
    };
    Ok(KeyPair {
        private_key: Zeroizing::new(private_key.to_vec()),
        public_key,
    })
}

pub fn sign(algorithm: &Algorithm, private_key: &[u8], payload: Payload<'_>) -> Result<Vec<u8>> {
    match scheme(algorithm)? {
        Scheme::EcdsaSecp256k1 => {
            let digest = ecdsa::digest(payload)?;
            Ok(ecdsa::sign_digest(private_key, &digest)?.to_vec())
        }
        Scheme::EddsaBabyjubjub => babyjubjub::sign(private_key, payload.bytes()),
        Scheme::EddsaX25519 => ed25519::sign(private_key, payload.bytes()),
    }
}

/// Checks `signature` over `payload` against `public_key`.
///
/// Malformed keys or signatures are reported as `Ok(false)`.
pub fn verify(
    public_key: &[u8],
    payload: Payload<'_>,
    signature: &[u8],
    algorithm: &Algorithm,
) -> Result<bool> {
    match scheme(algorithm)? {
        Scheme::EcdsaSecp256k1 => {
            let digest = ecdsa::digest(payload)?;
            Ok(ecdsa::verify(public_key, &digest, signature))
        }
        Scheme::EddsaBabyjubjub => Ok(babyjubjub::verify(public_key, payload.bytes(), signature)),
        Scheme::EddsaX25519 => Ok(ed25519::verify(public_key, payload.bytes(), signature)),
    }
}

fn random_seed() -> Zeroizing<[u8; 32]> {
    let mut seed = Zeroizing::new([0u8; 32]);
    rand::rng().fill_bytes(&mut seed[..]);
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_combinations_are_invalid_parameters() {
        for algorithm in [
            Algorithm::new(KeyType::Ecdsa, Curve::Babyjubjub),
            Algorithm::new(KeyType::Eddsa, Curve::Secp256k1),
            Algorithm::new(KeyType::Ecdsa, Curve::Bn254),
        ] {
            let err = generate(&algorithm).err().expect("unsupported");
            assert_eq!(err.code(), "invalid_parameter");
        }
    }

    #[test]
    fn every_scheme_signs_and_verifies() {
        for algorithm in [
            Algorithm::ethereum(),
            Algorithm::babyjubjub(),
            Algorithm::x25519(),
        ] {
            let pair = generate(&algorithm).unwrap();
            for data in [&b""[..], b"hello", b"a somewhat longer payload to sign"] {
                let sig = sign(&algorithm, &pair.private_key, Payload::Message(data)).unwrap();
                assert!(verify(&pair.public_key, Payload::Message(data), &sig, &algorithm).unwrap());
                assert!(
                    !verify(&pair.public_key, Payload::Message(b"other"), &sig, &algorithm).unwrap()
                );
            }
        }
    }

    #[test]
    fn import_derives_same_public_key() {
        for algorithm in [
            Algorithm::ethereum(),
            Algorithm::babyjubjub(),
            Algorithm::x25519(),
        ] {
            let pair = generate(&algorithm).unwrap();
            let again = from_private(&algorithm, &pair.private_key).unwrap();
            assert_eq!(pair.public_key, again.public_key);
        }
    }
}
