//! EdDSA keys on Curve25519, used for keys labelled `eddsa+x25519`.
//!
//! The private key is the 32-byte seed; signatures are plain Ed25519.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use keymanager_spec::{Error, Result};

fn signing_key(private_key: &[u8]) -> Result<SigningKey> {
    let seed: [u8; 32] = private_key.try_into().map_err(|_| {
        Error::InvalidParameter(format!(
            "x25519 private key must be 32 bytes, got {}",
            private_key.len()
        ))
    })?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn public_key(private_key: &[u8]) -> Result<Vec<u8>> {
    Ok(signing_key(private_key)?.verifying_key().to_bytes().to_vec())
}

pub fn sign(private_key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    Ok(signing_key(private_key)?.sign(data).to_bytes().to_vec())
}

pub fn verify(public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let Ok(public) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&public) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(data, &signature).is_ok()
}
