//! ECDSA over secp256k1 with Ethereum conventions: Keccak-256 message hashing,
//! 65-byte uncompressed public keys and low-`s` compact signatures.

use super::KeyPair;
use keymanager_spec::{Error, Payload, Result};
use once_cell::sync::Lazy;
use rand::RngCore;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

pub const DIGEST_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

pub fn generate() -> Result<KeyPair> {
    let mut seed = Zeroizing::new([0u8; 32]);
    loop {
        rand::rng().fill_bytes(&mut seed[..]);
        if let Ok(secret) = SecretKey::from_slice(&seed[..]) {
            let public = PublicKey::from_secret_key(&SECP, &secret);
            return Ok(KeyPair {
                private_key: Zeroizing::new(seed.to_vec()),
                public_key: public.serialize_uncompressed().to_vec(),
            });
        }
    }
}

pub fn public_key(private_key: &[u8]) -> Result<Vec<u8>> {
    let secret = secret_key(private_key)?;
    Ok(PublicKey::from_secret_key(&SECP, &secret)
        .serialize_uncompressed()
        .to_vec())
}

/// Hash to sign for `payload`.
pub fn digest(payload: Payload<'_>) -> Result<[u8; 32]> {
    match payload {
        Payload::Message(data) => Ok(keccak256(data)),
        Payload::Digest(data) => data.try_into().map_err(|_| {
            Error::InvalidParameter(format!(
                "digest must be {DIGEST_LEN} bytes, got {}",
                data.len()
            ))
        }),
    }
}

pub fn sign_digest(private_key: &[u8], digest: &[u8; 32]) -> Result<[u8; 64]> {
    let secret = secret_key(private_key)?;
    let message = Message::from_digest_slice(digest)
        .map_err(|err| Error::InvalidParameter(format!("invalid digest: {err}")))?;
    Ok(SECP.sign_ecdsa(&message, &secret).serialize_compact())
}

pub fn verify(public_key: &[u8], digest: &[u8; 32], signature: &[u8]) -> bool {
    let Ok(public) = PublicKey::from_slice(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_compact(signature) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };
    SECP.verify_ecdsa(&message, &signature, &public).is_ok()
}

/// Recovers the uncompressed public key from a compact signature and recovery id.
pub fn recover(digest: &[u8; 32], signature: &[u8], recovery_id: u8) -> Result<Vec<u8>> {
    let id = RecoveryId::from_i32(i32::from(recovery_id))
        .map_err(|err| Error::InvalidParameter(format!("recovery id: {err}")))?;
    let signature = RecoverableSignature::from_compact(signature, id)
        .map_err(|err| Error::InvalidFormat(format!("signature parse: {err}")))?;
    let message = Message::from_digest_slice(digest)
        .map_err(|err| Error::InvalidParameter(format!("invalid digest: {err}")))?;
    SECP.recover_ecdsa(&message, &signature)
        .map(|key| key.serialize_uncompressed().to_vec())
        .map_err(|err| Error::InvalidFormat(format!("recover: {err}")))
}

/// 33-byte SEC1 compressed form of a public key.
pub fn compress(public_key: &[u8]) -> Result<Vec<u8>> {
    PublicKey::from_slice(public_key)
        .map(|key| key.serialize().to_vec())
        .map_err(|err| Error::InvalidFormat(format!("invalid secp256k1 public key: {err}")))
}

/// 65-byte uncompressed form of a public key.
pub fn decompress(public_key: &[u8]) -> Result<Vec<u8>> {
    PublicKey::from_slice(public_key)
        .map(|key| key.serialize_uncompressed().to_vec())
        .map_err(|err| Error::InvalidFormat(format!("invalid secp256k1 public key: {err}")))
}

/// Rewrites a compact signature to its low-`s` form.
pub fn normalize(signature: &[u8]) -> Result<[u8; 64]> {
    let mut parsed = Signature::from_compact(signature)
        .map_err(|err| Error::InvalidFormat(format!("invalid signature: {err}")))?;
    parsed.normalize_s();
    Ok(parsed.serialize_compact())
}

/// Converts a DER encoded signature to low-`s` compact form.
pub fn from_der(der: &[u8]) -> Result<[u8; 64]> {
    let mut parsed = Signature::from_der(der)
        .map_err(|err| Error::InvalidFormat(format!("invalid DER signature: {err}")))?;
    parsed.normalize_s();
    Ok(parsed.serialize_compact())
}

/// DER encoding of a compact signature.
pub fn to_der(signature: &[u8]) -> Result<Vec<u8>> {
    Signature::from_compact(signature)
        .map(|parsed| parsed.serialize_der().to_vec())
        .map_err(|err| Error::InvalidFormat(format!("invalid signature: {err}")))
}

/// Extracts the uncompressed point from a DER SubjectPublicKeyInfo.
///
/// For secp256k1 the point is the trailing 65 bytes of the BIT STRING.
pub fn from_spki(der: &[u8]) -> Result<Vec<u8>> {
    if der.len() < 65 {
        return Err(Error::InvalidFormat(format!(
            "public key info too short: {} bytes",
            der.len()
        )));
    }
    decompress(&der[der.len() - 65..])
}

fn secret_key(private_key: &[u8]) -> Result<SecretKey> {
    SecretKey::from_slice(private_key)
        .map_err(|err| Error::InvalidParameter(format!("invalid secp256k1 private key: {err}")))
}
