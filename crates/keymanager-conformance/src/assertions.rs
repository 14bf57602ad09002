use anyhow::{Context, Result, bail};
use keymanager_spec::Result as StoreResult;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1};
use sha3::{Digest, Keccak256};

pub fn assert_listed(ids: &[String], id: &str, what: &str) -> Result<()> {
    if !ids.iter().any(|item| item == id) {
        bail!("{what} did not return {id} (got {ids:?})");
    }
    Ok(())
}

pub fn assert_not_listed(ids: &[String], id: &str, what: &str) -> Result<()> {
    if ids.iter().any(|item| item == id) {
        bail!("{what} still returns {id}");
    }
    Ok(())
}

/// Fails unless `res` is an error of kind `code`.
pub fn assert_kind<T: std::fmt::Debug>(res: StoreResult<T>, code: &str, what: &str) -> Result<()> {
    match res {
        Ok(value) => bail!("{what}: expected {code}, got {value:?}"),
        Err(err) if err.code() == code => Ok(()),
        Err(err) => bail!("{what}: expected {code}, got {} ({err})", err.code()),
    }
}

/// Checks a 64-byte `r || s` signature over Keccak-256 of `message`.
pub fn assert_secp256k1_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let secp = Secp256k1::verification_only();
    let public = PublicKey::from_slice(public_key).context("public key is not a secp256k1 point")?;
    let signature = Signature::from_compact(signature).context("signature is not r || s")?;
    let digest: [u8; 32] = Keccak256::digest(message).into();
    let len = message.len();
    let message = Message::from_digest_slice(&digest).context("digest")?;
    secp.verify_ecdsa(&message, &signature, &public)
        .with_context(|| format!("signature over {len} bytes did not verify"))
}
