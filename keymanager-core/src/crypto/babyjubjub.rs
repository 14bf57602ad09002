//! EdDSA over the Baby Jubjub twisted Edwards curve (embedded in BN254).
//!
//! Keys are 32-byte seeds. The secret scalar and nonce prefix are derived from
//! SHA-512 of the seed; the challenge is SHA-512 of `R || A || message`.
//! Public keys and `R` use the compressed 32-byte point encoding, `S` is a
//! little-endian scalar, so signatures are 64 bytes.

use ark_ec::{CurveGroup, Group};
use ark_ed_on_bn254::{EdwardsAffine, EdwardsProjective, Fr};
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use keymanager_spec::{Error, Result};
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

const POINT_LEN: usize = 32;

struct Expanded {
    scalar: Fr,
    prefix: Zeroizing<Vec<u8>>,
}

fn expand(private_key: &[u8]) -> Result<Expanded> {
    if private_key.len() != 32 {
        return Err(Error::InvalidParameter(format!(
            "babyjubjub private key must be 32 bytes, got {}",
            private_key.len()
        )));
    }
    let hash = Zeroizing::new(Sha512::digest(private_key).to_vec());
    Ok(Expanded {
        scalar: Fr::from_le_bytes_mod_order(&hash[..32]),
        prefix: Zeroizing::new(hash[32..].to_vec()),
    })
}

fn encode_point(point: &EdwardsProjective) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(POINT_LEN);
    point
        .into_affine()
        .serialize_compressed(&mut out)
        .map_err(|err| Error::DependencyFailure(format!("point encoding: {err}")))?;
    Ok(out)
}

fn decode_point(bytes: &[u8]) -> Option<EdwardsProjective> {
    EdwardsAffine::deserialize_compressed(bytes)
        .ok()
        .map(EdwardsProjective::from)
}

fn challenge(r: &[u8], public: &[u8], data: &[u8]) -> Fr {
    let mut hasher = Sha512::new();
    hasher.update(r);
    hasher.update(public);
    hasher.update(data);
    Fr::from_le_bytes_mod_order(&hasher.finalize())
}

pub fn public_key(private_key: &[u8]) -> Result<Vec<u8>> {
    let expanded = expand(private_key)?;
    encode_point(&(EdwardsProjective::generator() * expanded.scalar))
}

pub fn sign(private_key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let expanded = expand(private_key)?;
    let public = encode_point(&(EdwardsProjective::generator() * expanded.scalar))?;

    let mut hasher = Sha512::new();
    hasher.update(&expanded.prefix[..]);
    hasher.update(data);
    let nonce = Fr::from_le_bytes_mod_order(&hasher.finalize());

    let r = encode_point(&(EdwardsProjective::generator() * nonce))?;
    let k = challenge(&r, &public, data);
    let s = nonce + k * expanded.scalar;

    let mut signature = r;
    signature.extend_from_slice(&s.into_bigint().to_bytes_le());
    Ok(signature)
}

pub fn verify(public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    if signature.len() != 2 * POINT_LEN || public_key.len() != POINT_LEN {
        return false;
    }
    let (r_bytes, s_bytes) = signature.split_at(POINT_LEN);
    let (Some(r), Some(a)) = (decode_point(r_bytes), decode_point(public_key)) else {
        return false;
    };
    let s = Fr::from_le_bytes_mod_order(s_bytes);
    if s.into_bigint().to_bytes_le() != s_bytes {
        return false;
    }
    let k = challenge(r_bytes, public_key, data);
    EdwardsProjective::generator() * s == r + a * k
}
