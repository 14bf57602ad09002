use crate::crypto::ecdsa;
use keymanager_spec::{Address, Algorithm, Error, EthAccount, Key, Result};

/// Last 20 bytes of Keccak-256 over the uncompressed point without its prefix.
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address> {
    let uncompressed = ecdsa::decompress(public_key)?;
    let hash = ecdsa::keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Projects a secp256k1 key onto the account it controls.
pub fn account_from_key(key: &Key) -> Result<EthAccount> {
    if key.algorithm != Algorithm::ethereum() {
        return Err(Error::InvalidParameter(format!(
            "key '{}' is {}, ethereum accounts need {}",
            key.id,
            key.algorithm,
            Algorithm::ethereum()
        )));
    }
    let public_key = ecdsa::decompress(&key.public_key)?;
    Ok(EthAccount {
        address: address_from_public_key(&public_key)?,
        key_id: key.id.clone(),
        compressed_public_key: ecdsa::compress(&public_key)?,
        public_key,
        metadata: key.metadata.clone(),
        tags: key.tags.clone(),
    })
}

/// Address that produced a 65-byte `r || s || v` signature over `hash`.
///
/// `v` may be the raw recovery id or carry the legacy 27 offset.
pub fn ecrecover(hash: &[u8; 32], signature: &[u8]) -> Result<Address> {
    if signature.len() != 65 {
        return Err(Error::InvalidFormat(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    let v = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        v => {
            return Err(Error::InvalidFormat(format!("invalid recovery id {v}")));
        }
    };
    let public_key = ecdsa::recover(hash, &signature[..64], v)?;
    address_from_public_key(&public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keymanager_spec::Metadata;

    fn key(private: &str) -> Key {
        let private = hex::decode(private).unwrap();
        Key {
            id: "k1".into(),
            public_key: ecdsa::public_key(&private).unwrap(),
            algorithm: Algorithm::ethereum(),
            metadata: Metadata::new("1"),
            tags: Default::default(),
            annotations: Default::default(),
        }
    }

    #[test]
    fn known_key_maps_to_known_address() {
        let account =
            account_from_key(&key("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"))
                .unwrap();
        assert_eq!(
            account.address.to_checksum(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
        assert_eq!(account.public_key.len(), 65);
        assert_eq!(account.compressed_public_key.len(), 33);
    }

    #[test]
    fn compressed_and_uncompressed_agree() {
        let key = key("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318");
        let compressed = ecdsa::compress(&key.public_key).unwrap();
        assert_eq!(
            address_from_public_key(&compressed).unwrap(),
            address_from_public_key(&key.public_key).unwrap()
        );
    }

    #[test]
    fn non_secp256k1_keys_are_rejected() {
        let mut key = key("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318");
        key.algorithm = Algorithm::babyjubjub();
        assert_eq!(account_from_key(&key).unwrap_err().code(), "invalid_parameter");
    }

    #[test]
    fn ecrecover_accepts_both_v_conventions() {
        let key = key("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318");
        let private =
            hex::decode("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318").unwrap();
        let hash = ecdsa::keccak256(b"who signed this");
        let compact = ecdsa::sign_digest(&private, &hash).unwrap();
        let expected = address_from_public_key(&key.public_key).unwrap();
        let recid = (0..2u8)
            .find(|id| ecdsa::recover(&hash, &compact, *id).ok().as_deref() == Some(&key.public_key[..]))
            .unwrap();
        let mut sig = compact.to_vec();
        sig.push(recid);
        assert_eq!(ecrecover(&hash, &sig).unwrap(), expected);
        sig[64] += 27;
        assert_eq!(ecrecover(&hash, &sig).unwrap(), expected);
        sig[64] = 5;
        assert_eq!(ecrecover(&hash, &sig).unwrap_err().code(), "invalid_format");
    }
}
