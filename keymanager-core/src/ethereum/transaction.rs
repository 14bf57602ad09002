//! Canonical signing hashes and raw encodings of Ethereum transactions.
//!
//! Signatures handed to the encoders are 65 bytes `r || s || v` with `v` the
//! raw recovery id, as produced by [`super::EthereumStore`].

use crate::crypto::ecdsa::keccak256;
use base64::{Engine, engine::general_purpose::STANDARD};
use keymanager_spec::{Error, PrivateArgs, Result, Transaction};
use rlp::RlpStream;

const LEGACY_V_OFFSET: u64 = 27;
const EIP155_V_OFFSET: u64 = 35;
const PRIVATE_V_OFFSET: u64 = 37;

/// Big-endian bytes without leading zeros; zero encodes as the empty string.
fn uint(value: u128) -> Vec<u8> {
    trim(&value.to_be_bytes()).to_vec()
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn append_fields(stream: &mut RlpStream, tx: &Transaction) {
    stream.append(&uint(u128::from(tx.nonce)));
    stream.append(&uint(tx.gas_price));
    stream.append(&uint(u128::from(tx.gas_limit)));
    match &tx.to {
        Some(to) => stream.append(&to.as_bytes().to_vec()),
        None => stream.append_empty_data(),
    };
    stream.append(&uint(tx.value));
    stream.append(&tx.data);
}

fn decode_enclave_key(value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|err| Error::InvalidParameter(format!("enclave key '{value}' is not base64: {err}")))
}

fn append_private(stream: &mut RlpStream, args: &PrivateArgs) -> Result<()> {
    stream.append(&decode_enclave_key(&args.private_from)?);
    match (&args.privacy_group_id, args.private_for.is_empty()) {
        (Some(_), false) => {
            return Err(Error::InvalidParameter(
                "privateFor and privacyGroupId are mutually exclusive".into(),
            ));
        }
        (Some(group), true) => {
            stream.append(&decode_enclave_key(group)?);
        }
        (None, _) => {
            stream.begin_list(args.private_for.len());
            for recipient in &args.private_for {
                stream.append(&decode_enclave_key(recipient)?);
            }
        }
    }
    stream.append(&args.restriction.as_bytes().to_vec());
    Ok(())
}

/// Homestead signing hash: the six transaction fields only.
pub fn legacy_hash(tx: &Transaction) -> [u8; 32] {
    let mut stream = RlpStream::new_list(6);
    append_fields(&mut stream, tx);
    keccak256(&stream.out())
}

/// EIP-155 signing hash with replay protection for `chain_id`.
pub fn eip155_hash(tx: &Transaction, chain_id: u64) -> [u8; 32] {
    let mut stream = RlpStream::new_list(9);
    append_fields(&mut stream, tx);
    stream.append(&uint(u128::from(chain_id)));
    stream.append_empty_data();
    stream.append_empty_data();
    keccak256(&stream.out())
}

pub fn signing_hash(tx: &Transaction, chain_id: Option<u64>) -> [u8; 32] {
    match chain_id {
        Some(chain_id) => eip155_hash(tx, chain_id),
        None => legacy_hash(tx),
    }
}

/// Signing hash of an EEA private transaction.
pub fn eea_hash(tx: &Transaction, chain_id: u64, args: &PrivateArgs) -> Result<[u8; 32]> {
    let mut stream = RlpStream::new_list(12);
    append_fields(&mut stream, tx);
    stream.append(&uint(u128::from(chain_id)));
    stream.append_empty_data();
    stream.append_empty_data();
    append_private(&mut stream, args)?;
    Ok(keccak256(&stream.out()))
}

/// EIP-191 personal message hash.
pub fn message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

struct Parts<'a> {
    r: &'a [u8],
    s: &'a [u8],
    recovery_id: u64,
}

fn split(signature: &[u8]) -> Result<Parts<'_>> {
    if signature.len() != 65 {
        return Err(Error::InvalidFormat(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    let recovery_id = match signature[64] {
        id @ (0 | 1) => u64::from(id),
        id => return Err(Error::InvalidFormat(format!("invalid recovery id {id}"))),
    };
    Ok(Parts {
        r: trim(&signature[..32]),
        s: trim(&signature[32..64]),
        recovery_id,
    })
}

/// `35 + 2 * chain + id`, widened so any `u64` chain id fits.
fn eip155_v(chain_id: u64, recovery_id: u64) -> u128 {
    u128::from(EIP155_V_OFFSET) + 2 * u128::from(chain_id) + u128::from(recovery_id)
}

fn append_signature(stream: &mut RlpStream, v: u128, parts: &Parts<'_>) {
    stream.append(&uint(v));
    stream.append(&parts.r.to_vec());
    stream.append(&parts.s.to_vec());
}

/// Raw signed transaction; `v` is `27 + id` without a chain, `35 + 2 * chain + id` with one.
pub fn encode_signed(tx: &Transaction, chain_id: Option<u64>, signature: &[u8]) -> Result<Vec<u8>> {
    let parts = split(signature)?;
    let v = match chain_id {
        Some(chain_id) => eip155_v(chain_id, parts.recovery_id),
        None => u128::from(LEGACY_V_OFFSET + parts.recovery_id),
    };
    let mut stream = RlpStream::new_list(9);
    append_fields(&mut stream, tx);
    append_signature(&mut stream, v, &parts);
    Ok(stream.out().to_vec())
}

pub fn encode_signed_eea(
    tx: &Transaction,
    chain_id: u64,
    args: &PrivateArgs,
    signature: &[u8],
) -> Result<Vec<u8>> {
    let parts = split(signature)?;
    let mut stream = RlpStream::new_list(12);
    append_fields(&mut stream, tx);
    append_signature(
        &mut stream,
        eip155_v(chain_id, parts.recovery_id),
        &parts,
    );
    append_private(&mut stream, args)?;
    Ok(stream.out().to_vec())
}

/// Quorum private transaction: legacy layout with `v` of 37 or 38.
pub fn encode_signed_private(tx: &Transaction, signature: &[u8]) -> Result<Vec<u8>> {
    let parts = split(signature)?;
    let mut stream = RlpStream::new_list(9);
    append_fields(&mut stream, tx);
    append_signature(
        &mut stream,
        u128::from(PRIVATE_V_OFFSET + parts.recovery_id),
        &parts,
    );
    Ok(stream.out().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keymanager_spec::Address;

    fn eip155_example() -> Transaction {
        Transaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Some(Address::new([0x35; 20])),
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
        }
    }

    #[test]
    fn eip155_signing_hash_matches_reference() {
        assert_eq!(
            hex::encode(eip155_hash(&eip155_example(), 1)),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
        assert_eq!(signing_hash(&eip155_example(), Some(1)), eip155_hash(&eip155_example(), 1));
        assert_ne!(signing_hash(&eip155_example(), None), eip155_hash(&eip155_example(), 1));
    }

    #[test]
    fn personal_message_hash_matches_reference() {
        assert_eq!(
            hex::encode(message_hash(b"Hello World")),
            "a1de988600a42c4b4ab089b619297c17d53cffae5d5120d82d8a92d0bb3b78f2"
        );
    }

    #[test]
    fn signed_encoding_matches_reference() {
        let private = [0x46u8; 32];
        let hash = eip155_hash(&eip155_example(), 1);
        let mut signature = crate::crypto::ecdsa::sign_digest(&private, &hash)
            .unwrap()
            .to_vec();
        signature.push(0);
        let raw = encode_signed(&eip155_example(), Some(1), &signature).unwrap();
        assert_eq!(
            hex::encode(raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn largest_chain_ids_encode_without_overflow() {
        let mut signature = vec![1u8; 64];
        signature.push(1);
        let raw = encode_signed(&eip155_example(), Some(u64::MAX), &signature).unwrap();
        let v: Vec<u8> = rlp::Rlp::new(&raw).val_at(6).unwrap();
        assert_eq!(v, uint(35 + 2 * u128::from(u64::MAX) + 1));
        assert_eq!(v.len(), 9);

        let args = PrivateArgs {
            private_from: STANDARD.encode([1u8; 32]),
            private_for: vec![STANDARD.encode([2u8; 32])],
            privacy_group_id: None,
            restriction: "restricted".into(),
        };
        let raw = encode_signed_eea(&eip155_example(), u64::MAX / 2 + 1, &args, &signature).unwrap();
        let v: Vec<u8> = rlp::Rlp::new(&raw).val_at(6).unwrap();
        assert_eq!(v, uint(35 + 2 * u128::from(u64::MAX / 2 + 1) + 1));
    }

    #[test]
    fn private_encoding_uses_quorum_v() {
        let mut signature = vec![1u8; 64];
        signature.push(1);
        let raw = encode_signed_private(&eip155_example(), &signature).unwrap();
        let legacy = encode_signed(&eip155_example(), None, &signature).unwrap();
        assert_eq!(raw.len(), legacy.len());
        // v is the only differing byte: 0x26 (38) against 0x1c (28).
        let diff: Vec<(u8, u8)> = raw
            .iter()
            .zip(&legacy)
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (*a, *b))
            .collect();
        assert_eq!(diff, vec![(0x26, 0x1c)]);
    }

    #[test]
    fn eea_rejects_mixed_privacy_targets() {
        let args = PrivateArgs {
            private_from: STANDARD.encode([1u8; 32]),
            private_for: vec![STANDARD.encode([2u8; 32])],
            privacy_group_id: Some(STANDARD.encode([3u8; 32])),
            restriction: "restricted".into(),
        };
        let err = eea_hash(&eip155_example(), 2018, &args).unwrap_err();
        assert_eq!(err.code(), "invalid_parameter");
    }

    #[test]
    fn eea_hash_depends_on_recipients() {
        let mut args = PrivateArgs {
            private_from: STANDARD.encode([1u8; 32]),
            private_for: vec![STANDARD.encode([2u8; 32])],
            privacy_group_id: None,
            restriction: "restricted".into(),
        };
        let first = eea_hash(&eip155_example(), 2018, &args).unwrap();
        args.private_for = vec![STANDARD.encode([4u8; 32])];
        assert_ne!(first, eea_hash(&eip155_example(), 2018, &args).unwrap());
        args.private_for.clear();
        args.privacy_group_id = Some(STANDARD.encode([3u8; 32]));
        assert!(eea_hash(&eip155_example(), 2018, &args).is_ok());
    }

    #[test]
    fn bad_signatures_are_rejected() {
        assert_eq!(
            encode_signed(&eip155_example(), None, &[0u8; 64]).unwrap_err().code(),
            "invalid_format"
        );
        let mut sig = vec![0u8; 65];
        sig[64] = 27;
        assert!(encode_signed(&eip155_example(), None, &sig).is_err());
    }
}
