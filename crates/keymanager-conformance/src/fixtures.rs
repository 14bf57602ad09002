use keymanager_spec::{Attributes, Tags};
use rand::RngCore;

pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    rand::rng().fill_bytes(&mut buf);
    buf
}

/// Payloads every signer must handle, the empty one included.
pub fn sign_payloads() -> Vec<Vec<u8>> {
    vec![Vec::new(), b"hello".to_vec(), random_bytes(1024)]
}

pub fn secret_value() -> String {
    random_bytes(16).iter().map(|b| format!("{b:02x}")).collect()
}

pub fn tagged(pairs: &[(&str, &str)]) -> Attributes {
    let tags: Tags = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Attributes::with_tags(tags)
}
