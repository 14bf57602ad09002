//! In-memory stand-ins for the vendor clients, faithful enough for the
//! adapters' translation and lifecycle paths: real secp256k1 keys, vendor
//! status codes, soft-delete windows.

mod aws;
mod azure;

pub use aws::{FakeKms, FakeSecretsManager};
pub use azure::FakeAzureClient;

use once_cell::sync::Lazy;
use rand::RngCore;
use secp256k1::{All, Secp256k1, SecretKey};

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

fn secp() -> &'static Secp256k1<All> {
    &SECP
}

fn random_secret_key() -> SecretKey {
    let mut seed = [0u8; 32];
    loop {
        rand::rng().fill_bytes(&mut seed);
        if let Ok(key) = SecretKey::from_slice(&seed) {
            return key;
        }
    }
}

fn next_version(counter: &mut u64) -> String {
    *counter += 1;
    format!("{:032x}", *counter)
}
