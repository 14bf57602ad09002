//! Shared conformance harness for key manager stores.
//! Intended for integration tests of the adapter and connector crates.

mod assertions;
mod capabilities;
mod env;
pub mod fakes;
mod fixtures;
mod suite;

pub use assertions::*;
pub use capabilities::*;
pub use env::*;
pub use fixtures::*;
pub use suite::*;
