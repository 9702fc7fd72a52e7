//! LMDB storage backend for the Nexus trust subsystem.
//!
//! Implements every storage trait from `nexus-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more LMDB databases within a
//! single environment; values are `bincode` encoded.

pub mod activity;
pub mod environment;
pub mod error;
mod keys;
pub mod nexus_link;
pub mod pairing;
pub mod verification;

pub use environment::{LmdbStore, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
