//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engines (clock, storage, object store,
//! OCR, biometrics) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - return deterministic, scripted values
//! - can be controlled programmatically (advance time, inject failures)
//! - never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod providers;
pub mod store;

pub use clock::NullClock;
pub use providers::{NullBiometrics, NullDocumentAnalyzer, NullObjectStore};
pub use store::NullStore;
