//! Nexus pairing engine.
//!
//! A broker is provisioned once with a nexus code and a TOTP secret. An
//! agent pairs by submitting the nexus code plus the six-digit code the
//! broker's device currently shows; a match opens a `pending` request the
//! broker then accepts or rejects. Each agent may cancel (pardon) exactly
//! one pending request over their lifetime.

pub mod engine;
pub mod error;

pub use engine::{CurrentCode, PairingEngine, ProvisionedLink, PARDON_LIMIT};
pub use error::PairingError;
