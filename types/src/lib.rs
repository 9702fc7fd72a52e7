//! Fundamental types for the Nexus trust subsystem.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! participant identifiers, timestamps and clocks, pairing and verification
//! states, caller roles, and the tunable parameters of both engines.

pub mod error;
pub mod id;
pub mod params;
pub mod state;
pub mod time;

pub use error::{ErrorKind, ParseError};
pub use id::{AgentId, BrokerId, NexusCode, RequestId, UserId};
pub use params::{PairingParams, VerificationParams};
pub use state::{
    AccessStatus, LivenessStatus, PairingAction, PairingStatus, Role, VerificationOutcome,
};
pub use time::{Clock, SystemClock, Timestamp};
