//! Abstract storage traits for the Nexus trust subsystem.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The engines depend only on the traits.
//!
//! Backends own the concurrency guarantees: uniqueness constraints,
//! conditional updates and the pardon re-check must each execute atomically
//! so that concurrent callers cannot both succeed.

pub mod activity;
pub mod error;
pub mod nexus_link;
pub mod pairing;
pub mod verification;

pub use activity::{ActionType, ActivityLogEntry, ActivityLogStore, NewActivity};
pub use error::StoreError;
pub use nexus_link::{NexusLink, NexusLinkStore};
pub use pairing::{CancelOutcome, PairingRequest, PairingStore};
pub use verification::{VerificationRecord, VerificationRecordStore};

/// Every store the engines need, as one object-safe bound.
pub trait NexusStore:
    NexusLinkStore + PairingStore + ActivityLogStore + VerificationRecordStore + Send + Sync
{
}

impl<T> NexusStore for T where
    T: NexusLinkStore + PairingStore + ActivityLogStore + VerificationRecordStore + Send + Sync
{
}
