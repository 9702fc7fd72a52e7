//! Broker pairing material.

use crate::StoreError;
use nexus_crypto::TotpSecret;
use nexus_types::{BrokerId, NexusCode, Timestamp};
use serde::{Deserialize, Serialize};

/// One per broker, created at provisioning and immutable afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NexusLink {
    pub broker_id: BrokerId,
    /// Upper-cased display code, unique across brokers.
    pub nexus_code: NexusCode,
    /// Never exposed to agents.
    pub totp_secret: TotpSecret,
    pub created_at: Timestamp,
}

/// Trait for nexus link storage.
pub trait NexusLinkStore {
    /// Insert a new link.
    ///
    /// Fails with [`StoreError::Duplicate`] if the broker already has a link
    /// or the code is taken.
    fn insert_nexus_link(&self, link: &NexusLink) -> Result<(), StoreError>;

    /// Look up a link by its (already normalized) code.
    fn get_nexus_link_by_code(&self, code: &NexusCode) -> Result<Option<NexusLink>, StoreError>;

    fn get_nexus_link_by_broker(&self, broker: &BrokerId)
        -> Result<Option<NexusLink>, StoreError>;
}
