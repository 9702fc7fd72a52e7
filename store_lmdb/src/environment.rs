//! LMDB environment setup and shared helpers.

use std::fs;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::keys::{owner_prefix, prefix_upper_bound, suffix};
use crate::LmdbError;

/// Default map size: 1 GiB of address space (not pre-allocated).
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const MAX_DBS: u32 = 16;

/// Handles for every database in the environment.
pub(crate) struct Databases {
    /// broker id → `NexusLink`
    pub links: Database<Bytes, Bytes>,
    /// nexus code → broker id
    pub link_codes: Database<Bytes, Bytes>,
    /// request id → `PairingRequest`
    pub requests: Database<Bytes, Bytes>,
    /// agent index key → empty
    pub requests_by_agent: Database<Bytes, Bytes>,
    /// broker index key → empty
    pub requests_by_broker: Database<Bytes, Bytes>,
    /// seq (u64 BE) → `ActivityLogEntry`
    pub activity: Database<Bytes, Bytes>,
    /// subject index key (suffix: seq BE) → empty
    pub activity_by_subject: Database<Bytes, Bytes>,
    /// user id → latest `VerificationRecord`
    pub verification: Database<Bytes, Bytes>,
    /// counters
    pub meta: Database<Bytes, Bytes>,
}

/// Persistent implementation of every `nexus-store` trait.
///
/// Each mutation is one LMDB write transaction. LMDB admits a single writer
/// at a time, so check-then-write sequences inside a transaction are atomic
/// with respect to other callers, across threads and processes.
pub struct LmdbStore {
    pub(crate) env: Arc<Env>,
    pub(crate) dbs: Databases,
}

impl LmdbStore {
    /// Open or create the environment in `dir`.
    pub fn open(dir: &Path, map_size: usize) -> Result<Self, LmdbError> {
        fs::create_dir_all(dir)?;
        // SAFETY: the environment is opened once per process per directory;
        // callers must not open the same path twice concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(dir)?
        };

        let mut wtxn = env.write_txn()?;
        let dbs = Databases {
            links: env.create_database(&mut wtxn, Some("nexus_links"))?,
            link_codes: env.create_database(&mut wtxn, Some("nexus_link_codes"))?,
            requests: env.create_database(&mut wtxn, Some("pairing_requests"))?,
            requests_by_agent: env.create_database(&mut wtxn, Some("pairing_by_agent"))?,
            requests_by_broker: env.create_database(&mut wtxn, Some("pairing_by_broker"))?,
            activity: env.create_database(&mut wtxn, Some("activity"))?,
            activity_by_subject: env.create_database(&mut wtxn, Some("activity_by_subject"))?,
            verification: env.create_database(&mut wtxn, Some("verification_records"))?,
            meta: env.create_database(&mut wtxn, Some("meta"))?,
        };
        wtxn.commit()?;

        tracing::info!(path = %dir.display(), map_size, "LMDB environment opened");
        Ok(Self {
            env: Arc::new(env),
            dbs,
        })
    }

    /// Suffixes of every index entry owned by `owner`, in key order.
    pub(crate) fn scan_index(
        &self,
        db: &Database<Bytes, Bytes>,
        txn: &RoTxn,
        owner: &str,
    ) -> Result<Vec<Vec<u8>>, LmdbError> {
        let prefix = owner_prefix(owner);
        let upper = prefix_upper_bound(&prefix);
        let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (
            Bound::Included(prefix.as_slice()),
            match &upper {
                Some(u) => Bound::Excluded(u.as_slice()),
                None => Bound::Unbounded,
            },
        );
        let mut out = Vec::new();
        for item in db.range(txn, &bounds)? {
            let (key, _) = item?;
            out.push(suffix(key, &prefix).to_vec());
        }
        Ok(out)
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LmdbError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}
