//! LMDB implementation of ActivityLogStore.
//!
//! Entries are keyed by a store-wide sequence number (u64 BE) kept in the
//! meta database; a subject index maps each transaction or user to its
//! sequence numbers.

use nexus_store::{ActivityLogEntry, ActivityLogStore, NewActivity, StoreError};

use crate::environment::{decode, encode, LmdbStore};
use crate::keys::index_key;
use crate::LmdbError;

const ACTIVITY_SEQ_KEY: &[u8] = b"activity_seq";

impl LmdbStore {
    fn append(&self, new: NewActivity) -> Result<ActivityLogEntry, LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        let last = match self.dbs.meta.get(&wtxn, ACTIVITY_SEQ_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("activity_seq has unexpected byte length".into())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        let seq = last + 1;
        let entry = ActivityLogEntry::from_new(seq, new);
        let seq_key = seq.to_be_bytes();

        self.dbs.activity.put(&mut wtxn, &seq_key, &encode(&entry)?)?;
        self.dbs.activity_by_subject.put(
            &mut wtxn,
            &index_key(&entry.subject, &seq_key),
            &[],
        )?;
        self.dbs.meta.put(&mut wtxn, ACTIVITY_SEQ_KEY, &seq_key)?;
        wtxn.commit()?;
        Ok(entry)
    }

    fn for_subject(&self, subject: &str, limit: usize) -> Result<Vec<ActivityLogEntry>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut entries = Vec::new();
        for seq_key in self.scan_index(&self.dbs.activity_by_subject, &rtxn, subject)? {
            match self.dbs.activity.get(&rtxn, &seq_key)? {
                Some(bytes) => entries.push(decode::<ActivityLogEntry>(bytes)?),
                None => {
                    return Err(LmdbError::DanglingIndex(format!(
                        "activity for subject {subject}"
                    )))
                }
            }
        }
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        entries.truncate(limit);
        Ok(entries)
    }
}

impl ActivityLogStore for LmdbStore {
    fn append_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError> {
        Ok(self.append(entry)?)
    }

    fn activity_for_subject(
        &self,
        subject: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        Ok(self.for_subject(subject, limit)?)
    }
}
