//! LMDB implementation of VerificationRecordStore.

use nexus_store::{StoreError, VerificationRecord, VerificationRecordStore};
use nexus_types::UserId;

use crate::environment::{decode, encode, LmdbStore};
use crate::LmdbError;

impl LmdbStore {
    fn put_record(&self, record: &VerificationRecord) -> Result<(), LmdbError> {
        let key = record.user_id.as_str().as_bytes();
        let mut wtxn = self.env.write_txn()?;
        if let Some(bytes) = self.dbs.verification.get(&wtxn, key)? {
            let existing: VerificationRecord = decode(bytes)?;
            if existing.decided_at > record.decided_at {
                tracing::debug!(user = %record.user_id, "older verification record ignored");
                return Ok(());
            }
        }
        self.dbs.verification.put(&mut wtxn, key, &encode(record)?)?;
        wtxn.commit()?;
        Ok(())
    }

    fn latest_record(&self, user: &UserId) -> Result<Option<VerificationRecord>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        self.dbs
            .verification
            .get(&rtxn, user.as_str().as_bytes())?
            .map(decode)
            .transpose()
    }
}

impl VerificationRecordStore for LmdbStore {
    fn put_verification_record(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        Ok(self.put_record(record)?)
    }

    fn latest_verification_record(
        &self,
        user: &UserId,
    ) -> Result<Option<VerificationRecord>, StoreError> {
        Ok(self.latest_record(user)?)
    }
}
