//! LMDB implementation of NexusLinkStore.

use nexus_store::{NexusLink, NexusLinkStore, StoreError};
use nexus_types::{BrokerId, NexusCode};

use crate::environment::{decode, encode, LmdbStore};
use crate::LmdbError;

impl LmdbStore {
    fn insert_link(&self, link: &NexusLink) -> Result<(), LmdbError> {
        let broker_key = link.broker_id.as_str().as_bytes();
        let code_key = link.nexus_code.as_str().as_bytes();

        let mut wtxn = self.env.write_txn()?;
        if self.dbs.links.get(&wtxn, broker_key)?.is_some() {
            return Err(LmdbError::Duplicate(format!("broker {}", link.broker_id)));
        }
        if self.dbs.link_codes.get(&wtxn, code_key)?.is_some() {
            return Err(LmdbError::Duplicate(format!("nexus code {}", link.nexus_code)));
        }
        self.dbs.links.put(&mut wtxn, broker_key, &encode(link)?)?;
        self.dbs.link_codes.put(&mut wtxn, code_key, broker_key)?;
        wtxn.commit()?;
        Ok(())
    }

    fn link_by_broker(&self, broker: &str) -> Result<Option<NexusLink>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        self.dbs
            .links
            .get(&rtxn, broker.as_bytes())?
            .map(decode)
            .transpose()
    }

    fn link_by_code(&self, code: &NexusCode) -> Result<Option<NexusLink>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let Some(broker) = self.dbs.link_codes.get(&rtxn, code.as_str().as_bytes())? else {
            return Ok(None);
        };
        match self.dbs.links.get(&rtxn, broker)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Err(LmdbError::DanglingIndex(format!("nexus code {code}"))),
        }
    }
}

impl NexusLinkStore for LmdbStore {
    fn insert_nexus_link(&self, link: &NexusLink) -> Result<(), StoreError> {
        Ok(self.insert_link(link)?)
    }

    fn get_nexus_link_by_code(&self, code: &NexusCode) -> Result<Option<NexusLink>, StoreError> {
        Ok(self.link_by_code(code)?)
    }

    fn get_nexus_link_by_broker(
        &self,
        broker: &BrokerId,
    ) -> Result<Option<NexusLink>, StoreError> {
        Ok(self.link_by_broker(broker.as_str())?)
    }
}
