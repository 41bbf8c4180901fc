use serde::{Deserialize, Serialize};
use uuid::Uuid;

use linkgraph_crypto::{ChainLink, ContentHasher};
use linkgraph_types::{Address, EntityType, Fields};

use crate::error::{StoreError, StoreResult};

/// One immutable snapshot of a record's fields.
///
/// The first revision of a record has no `origin` and no `predecessor`; its
/// own address becomes the origin. Every later revision names both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// The record type this revision belongs to.
    pub entity: EntityType,
    /// Origin of the logical record (`None` on the first revision).
    pub origin: Option<Address>,
    /// Address of the revision this one supersedes.
    pub predecessor: Option<Address>,
    /// 1-based position in the origin's chain.
    pub seq: u64,
    /// Creation stamp of the record (UUIDv7). Minted on the first revision,
    /// so equal first bodies still get distinct origins, and carried
    /// unchanged by every later one.
    pub created: Uuid,
    /// Populated fields. Null fields are absent.
    pub fields: Fields,
}

impl Revision {
    /// A first revision for a new record.
    pub fn genesis(entity: EntityType, fields: Fields) -> Self {
        Self {
            entity,
            origin: None,
            predecessor: None,
            seq: 1,
            created: Uuid::now_v7(),
            fields,
        }
    }

    /// A revision superseding `head`.
    pub fn successor(head: &StoredRevision, fields: Fields) -> Self {
        Self {
            entity: head.revision.entity.clone(),
            origin: Some(head.origin()),
            predecessor: Some(head.address),
            seq: head.revision.seq + 1,
            created: head.revision.created,
            fields,
        }
    }

    /// Canonical encoding the address is computed from.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Compute this revision's content address.
    pub fn compute_address(&self) -> StoreResult<Address> {
        Ok(ContentHasher::REVISION.hash(&self.encode()?))
    }

    /// Seal this revision with its computed address.
    pub fn seal(self) -> StoreResult<StoredRevision> {
        let address = self.compute_address()?;
        Ok(StoredRevision {
            address,
            revision: self,
        })
    }
}

/// A revision together with its content address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRevision {
    pub address: Address,
    pub revision: Revision,
}

impl StoredRevision {
    /// The origin of the logical record this revision belongs to.
    pub fn origin(&self) -> Address {
        self.revision.origin.unwrap_or(self.address)
    }

    /// Milliseconds since the Unix epoch at which the record was created.
    pub fn created_at_ms(&self) -> u64 {
        self.revision.created.get_timestamp().map_or(0, |ts| {
            let (secs, nanos) = ts.to_unix();
            secs * 1000 + u64::from(nanos) / 1_000_000
        })
    }

    /// Returns `true` for a record's first revision.
    pub fn is_genesis(&self) -> bool {
        self.revision.predecessor.is_none()
    }

    /// Recompute the address and compare with the stored one.
    pub fn verify(&self) -> StoreResult<()> {
        let computed = self.revision.compute_address()?;
        if computed != self.address {
            return Err(StoreError::CorruptRevision {
                address: self.address,
                reason: format!("content hashes to {}", computed.short_hex()),
            });
        }
        Ok(())
    }
}

impl ChainLink for StoredRevision {
    fn address(&self) -> Address {
        self.address
    }

    fn predecessor(&self) -> Option<Address> {
        self.revision.predecessor
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.revision.encode().unwrap_or_default()
    }
}

/// What a writer asks the store to append.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppendRequest {
    /// Start a new record.
    Genesis { entity: EntityType, fields: Fields },
    /// Supersede `predecessor`, which must be `origin`'s current head.
    Successor {
        origin: Address,
        predecessor: Address,
        fields: Fields,
    },
}
