use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use linkgraph_store::StoredRevision;
use linkgraph_types::{Address, EntityType, FieldValue, Fields, RecordId};

use crate::query::Cursor;
use crate::schema::Schema;

/// A record as seen by callers: one revision plus its identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Boundary identifier (prefix derived from the fields shown here).
    pub id: RecordId,
    /// Stable identity across updates.
    pub origin: Address,
    /// Address of the revision these fields come from. Present it to update
    /// or delete.
    pub revision_id: Address,
    pub entity: EntityType,
    /// 1-based position in the revision chain.
    pub seq: u64,
    /// Creation stamp shared by every revision of the record.
    pub created: Uuid,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    pub fields: Fields,
}

impl Record {
    /// Build the caller view of a stored revision.
    pub fn from_revision(schema: &Schema, stored: &StoredRevision) -> Self {
        let origin = stored.origin();
        let entity = stored.revision.entity.clone();
        Self {
            id: schema.record_id(&entity, origin, &stored.revision.fields),
            origin,
            revision_id: stored.address,
            entity,
            seq: stored.revision.seq,
            created: stored.revision.created,
            created_at: stored.created_at_ms(),
            fields: stored.revision.fields.clone(),
        }
    }

    /// This record's position in newest-first listings.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            created: self.created,
            origin: self.origin,
        }
    }

    /// A populated field, if any.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The target of a single-valued link field.
    pub fn link(&self, name: &str) -> Option<Address> {
        match self.field(name)? {
            FieldValue::Link(target) => Some(*target),
            _ => None,
        }
    }

    /// Every target of a link or link-set field (empty when unpopulated).
    pub fn links(&self, name: &str) -> BTreeSet<Address> {
        self.field(name)
            .map(FieldValue::link_targets)
            .unwrap_or_default()
    }

    /// JSON view with every declared field present.
    pub fn to_json(&self, schema: &Schema) -> Value {
        let mut fields = schema.encode_fields(&self.entity, &self.fields);
        if let Some(object) = fields.as_object_mut() {
            object.insert("id".to_string(), json!(self.id.to_string()));
            object.insert("revisionId".to_string(), json!(self.revision_id.to_hex()));
        }
        json!({
            "entity": self.entity.as_str(),
            "seq": self.seq,
            "createdAt": self.created_at,
            "record": fields,
        })
    }
}
