//! Record schemas.
//!
//! A [`Schema`] names the entity types the graph knows about and, for each,
//! its fields. Link fields are the ones the reverse index maintains; a link
//! field may declare a `reciprocal`, a virtual field on the target entity
//! that lists every source pointing at it.
//!
//! The schema is also the JSON boundary: [`Schema::decode_fields`] and
//! [`Schema::decode_patch`] turn caller payloads into typed values, keeping
//! "absent" and "null" apart for updates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use linkgraph_index::{IndexKey, IndexedField};
use linkgraph_types::{
    Address, EntityType, FieldName, FieldPatch, FieldValue, Fields, Patch, RecordId,
};

use crate::error::ValidationError;

/// Declaration of one field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDef {
    /// Plain data, never indexed.
    Data {
        #[serde(default)]
        required: bool,
    },
    /// Single-valued link to a record of `target` type.
    Link {
        target: EntityType,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        reciprocal: Option<FieldName>,
    },
    /// Set-valued link to records of `target` type.
    LinkSet {
        target: EntityType,
        #[serde(default)]
        reciprocal: Option<FieldName>,
    },
}

impl FieldDef {
    /// Target entity for link fields.
    pub fn target(&self) -> Option<&EntityType> {
        match self {
            Self::Link { target, .. } | Self::LinkSet { target, .. } => Some(target),
            Self::Data { .. } => None,
        }
    }

    /// Reciprocal field name for link fields that declare one.
    pub fn reciprocal(&self) -> Option<&FieldName> {
        match self {
            Self::Link { reciprocal, .. } | Self::LinkSet { reciprocal, .. } => {
                reciprocal.as_ref()
            }
            Self::Data { .. } => None,
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            Self::Data { required } | Self::Link { required, .. } => *required,
            Self::LinkSet { .. } => false,
        }
    }

    pub fn is_link(&self) -> bool {
        self.target().is_some()
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Data { .. } => "data",
            Self::Link { .. } => "link",
            Self::LinkSet { .. } => "link_set",
        }
    }
}

/// Declaration of one entity type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Data field whose string value prefixes the boundary record id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_prefix: Option<FieldName>,
    #[serde(default)]
    pub fields: BTreeMap<FieldName, FieldDef>,
}

impl EntitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: FieldName, def: FieldDef) -> Self {
        self.fields.insert(name, def);
        self
    }

    pub fn with_id_prefix(mut self, field: FieldName) -> Self {
        self.id_prefix = Some(field);
        self
    }
}

/// Where a queryable field's index entries come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryField {
    /// A link field declared on the queried entity itself.
    Direct { key: IndexKey },
    /// A reciprocal declared by `source.field` pointing at the queried
    /// entity.
    Reciprocal { key: IndexKey, source: IndexKey },
}

impl QueryField {
    /// The index key holding this field's entries.
    pub fn key(&self) -> &IndexKey {
        match self {
            Self::Direct { key } | Self::Reciprocal { key, .. } => key,
        }
    }
}

/// The full set of entity declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub entities: BTreeMap<EntityType, EntitySchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, name: EntityType, entity: EntitySchema) -> Self {
        self.entities.insert(name, entity);
        self
    }

    /// Look up an entity declaration.
    pub fn entity(&self, name: &EntityType) -> Result<&EntitySchema, ValidationError> {
        self.entities
            .get(name)
            .ok_or_else(|| ValidationError::UnknownEntity(name.to_string()))
    }

    /// Parse and look up an entity name given as a string.
    pub fn entity_type(&self, name: &str) -> Result<EntityType, ValidationError> {
        let entity = EntityType::new(name)
            .map_err(|_| ValidationError::UnknownEntity(name.to_string()))?;
        self.entity(&entity)?;
        Ok(entity)
    }

    fn field_def<'a>(
        &'a self,
        entity: &EntityType,
        field: &FieldName,
    ) -> Result<&'a FieldDef, ValidationError> {
        self.entity(entity)?
            .fields
            .get(field)
            .ok_or_else(|| unknown_field(entity, field.as_str()))
    }

    // ---------------------------------------------------------------
    // Schema checks
    // ---------------------------------------------------------------

    /// Check the declarations are internally consistent.
    ///
    /// Link targets must be declared entities, `id_prefix` must name a data
    /// field, and a reciprocal name may not collide with a declared field or
    /// another reciprocal on the same target.
    pub fn check(&self) -> Result<(), ValidationError> {
        let mut reciprocals: BTreeSet<(&EntityType, &FieldName)> = BTreeSet::new();

        for (entity_name, entity) in &self.entities {
            if let Some(prefix) = &entity.id_prefix {
                match entity.fields.get(prefix) {
                    Some(FieldDef::Data { .. }) => {}
                    _ => {
                        return Err(ValidationError::InvalidSchema(format!(
                            "{entity_name}.id_prefix names {prefix}, which is not a data field"
                        )))
                    }
                }
            }

            for (field_name, def) in &entity.fields {
                let Some(target) = def.target() else {
                    continue;
                };
                let Some(target_schema) = self.entities.get(target) else {
                    return Err(ValidationError::InvalidSchema(format!(
                        "{entity_name}.{field_name} targets undeclared entity {target}"
                    )));
                };
                if let Some(reciprocal) = def.reciprocal() {
                    if target_schema.fields.contains_key(reciprocal) {
                        return Err(ValidationError::InvalidSchema(format!(
                            "reciprocal {target}.{reciprocal} of {entity_name}.{field_name} \
                             collides with a declared field"
                        )));
                    }
                    if !reciprocals.insert((target, reciprocal)) {
                        return Err(ValidationError::InvalidSchema(format!(
                            "reciprocal {target}.{reciprocal} is declared twice"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Index wiring
    // ---------------------------------------------------------------

    /// The link fields of `entity`, with their reciprocal keys.
    pub fn indexed_fields(&self, entity: &EntityType) -> Result<Vec<IndexedField>, ValidationError> {
        let schema = self.entity(entity)?;
        Ok(schema
            .fields
            .iter()
            .filter_map(|(name, def)| {
                let target = def.target()?;
                let field = IndexedField::new(IndexKey::new(entity.clone(), name.clone()));
                Some(match def.reciprocal() {
                    Some(reciprocal) => field
                        .with_reciprocal(IndexKey::new(target.clone(), reciprocal.clone())),
                    None => field,
                })
            })
            .collect())
    }

    /// Resolve a queryable field of `entity`.
    ///
    /// Declared link fields and reciprocals are queryable. A declared data
    /// field is [`ValidationError::NotALinkField`]; anything else is
    /// [`ValidationError::UnknownField`].
    pub fn query_field(
        &self,
        entity: &EntityType,
        field: &FieldName,
    ) -> Result<QueryField, ValidationError> {
        let schema = self.entity(entity)?;
        let key = IndexKey::new(entity.clone(), field.clone());

        if let Some(def) = schema.fields.get(field) {
            if def.is_link() {
                return Ok(QueryField::Direct { key });
            }
            return Err(ValidationError::NotALinkField {
                entity: entity.to_string(),
                field: field.to_string(),
            });
        }

        for (source_entity, source_schema) in &self.entities {
            for (source_field, def) in &source_schema.fields {
                if def.target() == Some(entity) && def.reciprocal() == Some(field) {
                    return Ok(QueryField::Reciprocal {
                        key,
                        source: IndexKey::new(source_entity.clone(), source_field.clone()),
                    });
                }
            }
        }

        Err(unknown_field(entity, field.as_str()))
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Validate a complete field set for `entity`: every field declared,
    /// every value of the declared kind, every required field present.
    pub fn validate_fields(&self, entity: &EntityType, fields: &Fields) -> Result<(), ValidationError> {
        let schema = self.entity(entity)?;
        for (name, value) in fields {
            let def = schema
                .fields
                .get(name)
                .ok_or_else(|| unknown_field(entity, name.as_str()))?;
            check_kind(entity, name, def, value)?;
        }
        for (name, def) in &schema.fields {
            if def.is_required() && !fields.contains_key(name) {
                return Err(ValidationError::MissingRequired {
                    entity: entity.to_string(),
                    field: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate a patch against `entity` before it is merged.
    pub fn validate_patch(&self, entity: &EntityType, patch: &Patch) -> Result<(), ValidationError> {
        for (name, change) in patch {
            let def = self.field_def(entity, name)?;
            match change {
                FieldPatch::Set(value) => check_kind(entity, name, def, value)?,
                FieldPatch::Clear if def.is_required() => {
                    return Err(ValidationError::MissingRequired {
                        entity: entity.to_string(),
                        field: name.to_string(),
                    })
                }
                FieldPatch::Clear => {}
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Boundary identifiers
    // ---------------------------------------------------------------

    /// The boundary identifier for a record of `entity` with `fields`.
    ///
    /// Entities with an `id_prefix` field get `"<value>:<origin>"` while that
    /// field holds a string; the prefix follows the field across updates.
    pub fn record_id(&self, entity: &EntityType, origin: Address, fields: &Fields) -> RecordId {
        let prefix = self
            .entities
            .get(entity)
            .and_then(|schema| schema.id_prefix.as_ref())
            .and_then(|field| fields.get(field))
            .and_then(FieldValue::as_str);
        match prefix {
            Some(prefix) => RecordId::with_prefix(prefix, origin),
            None => RecordId::bare(origin),
        }
    }

    // ---------------------------------------------------------------
    // JSON boundary
    // ---------------------------------------------------------------

    /// Decode a JSON object into create fields. `null` values are absent.
    pub fn decode_fields(&self, entity: &EntityType, payload: &Value) -> Result<Fields, ValidationError> {
        let object = as_object(entity, payload)?;
        let mut fields = Fields::new();
        for (key, value) in object {
            let name = field_name(entity, key)?;
            let def = self.field_def(entity, &name)?;
            if value.is_null() {
                continue;
            }
            let decoded = decode_value(entity, &name, def, value)?;
            fields.insert(name, decoded);
        }
        Ok(fields)
    }

    /// Decode a JSON object into an update patch.
    ///
    /// A key absent from the object is untouched, an explicit `null` clears
    /// the field, anything else replaces it.
    pub fn decode_patch(&self, entity: &EntityType, payload: &Value) -> Result<Patch, ValidationError> {
        let object = as_object(entity, payload)?;
        let mut patch = Patch::new();
        for (key, value) in object {
            let name = field_name(entity, key)?;
            let def = self.field_def(entity, &name)?;
            let change = if value.is_null() {
                FieldPatch::Clear
            } else {
                FieldPatch::Set(decode_value(entity, &name, def, value)?)
            };
            patch.insert(name, change);
        }
        Ok(patch)
    }

    /// Encode `fields` as a JSON object with every declared field present;
    /// unpopulated fields are `null`.
    pub fn encode_fields(&self, entity: &EntityType, fields: &Fields) -> Value {
        let mut object = serde_json::Map::new();
        if let Some(schema) = self.entities.get(entity) {
            for name in schema.fields.keys() {
                object.insert(name.to_string(), Value::Null);
            }
        }
        for (name, value) in fields {
            let encoded = match value {
                FieldValue::Link(target) => Value::String(target.to_hex()),
                FieldValue::LinkSet(targets) => {
                    Value::Array(targets.iter().map(|t| Value::String(t.to_hex())).collect())
                }
                FieldValue::Data(data) => data.clone(),
            };
            object.insert(name.to_string(), encoded);
        }
        Value::Object(object)
    }
}

fn unknown_field(entity: &EntityType, field: &str) -> ValidationError {
    ValidationError::UnknownField {
        entity: entity.to_string(),
        field: field.to_string(),
    }
}

fn invalid_value(entity: &EntityType, field: &FieldName, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        entity: entity.to_string(),
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn field_name(entity: &EntityType, key: &str) -> Result<FieldName, ValidationError> {
    FieldName::new(key).map_err(|_| unknown_field(entity, key))
}

fn as_object<'a>(
    entity: &EntityType,
    payload: &'a Value,
) -> Result<&'a serde_json::Map<String, Value>, ValidationError> {
    payload.as_object().ok_or_else(|| ValidationError::InvalidValue {
        entity: entity.to_string(),
        field: "*".to_string(),
        reason: "payload must be a JSON object".to_string(),
    })
}

fn check_kind(
    entity: &EntityType,
    name: &FieldName,
    def: &FieldDef,
    value: &FieldValue,
) -> Result<(), ValidationError> {
    let matches = matches!(
        (def, value),
        (FieldDef::Data { .. }, FieldValue::Data(_))
            | (FieldDef::Link { .. }, FieldValue::Link(_))
            | (FieldDef::LinkSet { .. }, FieldValue::LinkSet(_))
    );
    if !matches {
        return Err(invalid_value(
            entity,
            name,
            format!("expected a {} value", def.kind_name()),
        ));
    }
    if value.link_targets().iter().any(Address::is_null) {
        return Err(ValidationError::NullLinkTarget {
            entity: entity.to_string(),
            field: name.to_string(),
        });
    }
    Ok(())
}

fn decode_link(entity: &EntityType, name: &FieldName, value: &Value) -> Result<Address, ValidationError> {
    let text = value
        .as_str()
        .ok_or_else(|| invalid_value(entity, name, "link must be a record id string"))?;
    let id = RecordId::parse(text).map_err(ValidationError::from)?;
    Ok(id.origin())
}

fn decode_value(
    entity: &EntityType,
    name: &FieldName,
    def: &FieldDef,
    value: &Value,
) -> Result<FieldValue, ValidationError> {
    match def {
        FieldDef::Data { .. } => Ok(FieldValue::Data(value.clone())),
        FieldDef::Link { .. } => Ok(FieldValue::Link(decode_link(entity, name, value)?)),
        FieldDef::LinkSet { .. } => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid_value(entity, name, "link set must be an array"))?;
            let targets = items
                .iter()
                .map(|item| decode_link(entity, name, item))
                .collect::<Result<BTreeSet<_>, _>>()?;
            Ok(FieldValue::LinkSet(targets))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(s: &str) -> EntityType {
        EntityType::new(s).unwrap()
    }

    fn field(s: &str) -> FieldName {
        FieldName::new(s).unwrap()
    }

    fn addr(seed: &str) -> Address {
        Address::from_bytes(seed.as_bytes())
    }

    fn rea() -> Schema {
        Schema::new()
            .with_entity(
                entity("process"),
                EntitySchema::new().with_field(field("name"), FieldDef::Data { required: true }),
            )
            .with_entity(
                entity("commitment"),
                EntitySchema::new().with_field(field("note"), FieldDef::Data { required: false }),
            )
            .with_entity(
                entity("economic_event"),
                EntitySchema::new()
                    .with_field(field("note"), FieldDef::Data { required: false })
                    .with_field(
                        field("inputOf"),
                        FieldDef::Link {
                            target: entity("process"),
                            required: false,
                            reciprocal: Some(field("inputs")),
                        },
                    )
                    .with_field(
                        field("fulfills"),
                        FieldDef::LinkSet {
                            target: entity("commitment"),
                            reciprocal: None,
                        },
                    ),
            )
            .with_entity(
                entity("unit"),
                EntitySchema::new()
                    .with_field(field("symbol"), FieldDef::Data { required: true })
                    .with_id_prefix(field("symbol")),
            )
    }

    fn event() -> EntityType {
        entity("economic_event")
    }

    #[test]
    fn rea_schema_is_consistent() {
        assert!(rea().check().is_ok());
    }

    #[test]
    fn check_rejects_undeclared_target() {
        let schema = Schema::new().with_entity(
            entity("a"),
            EntitySchema::new().with_field(
                field("b"),
                FieldDef::Link {
                    target: entity("missing"),
                    required: false,
                    reciprocal: None,
                },
            ),
        );
        assert!(matches!(schema.check(), Err(ValidationError::InvalidSchema(_))));
    }

    #[test]
    fn check_rejects_reciprocal_collision() {
        let schema = rea().with_entity(
            entity("process"),
            EntitySchema::new().with_field(field("inputs"), FieldDef::Data { required: false }),
        );
        assert!(matches!(schema.check(), Err(ValidationError::InvalidSchema(_))));
    }

    #[test]
    fn check_rejects_link_id_prefix() {
        let schema = Schema::new().with_entity(
            entity("a"),
            EntitySchema::new()
                .with_field(field("x"), FieldDef::Data { required: false })
                .with_id_prefix(field("y")),
        );
        assert!(schema.check().is_err());
    }

    #[test]
    fn indexed_fields_include_reciprocals() {
        let indexed = rea().indexed_fields(&event()).unwrap();
        assert_eq!(indexed.len(), 2);
        let input_of = indexed
            .iter()
            .find(|f| f.key.field.as_str() == "inputOf")
            .unwrap();
        assert_eq!(
            input_of.reciprocal,
            Some(IndexKey::new(entity("process"), field("inputs")))
        );
        assert!(rea().indexed_fields(&entity("process")).unwrap().is_empty());
    }

    #[test]
    fn query_field_resolution() {
        let schema = rea();
        assert!(matches!(
            schema.query_field(&event(), &field("inputOf")),
            Ok(QueryField::Direct { .. })
        ));
        match schema.query_field(&entity("process"), &field("inputs")).unwrap() {
            QueryField::Reciprocal { key, source } => {
                assert_eq!(key, IndexKey::new(entity("process"), field("inputs")));
                assert_eq!(source, IndexKey::new(event(), field("inputOf")));
            }
            other => panic!("expected reciprocal, got {other:?}"),
        }
        assert!(matches!(
            schema.query_field(&event(), &field("note")),
            Err(ValidationError::NotALinkField { .. })
        ));
        assert!(matches!(
            schema.query_field(&event(), &field("outputOf")),
            Err(ValidationError::UnknownField { .. })
        ));
        assert!(matches!(
            schema.query_field(&entity("agent"), &field("x")),
            Err(ValidationError::UnknownEntity(_))
        ));
    }

    #[test]
    fn validate_fields_checks_kinds_and_required() {
        let schema = rea();
        let ok = Fields::from([(field("inputOf"), FieldValue::Link(addr("p")))]);
        assert!(schema.validate_fields(&event(), &ok).is_ok());

        let wrong_kind = Fields::from([(field("inputOf"), FieldValue::Data(json!(1)))]);
        assert!(matches!(
            schema.validate_fields(&event(), &wrong_kind),
            Err(ValidationError::InvalidValue { .. })
        ));

        let undeclared = Fields::from([(field("bogus"), FieldValue::Data(json!(1)))]);
        assert!(matches!(
            schema.validate_fields(&event(), &undeclared),
            Err(ValidationError::UnknownField { .. })
        ));

        assert!(matches!(
            schema.validate_fields(&entity("process"), &Fields::new()),
            Err(ValidationError::MissingRequired { .. })
        ));
    }

    #[test]
    fn validate_fields_rejects_null_link() {
        let fields = Fields::from([(field("inputOf"), FieldValue::Link(Address::null()))]);
        assert!(matches!(
            rea().validate_fields(&event(), &fields),
            Err(ValidationError::NullLinkTarget { .. })
        ));
    }

    #[test]
    fn validate_patch_refuses_clearing_required() {
        let patch = Patch::from([(field("name"), FieldPatch::Clear)]);
        assert!(matches!(
            rea().validate_patch(&entity("process"), &patch),
            Err(ValidationError::MissingRequired { .. })
        ));
    }

    #[test]
    fn decode_patch_keeps_null_and_absent_apart() {
        let schema = rea();
        let patch = schema
            .decode_patch(&event(), &json!({ "inputOf": null, "note": "x" }))
            .unwrap();
        assert_eq!(patch[&field("inputOf")], FieldPatch::Clear);
        assert_eq!(
            patch[&field("note")],
            FieldPatch::Set(FieldValue::Data(json!("x")))
        );
        assert!(!patch.contains_key(&field("fulfills")));
    }

    #[test]
    fn decode_fields_accepts_prefixed_ids() {
        let target = addr("p");
        let payload = json!({
            "inputOf": format!("proc:{}", target.to_hex()),
            "fulfills": [target.to_hex()],
            "note": null,
        });
        let fields = rea().decode_fields(&event(), &payload).unwrap();
        assert_eq!(fields[&field("inputOf")], FieldValue::Link(target));
        assert_eq!(
            fields[&field("fulfills")],
            FieldValue::LinkSet(BTreeSet::from([target]))
        );
        assert!(!fields.contains_key(&field("note")));
    }

    #[test]
    fn decode_rejects_malformed_ids_and_unknown_keys() {
        let schema = rea();
        assert!(matches!(
            schema.decode_fields(&event(), &json!({ "inputOf": "not-hex" })),
            Err(ValidationError::InvalidRecordId(_))
        ));
        assert!(matches!(
            schema.decode_fields(&event(), &json!({ "inputOf": 7 })),
            Err(ValidationError::InvalidValue { .. })
        ));
        assert!(matches!(
            schema.decode_fields(&event(), &json!({ "bogus field": 1 })),
            Err(ValidationError::UnknownField { .. })
        ));
        assert!(schema.decode_fields(&event(), &json!([1, 2])).is_err());
    }

    #[test]
    fn record_id_follows_prefix_field() {
        let schema = rea();
        let origin = addr("u");
        let fields = Fields::from([(field("symbol"), FieldValue::Data(json!("kg")))]);
        let id = schema.record_id(&entity("unit"), origin, &fields);
        assert_eq!(id.prefix(), Some("kg"));
        assert_eq!(id.origin(), origin);

        let bare = schema.record_id(&event(), origin, &Fields::new());
        assert_eq!(bare.prefix(), None);
    }

    #[test]
    fn encode_fields_lists_every_declared_field() {
        let schema = rea();
        let target = addr("p");
        let fields = Fields::from([(field("inputOf"), FieldValue::Link(target))]);
        let encoded = schema.encode_fields(&event(), &fields);
        assert_eq!(encoded["inputOf"], json!(target.to_hex()));
        assert_eq!(encoded["note"], Value::Null);
        assert_eq!(encoded["fulfills"], Value::Null);
    }

    #[test]
    fn schema_parses_from_toml() {
        let text = r#"
            [entities.process.fields.name]
            kind = "data"
            required = true

            [entities.economic_event.fields.inputOf]
            kind = "link"
            target = "process"
            reciprocal = "inputs"
        "#;
        let schema: Schema = toml::from_str(text).unwrap();
        assert!(schema.check().is_ok());
        assert!(schema.entity(&event()).unwrap().fields[&field("inputOf")].is_link());
    }
}
