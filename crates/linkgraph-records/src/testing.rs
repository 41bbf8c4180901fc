//! Shared fixtures for unit tests.

use serde_json::json;

use linkgraph_types::{Address, EntityType, FieldName, FieldPatch, FieldValue, Fields, Patch};

use crate::config::GraphConfig;

pub const REA_TOML: &str = r#"
[paging]
default_page_size = 2
max_page_size = 3

[entities.process.fields.name]
kind = "data"

[entities.commitment.fields.note]
kind = "data"

[entities.economic_event.fields.note]
kind = "data"

[entities.economic_event.fields.inputOf]
kind = "link"
target = "process"
reciprocal = "inputs"

[entities.economic_event.fields.outputOf]
kind = "link"
target = "process"
reciprocal = "outputs"

[entities.economic_event.fields.fulfills]
kind = "link_set"
target = "commitment"
reciprocal = "fulfilledBy"

[entities.unit]
id_prefix = "symbol"

[entities.unit.fields.label]
kind = "data"

[entities.unit.fields.symbol]
kind = "data"
required = true

[entities.measure.fields.hasUnit]
kind = "link"
target = "unit"
required = true
"#;

pub fn rea_config() -> GraphConfig {
    GraphConfig::from_toml_str(REA_TOML).unwrap()
}

pub fn entity(s: &str) -> EntityType {
    EntityType::new(s).unwrap()
}

pub fn field(s: &str) -> FieldName {
    FieldName::new(s).unwrap()
}

pub fn link(name: &str, target: Address) -> Fields {
    Fields::from([(field(name), FieldValue::Link(target))])
}

pub fn data(name: &str, value: &str) -> Fields {
    Fields::from([(field(name), FieldValue::Data(json!(value)))])
}

pub fn set_link(name: &str, target: Address) -> Patch {
    Patch::from([(field(name), FieldPatch::Set(FieldValue::Link(target)))])
}

pub fn clear(name: &str) -> Patch {
    Patch::from([(field(name), FieldPatch::Clear)])
}
