//! One agent's view of a record graph.
//!
//! [`RecordGraph`] wires a [`RecordManager`] and a [`ReverseQueryService`]
//! to the same store and the same index. Several graphs built over one
//! shared store model several agents: each keeps its own index and catches
//! up with the others through [`RecordGraph::refresh`].

use std::sync::Arc;

use serde_json::Value;

use linkgraph_store::{InMemoryRecordStore, RecordStore};
use linkgraph_types::{Address, EntityType, FieldName, Fields, Patch, RecordId};

use crate::config::GraphConfig;
use crate::error::{RecordResult, ValidationError};
use crate::lifecycle::RecordManager;
use crate::query::{Page, PageParams, ReverseQueryService};
use crate::record::Record;
use crate::schema::Schema;
use crate::shared::SharedIndex;

pub struct RecordGraph {
    config: GraphConfig,
    schema: Arc<Schema>,
    manager: RecordManager,
    queries: ReverseQueryService,
}

impl RecordGraph {
    /// A graph over a fresh in-memory store. Fails if `config` does not
    /// pass [`GraphConfig::check`].
    pub fn new(config: GraphConfig) -> RecordResult<Self> {
        Self::assemble(config, Arc::new(InMemoryRecordStore::new()))
    }

    /// A graph over an existing (possibly shared) store. The index is
    /// rebuilt from the store's live heads.
    pub fn with_store(config: GraphConfig, store: Arc<dyn RecordStore>) -> RecordResult<Self> {
        let graph = Self::assemble(config, store)?;
        graph.manager.rebuild_index()?;
        Ok(graph)
    }

    /// Parse a TOML configuration and build an in-memory graph from it.
    pub fn from_toml_str(text: &str) -> RecordResult<Self> {
        Self::new(GraphConfig::from_toml_str(text)?)
    }

    fn assemble(config: GraphConfig, store: Arc<dyn RecordStore>) -> RecordResult<Self> {
        config.check()?;
        let schema = Arc::new(config.schema.clone());
        let index = SharedIndex::new();
        let manager = RecordManager::new(schema.clone(), store.clone(), index.clone())?
            .with_live_target_check(config.require_live_targets);
        let queries = ReverseQueryService::new(schema.clone(), store, index, config.paging.clone());
        Ok(Self {
            config,
            schema,
            manager,
            queries,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn manager(&self) -> &RecordManager {
        &self.manager
    }

    pub fn queries(&self) -> &ReverseQueryService {
        &self.queries
    }

    /// Rebuild this agent's index from the store.
    pub fn refresh(&self) -> RecordResult<usize> {
        self.manager.rebuild_index()
    }

    // ---------------------------------------------------------------
    // Typed operations
    // ---------------------------------------------------------------

    pub fn create(&self, entity: &EntityType, fields: Fields) -> RecordResult<Record> {
        self.manager.create(entity, fields)
    }

    pub fn update(&self, origin: &Address, revision_id: &Address, patch: &Patch) -> RecordResult<Record> {
        self.manager.update(origin, revision_id, patch)
    }

    pub fn delete(&self, origin: &Address, revision_id: &Address) -> RecordResult<bool> {
        self.manager.delete(origin, revision_id)
    }

    pub fn get(&self, origin: &Address) -> RecordResult<Record> {
        self.manager.get(origin)
    }

    pub fn query_by_field(
        &self,
        entity: &EntityType,
        field: &FieldName,
        value: &Address,
        page: &PageParams,
    ) -> RecordResult<Page<Record>> {
        self.queries.query_by_field(entity, field, value, page)
    }

    // ---------------------------------------------------------------
    // String and JSON boundary
    // ---------------------------------------------------------------

    /// Create from an entity name and a JSON object of fields.
    pub fn create_json(&self, entity: &str, payload: &Value) -> RecordResult<Record> {
        let entity = self.schema.entity_type(entity)?;
        let fields = self.schema.decode_fields(&entity, payload)?;
        self.manager.create(&entity, fields)
    }

    /// Update by record id and revision token. Keys absent from `payload`
    /// are untouched; `null` clears.
    pub fn update_json(&self, id: &str, revision_id: &str, payload: &Value) -> RecordResult<Record> {
        let origin = parse_id(id)?;
        let revision_id = parse_address(revision_id)?;
        let head = self.manager.get(&origin)?;
        let patch = self.schema.decode_patch(&head.entity, payload)?;
        self.manager.update(&origin, &revision_id, &patch)
    }

    /// Delete by revision token alone.
    pub fn delete_json(&self, revision_id: &str) -> RecordResult<bool> {
        self.manager.delete_revision(&parse_address(revision_id)?)
    }

    pub fn get_json(&self, id: &str) -> RecordResult<Record> {
        self.manager.get(&parse_id(id)?)
    }

    pub fn query_json(
        &self,
        entity: &str,
        field: &str,
        value: &str,
        page: &PageParams,
    ) -> RecordResult<Page<Record>> {
        let entity = self.schema.entity_type(entity)?;
        let field = FieldName::new(field).map_err(|_| ValidationError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        })?;
        self.queries
            .query_by_field(&entity, &field, &parse_id(value)?, page)
    }
}

fn parse_id(id: &str) -> RecordResult<Address> {
    Ok(RecordId::parse(id)?.origin())
}

fn parse_address(address: &str) -> RecordResult<Address> {
    Ok(Address::from_hex(address)?)
}

impl std::fmt::Debug for RecordGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordGraph")
            .field("manager", &self.manager)
            .field("paging", &self.config.paging)
            .finish()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use linkgraph_types::FieldValue;
    use proptest::prelude::*;

    use crate::testing::*;

    const PROCESSES: usize = 3;
    const EVENTS: usize = 4;

    #[derive(Clone, Debug)]
    enum Step {
        Create { target: Option<usize> },
        Set { event: usize, target: usize },
        Clear { event: usize },
        Touch { event: usize },
        Delete { event: usize },
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            proptest::option::of(0..PROCESSES).prop_map(|target| Step::Create { target }),
            (0..EVENTS, 0..PROCESSES).prop_map(|(event, target)| Step::Set { event, target }),
            (0..EVENTS).prop_map(|event| Step::Clear { event }),
            (0..EVENTS).prop_map(|event| Step::Touch { event }),
            (0..EVENTS).prop_map(|event| Step::Delete { event }),
        ]
    }

    /// Expected `inputOf` memberships computed from the store alone.
    fn expected(g: &RecordGraph, processes: &[Address]) -> BTreeMap<Address, BTreeSet<Address>> {
        let mut out: BTreeMap<Address, BTreeSet<Address>> =
            processes.iter().map(|p| (*p, BTreeSet::new())).collect();
        for head in g.manager().store().live_heads().unwrap() {
            if let Some(FieldValue::Link(target)) = head.revision.fields.get("inputOf") {
                out.entry(*target).or_default().insert(head.origin());
            }
        }
        out
    }

    proptest! {
        #[test]
        fn index_matches_store_after_any_sequence(steps in prop::collection::vec(arb_step(), 1..40)) {
            let g = RecordGraph::new(rea_config()).unwrap();
            let processes: Vec<Address> = (0..PROCESSES)
                .map(|_| g.create(&entity("process"), Fields::new()).unwrap().origin)
                .collect();
            let mut events: Vec<Record> = Vec::new();

            for step in steps {
                match step {
                    Step::Create { target } => {
                        let fields = target
                            .map(|t| link("inputOf", processes[t]))
                            .unwrap_or_default();
                        events.push(g.create(&entity("economic_event"), fields).unwrap());
                    }
                    Step::Set { event, target } => {
                        if let Some(e) = events.get(event) {
                            let patch = set_link("inputOf", processes[target]);
                            if let Ok(next) = g.update(&e.origin, &e.revision_id, &patch) {
                                events[event] = next;
                            }
                        }
                    }
                    Step::Clear { event } => {
                        if let Some(e) = events.get(event) {
                            if let Ok(next) = g.update(&e.origin, &e.revision_id, &clear("inputOf")) {
                                events[event] = next;
                            }
                        }
                    }
                    Step::Touch { event } => {
                        if let Some(e) = events.get(event) {
                            if let Ok(next) = g.update(&e.origin, &e.revision_id, &Patch::new()) {
                                events[event] = next;
                            }
                        }
                    }
                    Step::Delete { event } => {
                        if let Some(e) = events.get(event) {
                            let _ = g.delete(&e.origin, &e.revision_id);
                        }
                    }
                }

                prop_assert!(g.manager().verify_index().unwrap().is_clean());
                for (process, sources) in expected(&g, &processes) {
                    let found: BTreeSet<Address> = g
                        .queries()
                        .query_all(&entity("economic_event"), &field("inputOf"), &process)
                        .unwrap()
                        .into_iter()
                        .map(|r| r.origin)
                        .collect();
                    prop_assert_eq!(found, sources);
                }
            }
        }
    }
}
