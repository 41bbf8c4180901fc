//! Reverse link queries.
//!
//! The index supplies candidate origins; the store is the authority on
//! whether each candidate still exists and still holds the link. A
//! candidate that has been tombstoned, has not reached this agent's store,
//! or no longer references the queried value is skipped rather than
//! reported as an error.
//!
//! Results come back newest first: by the record's creation stamp, then by
//! origin where two stamps are equal.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use linkgraph_store::{RecordStore, StoreError, StoredRevision};
use linkgraph_types::{Address, EntityType, FieldName};

use crate::config::PagingConfig;
use crate::error::{RecordResult, ValidationError};
use crate::record::Record;
use crate::schema::{QueryField, Schema};
use crate::shared::SharedIndex;

/// A record's position in newest-first order.
///
/// Fields are compared in declaration order, so the derived `Ord` is the
/// oldest-first order. The string form is `<creation uuid>.<origin hex>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cursor {
    pub created: Uuid,
    pub origin: Address,
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.created, self.origin)
    }
}

impl FromStr for Cursor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidCursor(s.to_string());
        let (created, origin) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            created: Uuid::parse_str(created).map_err(|_| invalid())?,
            origin: Address::from_hex(origin).map_err(|_| invalid())?,
        })
    }
}

/// Cursor paging over newest-first order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// Maximum items to return (defaults to the configured page size).
    pub first: Option<usize>,
    /// Exclusive cursor: only records older than this position.
    pub after: Option<Cursor>,
}

impl PageParams {
    pub fn first(first: usize) -> Self {
        Self {
            first: Some(first),
            after: None,
        }
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    /// Position of the last item, to pass as `after` for the next page.
    pub end_cursor: Option<Cursor>,
}

/// Answers "which records of type T currently reference A through F".
pub struct ReverseQueryService {
    schema: Arc<Schema>,
    store: Arc<dyn RecordStore>,
    index: SharedIndex,
    paging: PagingConfig,
}

impl ReverseQueryService {
    pub fn new(
        schema: Arc<Schema>,
        store: Arc<dyn RecordStore>,
        index: SharedIndex,
        paging: PagingConfig,
    ) -> Self {
        Self {
            schema,
            store,
            index,
            paging,
        }
    }

    /// Live records of `entity` whose `field` references `value`, one page
    /// at a time.
    pub fn query_by_field(
        &self,
        entity: &EntityType,
        field: &FieldName,
        value: &Address,
        page: &PageParams,
    ) -> RecordResult<Page<Record>> {
        let matches = self.resolve(entity, field, value)?;
        Ok(paginate(matches, page, &self.paging))
    }

    /// Every live referrer, newest first, unpaged.
    pub fn query_all(
        &self,
        entity: &EntityType,
        field: &FieldName,
        value: &Address,
    ) -> RecordResult<Vec<Record>> {
        self.resolve(entity, field, value)
    }

    /// Number of live referrers.
    pub fn count_by_field(
        &self,
        entity: &EntityType,
        field: &FieldName,
        value: &Address,
    ) -> RecordResult<usize> {
        Ok(self.resolve(entity, field, value)?.len())
    }

    fn resolve(
        &self,
        entity: &EntityType,
        field: &FieldName,
        value: &Address,
    ) -> RecordResult<Vec<Record>> {
        let query = self.schema.query_field(entity, field)?;

        // Held across dereferencing so a local write lands entirely before
        // or after this query.
        let index = self.index.read()?;
        let candidates = index.lookup(query.key(), value);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let reciprocal_targets = match &query {
            QueryField::Reciprocal { source, .. } => {
                Some(self.outbound_targets(value, &source.entity, &source.field)?)
            }
            QueryField::Direct { .. } => None,
        };

        let mut live = Vec::with_capacity(candidates.len());
        for origin in candidates {
            let head = match self.store.get_head(&origin) {
                Ok(head) => head,
                Err(StoreError::NotFound(_)) => {
                    debug!(origin = %origin.short_hex(), key = %query.key(), "skipping referrer with no entry");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if head.revision.entity != *entity {
                debug!(origin = %origin.short_hex(), entity = %head.revision.entity, "skipping referrer of another type");
                continue;
            }
            let still_linked = match &reciprocal_targets {
                Some(targets) => targets.contains(&origin),
                None => references(&head, field, value),
            };
            if !still_linked {
                debug!(origin = %origin.short_hex(), key = %query.key(), "skipping lagging index entry");
                continue;
            }
            live.push(Record::from_revision(&self.schema, &head));
        }
        live.sort_by_key(|record| std::cmp::Reverse(record.cursor()));
        Ok(live)
    }

    /// Targets `origin` currently links to through `entity.field`.
    fn outbound_targets(
        &self,
        origin: &Address,
        entity: &EntityType,
        field: &FieldName,
    ) -> RecordResult<BTreeSet<Address>> {
        match self.store.get_head(origin) {
            Ok(head) if head.revision.entity == *entity => Ok(head
                .revision
                .fields
                .get(field)
                .map(|value| value.link_targets())
                .unwrap_or_default()),
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn references(head: &StoredRevision, field: &FieldName, value: &Address) -> bool {
    head.revision
        .fields
        .get(field)
        .is_some_and(|current| current.link_targets().contains(value))
}

fn paginate(matches: Vec<Record>, page: &PageParams, paging: &PagingConfig) -> Page<Record> {
    let size = paging.page_size(page.first);
    let mut rest: Vec<Record> = matches
        .into_iter()
        .filter(|record| page.after.map_or(true, |after| record.cursor() < after))
        .collect();
    let has_next_page = rest.len() > size;
    rest.truncate(size);
    let end_cursor = rest.last().map(Record::cursor);
    Page {
        items: rest,
        has_next_page,
        end_cursor,
    }
}

impl std::fmt::Debug for ReverseQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseQueryService")
            .field("index", &self.index)
            .field("paging", &self.paging)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkgraph_index::IndexKey;
    use linkgraph_store::InMemoryRecordStore;
    use linkgraph_types::Fields;
    use std::time::Duration;

    use crate::error::{RecordError, ValidationError};
    use crate::lifecycle::RecordManager;
    use crate::testing::*;

    struct Agent {
        manager: RecordManager,
        queries: ReverseQueryService,
    }

    fn agent() -> Agent {
        let config = rea_config();
        let schema = Arc::new(config.schema);
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let index = SharedIndex::new();
        Agent {
            manager: RecordManager::new(schema.clone(), store.clone(), index.clone()).unwrap(),
            queries: ReverseQueryService::new(schema, store, index, config.paging),
        }
    }

    impl Agent {
        fn process(&self) -> Record {
            self.manager.create(&entity("process"), Fields::new()).unwrap()
        }

        fn event_into(&self, process: &Record) -> Record {
            self.manager
                .create(&entity("economic_event"), link("inputOf", process.origin))
                .unwrap()
        }

        fn inputs_of(&self, process: &Record) -> Vec<Address> {
            self.queries
                .query_all(&entity("economic_event"), &field("inputOf"), &process.origin)
                .unwrap()
                .into_iter()
                .map(|r| r.origin)
                .collect()
        }
    }

    fn tick() {
        std::thread::sleep(Duration::from_millis(3));
    }

    #[test]
    fn query_returns_newest_referrers_first() {
        let a = agent();
        let p = a.process();
        let mut created = Vec::new();
        for _ in 0..3 {
            tick();
            created.push(a.event_into(&p).origin);
        }
        created.reverse();
        assert_eq!(a.inputs_of(&p), created);
        assert_eq!(
            a.queries
                .count_by_field(&entity("economic_event"), &field("inputOf"), &p.origin)
                .unwrap(),
            3
        );
    }

    #[test]
    fn unreferenced_value_yields_empty() {
        let a = agent();
        let p = a.process();
        assert!(a.inputs_of(&p).is_empty());
        assert!(a
            .queries
            .query_all(
                &entity("economic_event"),
                &field("inputOf"),
                &Address::from_bytes(b"nothing")
            )
            .unwrap()
            .is_empty());
    }

    #[test]
    fn tombstoned_candidates_are_skipped() {
        let a = agent();
        let p = a.process();
        let e = a.event_into(&p);

        // Simulate an index that has not yet seen the delete.
        let stale = a.manager.index().snapshot().unwrap();
        a.manager.delete(&e.origin, &e.revision_id).unwrap();
        *a.manager.index().write().unwrap() = stale;

        assert!(a.inputs_of(&p).is_empty());
    }

    #[test]
    fn lagging_entries_are_skipped() {
        let a = agent();
        let p1 = a.process();
        let p2 = a.process();
        let e = a.event_into(&p1);

        let stale = a.manager.index().snapshot().unwrap();
        a.manager
            .update(&e.origin, &e.revision_id, &set_link("inputOf", p2.origin))
            .unwrap();
        *a.manager.index().write().unwrap() = stale;

        assert!(a.inputs_of(&p1).is_empty());
    }

    #[test]
    fn candidates_of_another_type_are_skipped() {
        let a = agent();
        let p = a.process();
        let c = a.manager.create(&entity("commitment"), Fields::new()).unwrap();
        a.manager.index().write().unwrap().insert(
            &IndexKey::new(entity("economic_event"), field("inputOf")),
            p.origin,
            c.origin,
        );
        assert!(a.inputs_of(&p).is_empty());
    }

    #[test]
    fn reciprocal_query_lists_targets() {
        let a = agent();
        let p1 = a.process();
        let p2 = a.process();
        let e = a.event_into(&p1);

        let inputs = |a: &Agent| {
            a.queries
                .query_all(&entity("process"), &field("inputs"), &e.origin)
                .unwrap()
                .into_iter()
                .map(|r| r.origin)
                .collect::<Vec<_>>()
        };
        assert_eq!(inputs(&a), vec![p1.origin]);

        a.manager
            .update(&e.origin, &e.revision_id, &set_link("inputOf", p2.origin))
            .unwrap();
        assert_eq!(inputs(&a), vec![p2.origin]);
    }

    #[test]
    fn query_validates_entity_and_field() {
        let a = agent();
        let value = Address::from_bytes(b"v");
        let page = PageParams::default();
        assert!(matches!(
            a.queries
                .query_by_field(&entity("agent"), &field("inputOf"), &value, &page),
            Err(RecordError::Validation(ValidationError::UnknownEntity(_)))
        ));
        assert!(matches!(
            a.queries
                .query_by_field(&entity("economic_event"), &field("note"), &value, &page),
            Err(RecordError::Validation(ValidationError::NotALinkField { .. }))
        ));
        assert!(matches!(
            a.queries
                .query_by_field(&entity("economic_event"), &field("bogus"), &value, &page),
            Err(RecordError::Validation(ValidationError::UnknownField { .. }))
        ));
    }

    #[test]
    fn paging_walks_every_referrer_once() {
        let a = agent();
        let p = a.process();
        for _ in 0..5 {
            a.event_into(&p);
        }
        let all = a.inputs_of(&p);

        // default_page_size = 2 in the fixture
        let mut seen = Vec::new();
        let mut params = PageParams::default();
        loop {
            let page = a
                .queries
                .query_by_field(&entity("economic_event"), &field("inputOf"), &p.origin, &params)
                .unwrap();
            assert!(page.items.len() <= 2);
            seen.extend(page.items.iter().map(|r| r.origin));
            if !page.has_next_page {
                break;
            }
            params = PageParams::default().after(page.end_cursor.unwrap());
        }
        assert_eq!(seen, all);
    }

    #[test]
    fn update_keeps_creation_order() {
        let a = agent();
        let p = a.process();
        tick();
        let older = a.event_into(&p);
        tick();
        let newer = a.event_into(&p);
        tick();

        let touched = a
            .manager
            .update(&older.origin, &older.revision_id, &set_link("inputOf", p.origin))
            .unwrap();
        assert_eq!(touched.cursor(), older.cursor());
        assert_eq!(a.inputs_of(&p), vec![newer.origin, older.origin]);
    }

    #[test]
    fn cursor_stays_valid_after_its_record_is_deleted() {
        let a = agent();
        let p = a.process();
        let mut events = Vec::new();
        for _ in 0..4 {
            tick();
            events.push(a.event_into(&p));
        }
        let first_page = a
            .queries
            .query_by_field(
                &entity("economic_event"),
                &field("inputOf"),
                &p.origin,
                &PageParams::first(2),
            )
            .unwrap();
        let cursor = first_page.end_cursor.unwrap();
        assert_eq!(cursor.origin, events[2].origin);

        a.manager
            .delete(&events[2].origin, &events[2].revision_id)
            .unwrap();
        let next = a
            .queries
            .query_by_field(
                &entity("economic_event"),
                &field("inputOf"),
                &p.origin,
                &PageParams::first(2).after(cursor),
            )
            .unwrap();
        let origins: Vec<Address> = next.items.iter().map(|r| r.origin).collect();
        assert_eq!(origins, vec![events[1].origin, events[0].origin]);
        assert!(!next.has_next_page);
    }

    #[test]
    fn cursor_text_form() {
        let a = agent();
        let p = a.process();
        let e = a.event_into(&p);
        let cursor = e.cursor();
        assert_eq!(cursor.to_string().parse::<Cursor>().unwrap(), cursor);
        assert!(matches!(
            "not-a-cursor".parse::<Cursor>(),
            Err(ValidationError::InvalidCursor(_))
        ));
        assert!(format!("{}.zz", cursor.created).parse::<Cursor>().is_err());
    }

    #[test]
    fn page_size_is_clamped_to_max() {
        let a = agent();
        let p = a.process();
        for _ in 0..5 {
            a.event_into(&p);
        }
        let page = a
            .queries
            .query_by_field(
                &entity("economic_event"),
                &field("inputOf"),
                &p.origin,
                &PageParams::first(100),
            )
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.has_next_page);

        let empty = a
            .queries
            .query_by_field(
                &entity("economic_event"),
                &field("inputOf"),
                &p.origin,
                &PageParams::first(0),
            )
            .unwrap();
        assert!(empty.items.is_empty());
        assert!(empty.has_next_page);
        assert_eq!(empty.end_cursor, None);
    }
}
