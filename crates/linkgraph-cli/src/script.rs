//! Record scripts: a JSON array of steps run in order against one graph.
//!
//! Any string value of the form `$name` is replaced by the id of the record
//! bound to `name`, `$name.revision` by its current revision token, and
//! `$name.cursor` by its paging position. A step binds its result with
//! `"as": "name"`; an update or get whose `id` is a plain `$name` reference
//! also refreshes that binding.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use serde_json::Value;

use linkgraph_index::IndexDiff;
use linkgraph_records::{
    Cursor, Page, PageParams, Record, RecordError, RecordGraph, RecordResult,
};
use linkgraph_types::Address;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One script step.
#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// The failure this step is expected to produce, if any.
    #[serde(default)]
    pub expect: Option<Expect>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Create {
        entity: String,
        #[serde(default = "empty_object")]
        fields: Value,
        #[serde(default, rename = "as")]
        bind: Option<String>,
    },
    Update {
        id: String,
        revision: String,
        #[serde(default = "empty_object")]
        fields: Value,
        #[serde(default, rename = "as")]
        bind: Option<String>,
    },
    Delete {
        revision: String,
    },
    Get {
        id: String,
        #[serde(default, rename = "as")]
        bind: Option<String>,
    },
    History {
        id: String,
    },
    Query {
        entity: String,
        field: String,
        value: String,
        #[serde(default)]
        first: Option<usize>,
        #[serde(default)]
        after: Option<String>,
    },
    VerifyIndex,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Get { .. } => "get",
            Self::History { .. } => "history",
            Self::Query { .. } => "query",
            Self::VerifyIndex => "verify_index",
        }
    }
}

/// Expected error class for a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    Stale,
    NotFound,
    Invalid,
}

impl Expect {
    pub fn matches(self, err: &RecordError) -> bool {
        match self {
            Self::Stale => err.is_stale(),
            Self::NotFound => err.is_not_found(),
            Self::Invalid => matches!(err, RecordError::Validation(_)),
        }
    }
}

/// What a step produced.
#[derive(Debug)]
pub enum Outcome {
    Record(Record),
    Deleted(Address),
    History(Vec<Record>),
    Page(Page<Record>),
    IndexChecked {
        diff: IndexDiff,
        fingerprint: Address,
    },
    Rejected(RecordError),
}

#[derive(Debug)]
pub struct StepReport {
    /// 1-based step number.
    pub number: usize,
    pub op: &'static str,
    pub outcome: Outcome,
}

/// Parse a script from JSON text.
pub fn parse(text: &str) -> anyhow::Result<Vec<Step>> {
    serde_json::from_str(text).context("script must be a JSON array of steps")
}

/// Runs steps against one graph, keeping named bindings between steps.
pub struct ScriptRunner<'a> {
    graph: &'a RecordGraph,
    bindings: BTreeMap<String, Record>,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(graph: &'a RecordGraph) -> Self {
        Self {
            graph,
            bindings: BTreeMap::new(),
        }
    }

    pub fn run_step(&mut self, number: usize, step: &Step) -> anyhow::Result<StepReport> {
        let op = step.action.name();
        let result = self.execute(&step.action)?;

        let outcome = match (result, step.expect) {
            (Ok(outcome), None) => outcome,
            (Ok(_), Some(expect)) => {
                bail!("step {number} ({op}): expected {expect:?}, but it succeeded")
            }
            (Err(err), Some(expect)) if expect.matches(&err) => Outcome::Rejected(err),
            (Err(err), _) => {
                return Err(anyhow::Error::new(err).context(format!("step {number} ({op})")))
            }
        };
        Ok(StepReport {
            number,
            op,
            outcome,
        })
    }

    /// Resolve references, then run the action. Reference errors are script
    /// errors; the inner result is the graph's answer.
    fn execute(&mut self, action: &Action) -> anyhow::Result<RecordResult<Outcome>> {
        let graph = self.graph;
        Ok(match action {
            Action::Create {
                entity,
                fields,
                bind,
            } => {
                let fields = self.resolve_value(fields)?;
                graph
                    .create_json(entity, &fields)
                    .map(|record| self.bind(bind.as_deref(), None, record))
            }
            Action::Update {
                id,
                revision,
                fields,
                bind,
            } => {
                let target = self.resolve(id)?;
                let revision = self.resolve(revision)?;
                let fields = self.resolve_value(fields)?;
                graph
                    .update_json(&target, &revision, &fields)
                    .map(|record| self.bind(bind.as_deref(), plain_reference(id), record))
            }
            Action::Delete { revision } => {
                let revision = self.resolve(revision)?;
                graph
                    .delete_json(&revision)
                    .and_then(|_| Ok(Outcome::Deleted(Address::from_hex(&revision)?)))
            }
            Action::Get { id, bind } => {
                let target = self.resolve(id)?;
                graph
                    .get_json(&target)
                    .map(|record| self.bind(bind.as_deref(), plain_reference(id), record))
            }
            Action::History { id } => {
                let target = self.resolve(id)?;
                graph
                    .get_json(&target)
                    .and_then(|record| graph.manager().history(&record.origin))
                    .map(Outcome::History)
            }
            Action::Query {
                entity,
                field,
                value,
                first,
                after,
            } => {
                let value = self.resolve(value)?;
                let after = after
                    .as_deref()
                    .map(|cursor| self.resolve(cursor))
                    .transpose()?
                    .map(|cursor| cursor.parse::<Cursor>())
                    .transpose()
                    .context("query cursor must be <uuid>.<origin hex> or $name.cursor")?;
                let page = PageParams {
                    first: *first,
                    after,
                };
                graph
                    .query_json(entity, field, &value, &page)
                    .map(Outcome::Page)
            }
            Action::VerifyIndex => {
                let index = graph.manager().index();
                graph.manager().verify_index().and_then(|diff| {
                    Ok(Outcome::IndexChecked {
                        diff,
                        fingerprint: index.fingerprint()?,
                    })
                })
            }
        })
    }

    fn bind(&mut self, name: Option<&str>, reference: Option<&str>, record: Record) -> Outcome {
        for key in name.into_iter().chain(reference) {
            self.bindings.insert(key.to_string(), record.clone());
        }
        Outcome::Record(record)
    }

    /// Resolve `$name` / `$name.revision`; other strings pass through.
    fn resolve(&self, text: &str) -> anyhow::Result<String> {
        let Some(reference) = text.strip_prefix('$') else {
            return Ok(text.to_string());
        };
        let (name, part) = reference.split_once('.').unwrap_or((reference, "id"));
        let record = self
            .bindings
            .get(name)
            .ok_or_else(|| anyhow!("unbound reference ${name}"))?;
        match part {
            "id" => Ok(record.id.to_string()),
            "origin" => Ok(record.origin.to_hex()),
            "revision" => Ok(record.revision_id.to_hex()),
            "cursor" => Ok(record.cursor().to_string()),
            other => bail!("unknown reference part .{other} in {text}"),
        }
    }

    fn resolve_value(&self, value: &Value) -> anyhow::Result<Value> {
        Ok(match value {
            Value::String(text) => Value::String(self.resolve(text)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<anyhow::Result<_>>()?,
            ),
            Value::Object(object) => Value::Object(
                object
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
                    .collect::<anyhow::Result<_>>()?,
            ),
            other => other.clone(),
        })
    }
}

/// The binding name when `id` is exactly `$name`.
fn plain_reference(id: &str) -> Option<&str> {
    id.strip_prefix('$').filter(|name| !name.contains('.'))
}
