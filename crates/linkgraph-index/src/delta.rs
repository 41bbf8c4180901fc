//! Delta planning for one record transition.
//!
//! A transition is `(old fields, new fields)` for a single source origin:
//! `old = None` is a create, `new = None` is a delete. For each indexed
//! field the planner compares the old and new target sets and emits only
//! what changed. Targets present on both sides produce nothing, which is
//! what keeps equal-value updates from touching the index.

use std::collections::BTreeSet;

use linkgraph_types::{Address, Fields};

use crate::entry::{IndexKey, IndexedField, LinkOp};

fn targets_of(fields: Option<&Fields>, field: &IndexedField) -> BTreeSet<Address> {
    fields
        .and_then(|f| f.get(&field.key.field))
        .map(|value| value.link_targets())
        .unwrap_or_default()
}

fn remove(key: &IndexKey, target: Address, source: Address) -> LinkOp {
    LinkOp::Remove {
        key: key.clone(),
        target,
        source,
    }
}

fn insert(key: &IndexKey, target: Address, source: Address) -> LinkOp {
    LinkOp::Insert {
        key: key.clone(),
        target,
        source,
    }
}

/// Plan the index mutations for `source` moving from `old` to `new`.
///
/// Per field, removals come before insertions so an old target stops
/// matching before the new one starts. Reciprocal keys receive the mirrored
/// op with target and source swapped.
pub fn plan_link_ops(
    source: Address,
    old: Option<&Fields>,
    new: Option<&Fields>,
    indexed: &[IndexedField],
) -> Vec<LinkOp> {
    let mut ops = Vec::new();

    for field in indexed {
        let old_targets = targets_of(old, field);
        let new_targets = targets_of(new, field);

        for target in old_targets.difference(&new_targets) {
            ops.push(remove(&field.key, *target, source));
            if let Some(reciprocal) = &field.reciprocal {
                ops.push(remove(reciprocal, source, *target));
            }
        }

        for target in new_targets.difference(&old_targets) {
            ops.push(insert(&field.key, *target, source));
            if let Some(reciprocal) = &field.reciprocal {
                ops.push(insert(reciprocal, source, *target));
            }
        }
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkgraph_types::{EntityType, FieldName, FieldValue};

    use crate::index::LinkIndex;

    fn key(entity: &str, field: &str) -> IndexKey {
        IndexKey::new(
            EntityType::new(entity).unwrap(),
            FieldName::new(field).unwrap(),
        )
    }

    fn addr(seed: &str) -> Address {
        Address::from_bytes(seed.as_bytes())
    }

    fn input_of() -> IndexedField {
        IndexedField::new(key("economic_event", "inputOf"))
    }

    fn fulfills() -> IndexedField {
        IndexedField::new(key("economic_event", "fulfills"))
    }

    fn with_input(target: &str) -> Fields {
        Fields::from([(FieldName::new("inputOf").unwrap(), FieldValue::Link(addr(target)))])
    }

    fn with_fulfills(targets: &[&str]) -> Fields {
        Fields::from([(
            FieldName::new("fulfills").unwrap(),
            FieldValue::LinkSet(targets.iter().map(|t| addr(t)).collect()),
        )])
    }

    #[test]
    fn create_inserts_each_target() {
        let ops = plan_link_ops(addr("e"), None, Some(&with_input("p1")), &[input_of()]);
        assert_eq!(
            ops,
            vec![LinkOp::Insert {
                key: input_of().key,
                target: addr("p1"),
                source: addr("e"),
            }]
        );
    }

    #[test]
    fn changed_target_removes_then_inserts() {
        let ops = plan_link_ops(
            addr("e"),
            Some(&with_input("p1")),
            Some(&with_input("p2")),
            &[input_of()],
        );
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[0],
            LinkOp::Remove {
                key: input_of().key,
                target: addr("p1"),
                source: addr("e"),
            }
        );
        assert!(ops[1].is_insert());
    }

    #[test]
    fn same_target_is_noop() {
        let ops = plan_link_ops(
            addr("e"),
            Some(&with_input("p2")),
            Some(&with_input("p2")),
            &[input_of()],
        );
        assert!(ops.is_empty());
    }

    #[test]
    fn erased_target_only_removes() {
        let ops = plan_link_ops(addr("e"), Some(&with_input("p2")), Some(&Fields::new()), &[input_of()]);
        assert_eq!(ops.len(), 1);
        assert!(!ops[0].is_insert());
    }

    #[test]
    fn erase_of_null_is_noop() {
        let ops = plan_link_ops(addr("e"), Some(&Fields::new()), Some(&Fields::new()), &[input_of()]);
        assert!(ops.is_empty());
    }

    #[test]
    fn delete_removes_every_target() {
        let mut fields = with_input("p1");
        fields.extend(with_fulfills(&["c1", "c2"]));
        let ops = plan_link_ops(addr("e"), Some(&fields), None, &[input_of(), fulfills()]);
        assert_eq!(ops.len(), 3);
        assert!(ops.iter().all(|op| !op.is_insert()));
    }

    #[test]
    fn set_fields_diff_per_member() {
        let ops = plan_link_ops(
            addr("e"),
            Some(&with_fulfills(&["c1", "c2"])),
            Some(&with_fulfills(&["c2", "c3"])),
            &[fulfills()],
        );
        assert_eq!(
            ops,
            vec![
                LinkOp::Remove {
                    key: fulfills().key,
                    target: addr("c1"),
                    source: addr("e"),
                },
                LinkOp::Insert {
                    key: fulfills().key,
                    target: addr("c3"),
                    source: addr("e"),
                },
            ]
        );
    }

    #[test]
    fn unindexed_fields_are_ignored() {
        let ops = plan_link_ops(addr("e"), None, Some(&with_input("p1")), &[fulfills()]);
        assert!(ops.is_empty());
    }

    #[test]
    fn reciprocal_ops_mirror_primary() {
        let field = input_of().with_reciprocal(key("process", "inputs"));
        let ops = plan_link_ops(
            addr("e"),
            Some(&with_input("p1")),
            Some(&with_input("p2")),
            std::slice::from_ref(&field),
        );
        assert_eq!(ops.len(), 4);

        let mut idx = LinkIndex::new();
        idx.insert(&field.key, addr("p1"), addr("e"));
        idx.insert(&key("process", "inputs"), addr("e"), addr("p1"));
        idx.apply(&ops);

        assert_eq!(
            idx.lookup(&key("process", "inputs"), &addr("e")),
            BTreeSet::from([addr("p2")])
        );
        assert_eq!(idx.lookup(&field.key, &addr("p2")), BTreeSet::from([addr("e")]));
        assert!(idx.lookup(&field.key, &addr("p1")).is_empty());
    }
}
