//! Visual index: document-order ordinals for watched node types, and the
//! change detector that decides when they must be recomputed.
//!
//! Labels feed cross-references ("Code 3", "Heading 2"). Relabeling on
//! every keystroke would be wasted churn, so a transaction first runs
//! through a detector local to the edited ranges: per step, the watched
//! nodes inside the replaced range are compared, before vs after, as a
//! sequence of (type, heading level). Only a difference triggers a
//! relabel, so the detector's cost follows the edit size rather than the
//! document size.

use std::collections::HashMap;

use notewell_model::{schema::attrs, schema::types, Node, Step, Transaction};
use serde_json::Value;

const WATCHED: [&str; 2] = [types::CODE_BLOCK, types::HEADING];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Assigned { kind: String, ordinal: usize },
    /// The node left the document; references to it render as dangling.
    Removed,
}

#[derive(Debug, Default)]
pub struct VisualIndex {
    labels: HashMap<String, Label>,
    recomputations: u64,
}

impl VisualIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label_for(&self, id: &str) -> Option<&Label> {
        self.labels.get(id)
    }

    /// How many relabel passes have run. Exposed so the cost of the
    /// detector can be observed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Whether any step changed something a label depends on: a watched
    /// node appearing, disappearing, or switching type or level inside
    /// the step's range.
    pub fn needs_recompute(&self, tr: &Transaction) -> bool {
        let maps = tr.maps();
        for (i, step) in tr.steps().iter().enumerate() {
            let map = &maps[i];
            let before = &tr.docs_before()[i];
            let after = tr.docs_before().get(i + 1).unwrap_or(&tr.doc);
            // Attribute steps report an identity range; widen it one
            // unit so the retagged node itself is in view.
            let (old_to, new_to) = match step {
                Step::SetAttrs { .. } => (map.start + 1, map.start + 1),
                Step::Replace { .. } => (map.old_end(), map.new_end()),
            };
            let old = watched_in_range(before, map.start, old_to);
            let new = watched_in_range(after, map.start, new_to);
            if old != new {
                return true;
            }
        }
        false
    }

    /// Relabel every watched node in document order, marking ids that
    /// disappeared since the last pass as removed.
    pub fn recompute(&mut self, doc: &Node) {
        let mut counters: HashMap<&str, usize> = HashMap::new();
        let mut next: HashMap<String, Label> = HashMap::new();
        doc.for_each_node(&mut |_, node| {
            if !WATCHED.contains(&node.name.as_str()) {
                return;
            }
            let Some(id) = node.id() else {
                return;
            };
            let ordinal = counters.entry(kind_name(&node.name)).or_insert(0);
            *ordinal += 1;
            next.insert(
                id.to_string(),
                Label::Assigned {
                    kind: kind_name(&node.name).to_string(),
                    ordinal: *ordinal,
                },
            );
        });
        for id in self.labels.keys() {
            if !next.contains_key(id) {
                next.insert(id.clone(), Label::Removed);
            }
        }
        self.labels = next;
        self.recomputations += 1;
    }
}

fn kind_name(node_type: &str) -> &'static str {
    match node_type {
        types::CODE_BLOCK => "Code",
        types::HEADING => "Heading",
        _ => "Node",
    }
}

/// Watched nodes overlapping `from..to`, in document order, as
/// (type, heading level) pairs. A zero-width range sees only the node it
/// sits strictly inside; a boundary position between two blocks sees
/// neither, so inserting or removing unwatched content next to a watched
/// block never registers.
fn watched_in_range(doc: &Node, from: usize, to: usize) -> Vec<(String, Option<String>)> {
    let mut out = Vec::new();
    doc.for_each_node(&mut |pos, node| {
        if !WATCHED.contains(&node.name.as_str()) {
            return;
        }
        let end = pos + node.size();
        let touched = if from == to {
            pos < from && end > from
        } else {
            pos < to && end > from
        };
        if touched {
            let level = node.attr(attrs::LEVEL).map(Value::to_string);
            out.push((node.name.clone(), level));
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_model::{Attrs, Fragment, IdGenerator, Schema, Selection};
    use serde_json::json;
    use std::sync::Arc;

    fn fixture() -> (Arc<Schema>, IdGenerator) {
        (Arc::new(Schema::notebook()), IdGenerator::new("test"))
    }

    fn para(text: &str) -> Node {
        Node::element(
            types::PARAGRAPH,
            Attrs::new(),
            Fragment::from_node(Node::text(text, vec![])),
        )
    }

    fn code(schema: &Schema, ids: &IdGenerator, text: &str) -> Node {
        schema
            .create(types::CODE_BLOCK, Attrs::new(), vec![Node::text(text, vec![])], ids)
            .expect("code")
    }

    fn doc(children: Vec<Node>) -> Node {
        Node::element(types::DOC, Attrs::new(), Fragment::new(children))
    }

    #[test]
    fn test_labels_in_document_order() {
        let (schema, ids) = fixture();
        let c1 = code(&schema, &ids, "a");
        let c2 = code(&schema, &ids, "b");
        let id1 = c1.id().expect("id").to_string();
        let id2 = c2.id().expect("id").to_string();
        let d = doc(vec![c1, para("x"), c2]);

        let mut index = VisualIndex::new();
        index.recompute(&d);
        assert_eq!(
            index.label_for(&id1),
            Some(&Label::Assigned { kind: "Code".into(), ordinal: 1 })
        );
        assert_eq!(
            index.label_for(&id2),
            Some(&Label::Assigned { kind: "Code".into(), ordinal: 2 })
        );
    }

    #[test]
    fn test_removed_nodes_keep_a_tombstone() {
        let (schema, ids) = fixture();
        let c1 = code(&schema, &ids, "a");
        let id1 = c1.id().expect("id").to_string();
        let mut index = VisualIndex::new();
        index.recompute(&doc(vec![c1]));
        index.recompute(&doc(vec![para("x")]));
        assert_eq!(index.label_for(&id1), Some(&Label::Removed));
    }

    #[test]
    fn test_typing_inside_code_block_does_not_trigger() {
        let (schema, ids) = fixture();
        let c1 = code(&schema, &ids, "ab");
        let d = doc(vec![c1]);
        let mut tr = Transaction::new(schema, d, Selection::caret(2));
        tr.insert_text(2, "x", vec![]).expect("insert");
        let index = VisualIndex::new();
        assert!(!index.needs_recompute(&tr));
    }

    #[test]
    fn test_inserting_code_block_triggers() {
        let (schema, ids) = fixture();
        let c1 = code(&schema, &ids, "ab");
        let d = doc(vec![para("p")]);
        let mut tr = Transaction::new(schema, d, Selection::caret(0));
        tr.insert(0, vec![c1]).expect("insert");
        let index = VisualIndex::new();
        assert!(index.needs_recompute(&tr));
    }

    #[test]
    fn test_heading_level_change_triggers_but_keeps_labels() {
        let (schema, ids) = fixture();
        let h = schema
            .create(types::HEADING, Attrs::new(), vec![Node::text("t", vec![])], &ids)
            .expect("heading");
        let hid = h.id().expect("id").to_string();
        let d = doc(vec![h]);
        let mut index = VisualIndex::new();
        index.recompute(&d);
        let before = index.label_for(&hid).cloned();

        let mut tr = Transaction::new(schema, d, Selection::caret(1));
        let mut attrs = Attrs::new();
        attrs.insert(attrs::LEVEL.into(), json!(2));
        tr.set_attrs(0, attrs).expect("set attrs");
        assert!(index.needs_recompute(&tr));

        // Relabeling after the retag produces the same ordinals: the
        // index ignores levels when counting.
        index.recompute(&tr.doc);
        assert_eq!(index.label_for(&hid).cloned(), before);
    }

    #[test]
    fn test_paragraph_insert_between_code_blocks_does_not_trigger() {
        let (schema, ids) = fixture();
        let c1 = code(&schema, &ids, "a");
        let c2 = code(&schema, &ids, "b");
        let d = doc(vec![c1.clone(), c2]);
        let boundary = c1.size();
        let mut tr = Transaction::new(schema, d, Selection::caret(boundary));
        tr.insert(boundary, vec![para("x")]).expect("insert");
        let index = VisualIndex::new();
        assert!(!index.needs_recompute(&tr));
    }
}
