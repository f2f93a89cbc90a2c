//! Registry of live bindings for one node type.
//!
//! After a transaction installs, each registry reconciles against the new
//! document: bindings are reused where the id survived, created for new
//! ids, and destroyed for ids that vanished. Reuse is what keeps binding
//! state (scroll offsets, pending executions) stable across edits.

use std::collections::hash_map;
use std::collections::HashMap;

use notewell_model::Node;

use crate::bindings::{BoundNode, LiveBinding};

pub struct Entry<B> {
    /// Creation ticket. Unchanged for as long as the binding lives, so a
    /// caller can tell reuse from destroy-and-recreate.
    pub serial: u64,
    pub node: BoundNode,
    pub binding: B,
}

pub struct BindingRegistry<B: LiveBinding> {
    node_type: &'static str,
    entries: HashMap<String, Entry<B>>,
    next_serial: u64,
}

impl<B: LiveBinding> BindingRegistry<B> {
    pub fn new(node_type: &'static str) -> Self {
        Self {
            node_type,
            entries: HashMap::new(),
            next_serial: 0,
        }
    }

    pub fn node_type(&self) -> &'static str {
        self.node_type
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entry<B>> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entry<B>> {
        self.entries.get_mut(id)
    }

    pub fn for_each(&self, mut f: impl FnMut(&Entry<B>)) {
        for entry in self.entries.values() {
            f(entry);
        }
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Entry<B>)) {
        for entry in self.entries.values_mut() {
            f(entry);
        }
    }

    /// Align the registry with a new document version.
    pub fn reconcile(&mut self, doc: &Node) {
        let current = collect_bound(doc, self.node_type);
        self.entries.retain(|id, entry| {
            if current.contains_key(id) {
                true
            } else {
                entry.binding.destroy();
                false
            }
        });
        for (id, node) in current {
            match self.entries.entry(id) {
                hash_map::Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    entry.binding.update(&node);
                    entry.node = node;
                }
                hash_map::Entry::Vacant(vacant) => {
                    self.next_serial += 1;
                    vacant.insert(Entry {
                        serial: self.next_serial,
                        node: node.clone(),
                        binding: B::create(&node),
                    });
                }
            }
        }
    }
}

/// All nodes of the given type, keyed by id. When a duplicated id slips
/// in (a paste that was not re-identified yet), the later occurrence in
/// document order wins.
pub(crate) fn collect_bound(doc: &Node, node_type: &str) -> HashMap<String, BoundNode> {
    let mut out = HashMap::new();
    doc.for_each_node(&mut |pos, node| {
        if node.name != node_type {
            return;
        }
        if let Some(id) = node.id() {
            out.insert(
                id.to_string(),
                BoundNode {
                    id: id.to_string(),
                    pos,
                    attrs: node.attrs.clone(),
                },
            );
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::CodeBlockBinding;
    use notewell_model::{schema::types, Attrs, Fragment, IdGenerator, Node, Schema};
    use serde_json::json;

    fn code(schema: &Schema, ids: &IdGenerator, text: &str, lang: &str) -> Node {
        let mut attrs = Attrs::new();
        attrs.insert("language".into(), json!(lang));
        schema
            .create(types::CODE_BLOCK, attrs, vec![Node::text(text, vec![])], ids)
            .expect("code block")
    }

    #[test]
    fn test_reconcile_reuses_surviving_bindings() {
        let schema = Schema::notebook();
        let ids = IdGenerator::new("test");
        let block = code(&schema, &ids, "x = 1", "py");
        let id = block.id().expect("id").to_string();
        let doc = Node::element(types::DOC, Attrs::new(), Fragment::from_node(block.clone()));

        let mut reg: BindingRegistry<CodeBlockBinding> = BindingRegistry::new(types::CODE_BLOCK);
        reg.reconcile(&doc);
        assert_eq!(reg.len(), 1);
        let serial = reg.get(&id).expect("entry").serial;
        reg.get_mut(&id).expect("entry").binding.scroll_offset = 40.0;

        // Same node, new position: binding object survives untouched.
        let para = Node::element(
            types::PARAGRAPH,
            Attrs::new(),
            Fragment::from_node(Node::text("above", vec![])),
        );
        let doc2 = Node::element(types::DOC, Attrs::new(), Fragment::new(vec![para, block]));
        reg.reconcile(&doc2);
        let entry = reg.get(&id).expect("entry");
        assert_eq!(entry.serial, serial);
        assert_eq!(entry.binding.scroll_offset, 40.0);
        assert_eq!(entry.node.pos, 7);

        // Node gone: binding dropped.
        let doc3 = Node::element(types::DOC, Attrs::new(), Fragment::empty());
        reg.reconcile(&doc3);
        assert!(reg.get(&id).is_none());
    }
}
