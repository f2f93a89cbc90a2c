//! Change builder. A transaction applies steps eagerly against a working
//! copy of the document, so later steps address positions in the result of
//! earlier ones. Nothing is visible outside until the caller installs the
//! finished transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ModelError;
use crate::node::{Attrs, Fragment, Mark, Node};
use crate::position::resolve;
use crate::schema::Schema;
use crate::selection::Selection;
use crate::slice::Slice;
use crate::step::{Assoc, Step, StepMap};

pub struct Transaction {
    schema: Arc<Schema>,
    /// The document this transaction started from.
    pub before: Node,
    /// The working document after every step so far.
    pub doc: Node,
    steps: Vec<Step>,
    maps: Vec<StepMap>,
    /// Snapshot of the document before each step, index-aligned with
    /// `steps`. Cheap: versions share unchanged branches.
    docs_before: Vec<Node>,
    selection: Selection,
    stored_marks: Option<Vec<Mark>>,
    meta: BTreeMap<String, Value>,
}

impl Transaction {
    pub fn new(schema: Arc<Schema>, doc: Node, selection: Selection) -> Self {
        Self {
            schema,
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            maps: Vec::new(),
            docs_before: Vec::new(),
            selection,
            stored_marks: None,
            meta: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn docs_before(&self) -> &[Node] {
        &self.docs_before
    }

    pub fn doc_changed(&self) -> bool {
        self.maps.iter().any(|m| m.structural)
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Pin the selection. Later steps still remap it.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    pub fn set_stored_marks(&mut self, marks: Option<Vec<Mark>>) {
        self.stored_marks = marks;
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: Value) {
        self.meta.insert(key.into(), value);
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Apply one step to the working document. On failure the transaction
    /// is untouched and the error propagates to the caller, who discards
    /// the whole transaction.
    pub fn step(&mut self, step: Step) -> Result<(), ModelError> {
        let next = step.apply(&self.schema, &self.doc)?;
        let map = step.map();
        self.docs_before.push(std::mem::replace(&mut self.doc, next));
        self.selection = self.selection.map(&map);
        self.steps.push(step);
        self.maps.push(map);
        Ok(())
    }

    pub fn replace_range(&mut self, from: usize, to: usize, slice: Slice) -> Result<(), ModelError> {
        self.step(Step::Replace { from, to, slice })
    }

    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<(), ModelError> {
        self.replace_range(from, to, Slice::empty())
    }

    pub fn insert(&mut self, pos: usize, nodes: Vec<Node>) -> Result<(), ModelError> {
        self.replace_range(pos, pos, Slice::closed(nodes))
    }

    pub fn insert_text(
        &mut self,
        pos: usize,
        text: &str,
        marks: Vec<Mark>,
    ) -> Result<(), ModelError> {
        if text.is_empty() {
            return Ok(());
        }
        self.insert(pos, vec![Node::text(text, marks)])
    }

    pub fn set_attrs(&mut self, pos: usize, attrs: Attrs) -> Result<(), ModelError> {
        self.step(Step::SetAttrs { pos, attrs })
    }

    /// Split the ancestors around `pos` up to `depth` levels, leaving an
    /// open seam that the replace algorithm closes on both sides. Entries
    /// in `types_after` override the node opened on the right at each
    /// level, outermost first.
    pub fn split(
        &mut self,
        pos: usize,
        depth: usize,
        types_after: &[Option<(String, Attrs)>],
    ) -> Result<(), ModelError> {
        let rp = resolve(&self.doc, pos)?;
        if depth == 0 || depth > rp.depth() {
            return Err(ModelError::InvalidStep(format!(
                "cannot split {} levels at {}",
                depth, pos
            )));
        }
        let mut before = Fragment::empty();
        let mut after = Fragment::empty();
        let mut level = rp.depth();
        let mut i = depth as isize - 1;
        while level > rp.depth() - depth {
            let node = rp.node(level);
            before = Fragment::from_node(node.copy(before));
            let right = match types_after.get(i as usize).and_then(|t| t.as_ref()) {
                Some((name, attrs)) => Node::element(name.clone(), attrs.clone(), after),
                None => node.copy(after),
            };
            after = Fragment::from_node(right);
            level -= 1;
            i -= 1;
        }
        let slice = Slice::new(before.append(&after), depth, depth);
        self.replace_range(pos, pos, slice)
    }

    /// Join the nodes on either side of `pos`, which must sit between a
    /// close marker and an open marker of compatible nodes.
    pub fn join(&mut self, pos: usize) -> Result<(), ModelError> {
        if pos == 0 {
            return Err(ModelError::InvalidOffset(0));
        }
        self.replace_range(pos - 1, pos + 1, Slice::empty())
    }

    /// Carry a position from before step `since` to the current document.
    pub fn map_from(&self, pos: usize, since: usize, assoc: Assoc) -> usize {
        self.maps[since..]
            .iter()
            .fold(pos, |p, m| m.map(p, assoc))
    }

    /// Carry a position from the starting document to the current one.
    pub fn map_offset(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_from(pos, 0, assoc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::notebook())
    }

    fn para(text: &str) -> Node {
        Node::element(
            "paragraph",
            Attrs::new(),
            Fragment::from_node(Node::text(text, vec![])),
        )
    }

    fn doc(children: Vec<Node>) -> Node {
        Node::element("doc", Attrs::new(), Fragment::new(children))
    }

    #[test]
    fn test_insert_text_moves_caret_context() {
        let d = doc(vec![para("ad")]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(2));
        tr.insert_text(2, "bc", vec![]).expect("insert");
        assert_eq!(tr.doc.text_content(), "abcd");
        assert!(tr.doc_changed());
        assert_eq!(tr.map_offset(3, Assoc::After), 5);
        assert_eq!(tr.docs_before().len(), 1);
        assert_eq!(tr.docs_before()[0].text_content(), "ad");
    }

    #[test]
    fn test_split_paragraph() {
        let d = doc(vec![para("ab")]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(2));
        tr.split(2, 1, &[None]).expect("split");
        assert_eq!(tr.doc.child_count(), 2);
        assert_eq!(tr.doc.children()[0].text_content(), "a");
        assert_eq!(tr.doc.children()[1].text_content(), "b");
    }

    #[test]
    fn test_split_with_type_override() {
        let mut attrs = Attrs::new();
        attrs.insert("id".into(), json!("p2"));
        let d = doc(vec![Node::element(
            "heading",
            {
                let mut a = Attrs::new();
                a.insert("level".into(), json!(1));
                a
            },
            Fragment::from_node(Node::text("hi", vec![])),
        )]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(3));
        tr.split(3, 1, &[Some(("paragraph".into(), attrs))])
            .expect("split");
        assert_eq!(tr.doc.children()[0].name, "heading");
        assert_eq!(tr.doc.children()[1].name, "paragraph");
        assert_eq!(tr.doc.children()[1].id(), Some("p2"));
    }

    #[test]
    fn test_join_paragraphs() {
        let d = doc(vec![para("ab"), para("cd")]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(5));
        tr.join(4).expect("join");
        assert_eq!(tr.doc.child_count(), 1);
        assert_eq!(tr.doc.text_content(), "abcd");
    }

    #[test]
    fn test_failed_step_leaves_transaction_intact() {
        let d = doc(vec![para("ab")]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(1));
        // Bare text is not valid document content.
        let err = tr.insert(0, vec![Node::text("x", vec![])]);
        assert!(err.is_err());
        assert_eq!(tr.steps().len(), 0);
        assert_eq!(tr.doc.text_content(), "ab");
    }

    #[test]
    fn test_selection_follows_edits() {
        let d = doc(vec![para("ab"), para("cd")]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(6));
        tr.insert_text(1, "xx", vec![]).expect("insert");
        assert_eq!(tr.selection(), Selection::caret(8));
    }
}
