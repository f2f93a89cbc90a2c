//! Editor state: the single owner of the document and everything derived
//! from it.
//!
//! All edits go through [`EditorState::submit`]. A submission builds one
//! transaction, applies each update in order, and either installs the
//! result or discards the whole thing. Installation is where the derived
//! layers catch up: mark placeholders are parked or evicted, the list
//! shape is checked, history records the replaced state, binding
//! registries reconcile, and the visual index relabels when a watched
//! block changed.

use std::sync::Arc;

use notewell_model::{schema::types, IdGenerator, Mark, Node, Schema, Selection, Transaction};
use serde_json::Value;

use crate::bindings::{
    AsyncNodeBinding, AsyncStatus, CodeBlockBinding, ReferenceBinding, TaskItemBinding,
};
use crate::errors::EditorError;
use crate::history::{History, Snapshot};
use crate::lists;
use crate::mark_holder;
use crate::registry::BindingRegistry;
use crate::update::{DocumentUpdate, SetNodeAttr, UpdateContext, UpdateOutcome};
use crate::visual_index::VisualIndex;

/// Transaction metadata keys the state machinery understands.
pub mod meta {
    /// Set to `false` to keep a submission out of the undo history.
    pub const ADD_TO_HISTORY: &str = "addToHistory";
}

pub struct EditorState {
    schema: Arc<Schema>,
    ids: IdGenerator,
    doc: Node,
    selection: Selection,
    stored_marks: Option<Vec<Mark>>,
    version: u64,
    history: History,
    code_blocks: BindingRegistry<CodeBlockBinding>,
    async_nodes: BindingRegistry<AsyncNodeBinding>,
    references: BindingRegistry<ReferenceBinding>,
    task_items: BindingRegistry<TaskItemBinding>,
    visual_index: VisualIndex,
}

impl EditorState {
    /// Create a state over an existing document. The session string seeds
    /// the id generator, so two sessions never mint the same id.
    pub fn new(session: &str, doc: Node) -> Self {
        let mut state = Self {
            schema: Arc::new(Schema::notebook()),
            ids: IdGenerator::new(session),
            doc,
            selection: Selection::caret(1),
            stored_marks: None,
            version: 0,
            history: History::new(),
            code_blocks: BindingRegistry::new(types::CODE_BLOCK),
            async_nodes: BindingRegistry::new(types::ASYNC_NODE),
            references: BindingRegistry::new(types::REFERENCE),
            task_items: BindingRegistry::new(types::TASK_LIST_ITEM),
            visual_index: VisualIndex::new(),
        };
        state.reconcile_derived(true);
        state
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = mark_holder::normalize_caret(&self.doc, selection);
    }

    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    /// Monotonic document version, bumped on every install and restore.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn visual_index(&self) -> &VisualIndex {
        &self.visual_index
    }

    pub fn code_blocks(&self) -> &BindingRegistry<CodeBlockBinding> {
        &self.code_blocks
    }

    pub fn code_blocks_mut(&mut self) -> &mut BindingRegistry<CodeBlockBinding> {
        &mut self.code_blocks
    }

    pub fn async_nodes(&self) -> &BindingRegistry<AsyncNodeBinding> {
        &self.async_nodes
    }

    pub fn references(&self) -> &BindingRegistry<ReferenceBinding> {
        &self.references
    }

    pub fn task_items(&self) -> &BindingRegistry<TaskItemBinding> {
        &self.task_items
    }

    /// Apply a chain of updates as one transaction. Either every update
    /// applies and the result installs, or nothing changes at all.
    pub fn submit(&mut self, updates: &[&dyn DocumentUpdate]) -> bool {
        self.submit_with_meta(updates, &[])
    }

    /// Like [`submit`](Self::submit), with transaction metadata attached
    /// before the updates run.
    pub fn submit_with_meta(
        &mut self,
        updates: &[&dyn DocumentUpdate],
        meta: &[(&str, Value)],
    ) -> bool {
        if updates.is_empty() {
            return false;
        }
        let mut tr = Transaction::new(
            self.schema.clone(),
            self.doc.clone(),
            self.selection.clone(),
        );
        tr.set_stored_marks(self.stored_marks.clone());
        for (key, value) in meta {
            tr.set_meta(*key, value.clone());
        }
        let cx = UpdateContext { ids: &self.ids };
        for update in updates {
            if update.apply(&mut tr, &cx) == UpdateOutcome::Rejected {
                tracing::debug!(update = %update.describe(), "transaction discarded");
                return false;
            }
        }
        let description = updates
            .iter()
            .map(|u| u.describe())
            .collect::<Vec<_>>()
            .join(", ");
        self.install(tr, &description)
    }

    /// Commit a finished transaction. Runs the placeholder pass, checks
    /// the list shape, records history, then swaps the document in and
    /// lets the derived layers catch up.
    fn install(&mut self, mut tr: Transaction, description: &str) -> bool {
        if let Err(err) = mark_holder::pass(&mut tr) {
            tracing::warn!(error = %err, "placeholder pass failed, transaction discarded");
            return false;
        }
        // An edit can leave two same-type lists side by side (deleting
        // the paragraph between them, say). Heal that before checking.
        if let Err(err) = lists::join_lists_around(&mut tr) {
            tracing::warn!(error = %err, "list normalization failed, transaction discarded");
            return false;
        }
        if let Err(err) = check_list_shape(&self.schema, &tr.doc) {
            tracing::warn!(error = %err, "transaction discarded");
            return false;
        }

        let record = tr
            .meta(meta::ADD_TO_HISTORY)
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if record && !tr.steps().is_empty() {
            self.history.record(
                Snapshot::new(self.doc.clone(), self.selection.clone())
                    .with_stored_marks(self.stored_marks.clone()),
            );
            self.history.set_description(description);
        }

        let relabel = self.visual_index.needs_recompute(&tr);

        self.doc = tr.doc.clone();
        self.selection = mark_holder::normalize_caret(&self.doc, tr.selection());
        self.stored_marks = tr.stored_marks().map(<[Mark]>::to_vec);
        self.version += 1;
        self.reconcile_derived(relabel);
        true
    }

    /// Restore the previous state. Returns false when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> bool {
        let current = Snapshot::new(self.doc.clone(), self.selection.clone())
            .with_stored_marks(self.stored_marks.clone());
        match self.history.undo(current) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Reapply the most recently undone state.
    pub fn redo(&mut self) -> bool {
        let current = Snapshot::new(self.doc.clone(), self.selection.clone())
            .with_stored_marks(self.stored_marks.clone());
        match self.history.redo(current) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.doc = snapshot.doc;
        self.selection = mark_holder::normalize_caret(&self.doc, snapshot.selection);
        self.stored_marks = snapshot.stored_marks;
        self.version += 1;
        // A restore can jump to an arbitrary earlier document, so the
        // index is recomputed without consulting the detector.
        self.reconcile_derived(true);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_levels(&self) -> usize {
        self.history.undo_levels()
    }

    pub fn redo_levels(&self) -> usize {
        self.history.redo_levels()
    }

    /// Group the submissions until [`end_batch`](Self::end_batch) into
    /// one undo step.
    pub fn begin_batch(&mut self) {
        self.history.begin_batch();
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    /// Mark an async node as executing. Its durable output attribute is
    /// untouched until [`complete_async`](Self::complete_async).
    pub fn begin_async(&mut self, id: &str) -> bool {
        match self.async_nodes.get_mut(id) {
            Some(entry) => {
                entry.binding.begin();
                true
            }
            None => false,
        }
    }

    /// Deliver the result of an async execution. A completion for a node
    /// that has since been deleted is ignored. The output lands in the
    /// node's durable attribute, outside the undo history.
    pub fn complete_async(&mut self, id: &str, output: Value) -> bool {
        if self.async_nodes.get(id).is_none() {
            tracing::debug!(id, "async completion for a removed node, ignored");
            return false;
        }
        let set = SetNodeAttr {
            id: id.to_string(),
            attr: notewell_model::attrs::OUTPUT.to_string(),
            value: output,
        };
        self.submit_with_meta(&[&set], &[(meta::ADD_TO_HISTORY, Value::Bool(false))])
    }

    /// Execution status of an async node, if it is still in the document.
    pub fn async_status(&self, id: &str) -> Option<&AsyncStatus> {
        self.async_nodes.get(id).map(|entry| &entry.binding.status)
    }

    fn reconcile_derived(&mut self, relabel: bool) {
        self.code_blocks.reconcile(&self.doc);
        self.async_nodes.reconcile(&self.doc);
        self.references.reconcile(&self.doc);
        self.task_items.reconcile(&self.doc);
        if relabel {
            self.visual_index.recompute(&self.doc);
        }
        let index = &self.visual_index;
        self.references
            .for_each_mut(|entry| entry.binding.refresh(index));
    }
}

/// Structural rules the list algorithms promise to maintain: lists are
/// never empty, every item starts with its content wrapper, and two
/// sibling lists of the same type never sit next to each other.
fn check_list_shape(schema: &Schema, doc: &Node) -> Result<(), EditorError> {
    let mut violation: Option<String> = None;
    let check_children = |node: &Node| {
        for pair in node.children().windows(2) {
            if pair[0].name == pair[1].name && schema.list_kind(&pair[0]).is_some() {
                return Some(format!("adjacent {} siblings", pair[0].name));
            }
        }
        None
    };
    if let Some(v) = check_children(doc) {
        violation = Some(v);
    }
    doc.for_each_node(&mut |_, node| {
        if violation.is_some() || !node.is_element() {
            return;
        }
        if let Some(kind) = schema.list_kind(node) {
            if node.child_count() == 0 {
                violation = Some(format!("empty {}", node.name));
                return;
            }
            let item = Schema::item_type_for(kind);
            if node.children().iter().any(|c| c.name != item) {
                violation = Some(format!("{} holds a non-{} child", node.name, item));
                return;
            }
        }
        if schema.is_list_item(node) {
            match node.children().first() {
                Some(first) if first.name == types::LIST_ITEM_CONTENT => {}
                _ => {
                    violation = Some(format!("{} does not start with its wrapper", node.name));
                    return;
                }
            }
        }
        if let Some(v) = check_children(node) {
            violation = Some(v);
        }
    });
    match violation {
        None => Ok(()),
        Some(msg) => Err(EditorError::Invariant(msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{DeleteRange, InsertText, SetHeadingLevel};
    use notewell_model::{Attrs, Fragment};
    use serde_json::json;

    fn para(text: &str) -> Node {
        Node::element(
            types::PARAGRAPH,
            Attrs::new(),
            Fragment::from_node(Node::text(text, vec![])),
        )
    }

    fn doc(children: Vec<Node>) -> Node {
        Node::element(types::DOC, Attrs::new(), Fragment::new(children))
    }

    fn state(children: Vec<Node>) -> EditorState {
        EditorState::new("test", doc(children))
    }

    #[test]
    fn test_submit_installs_and_bumps_version() {
        let mut state = state(vec![para("ab")]);
        state.set_selection(Selection::caret(2));
        assert!(state.submit(&[&InsertText { text: "x".into() }]));
        assert_eq!(state.doc().text_content(), "axb");
        assert_eq!(state.version(), 1);
        assert_eq!(*state.selection(), Selection::caret(3));
    }

    #[test]
    fn test_rejected_update_discards_whole_chain() {
        let mut state = state(vec![para("ab")]);
        state.set_selection(Selection::caret(1));
        let ok = InsertText { text: "x".into() };
        let bad = DeleteRange { from: 2, to: 2 };
        assert!(!state.submit(&[&ok, &bad]));
        assert_eq!(state.doc().text_content(), "ab");
        assert_eq!(state.version(), 0);
        assert!(!state.can_undo());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut state = state(vec![para("ab")]);
        state.set_selection(Selection::caret(3));
        assert!(state.submit(&[&InsertText { text: "c".into() }]));
        assert!(state.undo());
        assert_eq!(state.doc().text_content(), "ab");
        assert!(state.redo());
        assert_eq!(state.doc().text_content(), "abc");
        assert_eq!(*state.selection(), Selection::caret(4));
    }

    #[test]
    fn test_meta_keeps_edit_out_of_history() {
        let mut state = state(vec![para("ab")]);
        state.set_selection(Selection::caret(3));
        let insert = InsertText { text: "c".into() };
        assert!(state.submit_with_meta(
            &[&insert],
            &[(meta::ADD_TO_HISTORY, Value::Bool(false))],
        ));
        assert_eq!(state.doc().text_content(), "abc");
        assert!(!state.can_undo());
    }

    #[test]
    fn test_complete_async_for_removed_node_is_ignored() {
        let mut state = state(vec![para("ab")]);
        assert!(!state.complete_async("gone", json!({"ok": true})));
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn test_heading_edit_relabels_index_once() {
        let ids = IdGenerator::new("seed");
        let schema = Schema::notebook();
        let heading = schema
            .create(
                types::HEADING,
                Attrs::new(),
                vec![Node::text("Title", vec![])],
                &ids,
            )
            .expect("heading");
        let id = heading.id().map(str::to_string).unwrap_or_default();
        let mut state = state(vec![heading, para("body")]);
        let after_init = state.visual_index().recomputations();
        assert!(state.submit(&[&SetHeadingLevel {
            id: id.clone(),
            level: 3
        }]));
        assert_eq!(
            state.visual_index().recomputations(),
            after_init + 1
        );
        // Typing in the paragraph must not relabel.
        state.set_selection(Selection::caret(state.doc().size() - 3));
        assert!(state.submit(&[&InsertText { text: "!".into() }]));
        assert_eq!(state.visual_index().recomputations(), after_init + 1);
    }

    #[test]
    fn test_check_list_shape_flags_adjacent_lists() {
        let schema = Schema::notebook();
        let ids = IdGenerator::new("seed");
        let list = |text: &str| {
            let wrapper = schema
                .create(
                    types::LIST_ITEM_CONTENT,
                    Attrs::new(),
                    vec![Node::text(text, vec![])],
                    &ids,
                )
                .expect("wrapper");
            let item = schema
                .create(types::LIST_ITEM, Attrs::new(), vec![wrapper], &ids)
                .expect("item");
            schema
                .create(types::BULLET_LIST, Attrs::new(), vec![item], &ids)
                .expect("list")
        };
        let good = doc(vec![list("a")]);
        assert!(check_list_shape(&schema, &good).is_ok());
        let bad = doc(vec![list("a"), list("b")]);
        assert!(check_list_shape(&schema, &bad).is_err());
    }
}
