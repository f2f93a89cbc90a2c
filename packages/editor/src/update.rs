//! Document updates: the operations the host application submits.
//!
//! Every update is a plain parameter-holding struct. Applying one never
//! panics and never half-finishes visibly: it either extends the
//! transaction and reports [`UpdateOutcome::Applied`], or reports
//! [`UpdateOutcome::Rejected`], in which case the caller throws the whole
//! transaction away.

use notewell_model::{
    resolve, schema::types, Attrs, IdGenerator, Mark, Node, Selection, Slice, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EditorError;
use crate::mark_holder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Rejected,
}

/// Shared services an update may draw on while applying.
pub struct UpdateContext<'a> {
    pub ids: &'a IdGenerator,
}

pub trait DocumentUpdate {
    /// Human-readable label, used for history entries and logs.
    fn describe(&self) -> String;

    fn apply(&self, tr: &mut Transaction, cx: &UpdateContext) -> UpdateOutcome;
}

/// Run a fallible update body and collapse failures into a rejection.
pub(crate) fn outcome(
    update: &dyn DocumentUpdate,
    result: Result<(), EditorError>,
) -> UpdateOutcome {
    match result {
        Ok(()) => UpdateOutcome::Applied,
        Err(err) => {
            tracing::debug!(update = %update.describe(), error = %err, "update rejected");
            UpdateOutcome::Rejected
        }
    }
}

/// Insert text at the caret, replacing the selection if one is open.
/// Consumes a mark placeholder sitting at the caret; otherwise the text
/// takes the stored marks, falling back to the marks before the caret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertText {
    pub text: String,
}

impl InsertText {
    fn run(&self, tr: &mut Transaction) -> Result<(), EditorError> {
        if self.text.is_empty() {
            return Err(EditorError::NotApplicable("empty text".into()));
        }
        let sel = tr.selection();
        let (from, to) = (sel.from(), sel.to());
        if from != to {
            tr.delete_range(from, to)?;
        }
        let rp = resolve(&tr.doc, from)?;
        let marks = match rp.node_after() {
            Some(n) if mark_holder::is_holder(&n) => {
                let marks = mark_holder::holder_marks(&n);
                tr.delete_range(from, from + 1)?;
                marks
            }
            _ => match tr.stored_marks() {
                Some(stored) => stored.to_vec(),
                None => marks_at(&tr.doc, from),
            },
        };
        let width = self.text.chars().count();
        tr.insert_text(from, &self.text, marks)?;
        tr.set_selection(Selection::caret(from + width));
        tr.set_stored_marks(None);
        Ok(())
    }
}

impl DocumentUpdate for InsertText {
    fn describe(&self) -> String {
        format!("insert text ({} chars)", self.text.chars().count())
    }

    fn apply(&self, tr: &mut Transaction, _cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr);
        outcome(self, result)
    }
}

/// Delete a document range. The replace algorithm closes the seam, so a
/// range spanning block boundaries joins the blocks around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRange {
    pub from: usize,
    pub to: usize,
}

impl DeleteRange {
    fn run(&self, tr: &mut Transaction) -> Result<(), EditorError> {
        if self.from >= self.to {
            return Err(EditorError::NotApplicable("empty range".into()));
        }
        // Remember the marks being deleted, so an emptied styled block
        // can keep them in a placeholder.
        let marks = marks_at(&tr.doc, self.to);
        tr.delete_range(self.from, self.to)?;
        tr.set_selection(Selection::caret(self.from));
        if !marks.is_empty() && tr.stored_marks().is_none() {
            let rp = resolve(&tr.doc, self.from)?;
            if tr.schema().is_textblock(rp.parent()) && rp.parent().content_size() == 0 {
                tr.set_stored_marks(Some(marks));
            }
        }
        Ok(())
    }
}

impl DocumentUpdate for DeleteRange {
    fn describe(&self) -> String {
        format!("delete {}..{}", self.from, self.to)
    }

    fn apply(&self, tr: &mut Transaction, _cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr);
        outcome(self, result)
    }
}

/// Retag a heading's level without touching its content or identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetHeadingLevel {
    pub id: String,
    pub level: u8,
}

impl SetHeadingLevel {
    fn run(&self, tr: &mut Transaction) -> Result<(), EditorError> {
        if !(1..=6).contains(&self.level) {
            return Err(EditorError::NotApplicable(format!(
                "heading level {} out of range",
                self.level
            )));
        }
        let (pos, node) = tr
            .doc
            .find_by_id(&self.id)
            .ok_or_else(|| EditorError::UnknownNode(self.id.clone()))?;
        if node.name != types::HEADING {
            return Err(EditorError::NotApplicable(format!(
                "{} is a {}, not a heading",
                self.id, node.name
            )));
        }
        let mut attrs = Attrs::new();
        attrs.insert(
            notewell_model::attrs::LEVEL.to_string(),
            Value::from(self.level),
        );
        tr.set_attrs(pos, attrs)?;
        Ok(())
    }
}

impl DocumentUpdate for SetHeadingLevel {
    fn describe(&self) -> String {
        format!("set heading level {}", self.level)
    }

    fn apply(&self, tr: &mut Transaction, _cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr);
        outcome(self, result)
    }
}

/// Set a single attribute on the node with the given id. The identity
/// attribute itself is off limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNodeAttr {
    pub id: String,
    pub attr: String,
    pub value: Value,
}

impl SetNodeAttr {
    fn run(&self, tr: &mut Transaction) -> Result<(), EditorError> {
        if self.attr == notewell_model::ID_ATTR {
            return Err(EditorError::NotApplicable("node ids are immutable".into()));
        }
        let (pos, node) = tr
            .doc
            .find_by_id(&self.id)
            .ok_or_else(|| EditorError::UnknownNode(self.id.clone()))?;
        check_attr_value(&node, &self.attr, &self.value)?;
        let mut attrs = Attrs::new();
        attrs.insert(self.attr.clone(), self.value.clone());
        tr.set_attrs(pos, attrs)?;
        Ok(())
    }
}

fn check_attr_value(node: &Node, attr: &str, value: &Value) -> Result<(), EditorError> {
    use notewell_model::attrs;
    let ok = match (node.name.as_str(), attr) {
        (types::TASK_LIST_ITEM, attrs::CHECKED) => value.is_boolean(),
        (types::CODE_BLOCK, attrs::LANGUAGE) => value.is_string(),
        (types::REFERENCE, attrs::TARGET) => value.is_string(),
        (types::HEADING, attrs::LEVEL) => value.as_u64().map(|l| (1..=6).contains(&l)).unwrap_or(false),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(EditorError::NotApplicable(format!(
            "bad value for {} on {}",
            attr, node.name
        )))
    }
}

impl DocumentUpdate for SetNodeAttr {
    fn describe(&self) -> String {
        format!("set {} on {}", self.attr, self.id)
    }

    fn apply(&self, tr: &mut Transaction, _cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr);
        outcome(self, result)
    }
}

/// Toggle an inline mark. On a caret this flips the stored marks for the
/// next insertion; on a range it adds the mark everywhere unless every
/// text node already carries it, in which case it is removed everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleMark {
    pub mark: Mark,
}

impl ToggleMark {
    fn run(&self, tr: &mut Transaction) -> Result<(), EditorError> {
        let sel = tr.selection();
        let (from, to) = (sel.from(), sel.to());
        if from == to {
            let mut marks = match tr.stored_marks() {
                Some(stored) => stored.to_vec(),
                None => marks_at(&tr.doc, from),
            };
            if let Some(i) = marks.iter().position(|m| m.name == self.mark.name) {
                marks.remove(i);
            } else {
                marks.push(self.mark.clone());
            }
            tr.set_stored_marks(Some(marks));
            return Ok(());
        }
        let slice = notewell_model::slice_range(&tr.doc, from, to)?;
        let all_marked = text_nodes(&slice.content)
            .iter()
            .all(|n| n.marks.iter().any(|m| m.name == self.mark.name));
        if text_nodes(&slice.content).is_empty() {
            return Err(EditorError::NotApplicable("no text in range".into()));
        }
        let content = remark_fragment(&slice.content, &self.mark, !all_marked);
        tr.replace_range(
            from,
            to,
            Slice::new(content, slice.open_start, slice.open_end),
        )?;
        tr.set_selection(Selection::Text { anchor: from, head: to });
        Ok(())
    }
}

fn text_nodes(fragment: &notewell_model::Fragment) -> Vec<Node> {
    let mut out = Vec::new();
    for node in fragment.nodes() {
        if node.is_text() {
            out.push(node.clone());
        } else if node.is_element() {
            out.extend(text_nodes(&node.fragment()));
        }
    }
    out
}

fn remark_fragment(
    fragment: &notewell_model::Fragment,
    mark: &Mark,
    add: bool,
) -> notewell_model::Fragment {
    let nodes = fragment
        .nodes()
        .iter()
        .map(|n| {
            if n.is_text() {
                let mut marks: Vec<Mark> =
                    n.marks.iter().filter(|m| m.name != mark.name).cloned().collect();
                if add {
                    marks.push(mark.clone());
                }
                Node::text(n.text_str().unwrap_or(""), marks)
            } else if n.is_element() {
                n.copy(remark_fragment(&n.fragment(), mark, add))
            } else {
                n.clone()
            }
        })
        .collect();
    notewell_model::Fragment::new(nodes)
}

impl DocumentUpdate for ToggleMark {
    fn describe(&self) -> String {
        format!("toggle mark {}", self.mark.name)
    }

    fn apply(&self, tr: &mut Transaction, _cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr);
        outcome(self, result)
    }
}

/// Replace the selection with clipboard content. Mark placeholders are
/// stripped from the pasted slice first; a placeholder sitting at the
/// caret is consumed and its marks layered onto the pasted runs, like
/// [`InsertText`]. Structure the document cannot accept rejects the
/// whole paste.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paste {
    pub slice: Slice,
}

impl Paste {
    fn run(&self, tr: &mut Transaction) -> Result<(), EditorError> {
        let sel = tr.selection();
        let (from, to) = (sel.from(), sel.to());
        if from != to {
            tr.delete_range(from, to)?;
        }
        let mut slice = mark_holder::strip_holders(&self.slice);
        let rp = resolve(&tr.doc, from)?;
        if let Some(n) = rp.node_after() {
            if mark_holder::is_holder(&n) {
                let marks = mark_holder::holder_marks(&n);
                tr.delete_range(from, from + 1)?;
                if !marks.is_empty() {
                    slice = Slice::new(
                        add_marks_fragment(&slice.content, &marks),
                        slice.open_start,
                        slice.open_end,
                    );
                }
            }
        }
        let width = slice.size();
        tr.replace_range(from, from, slice)?;
        tr.set_selection(Selection::caret(from + width));
        tr.set_stored_marks(None);
        Ok(())
    }
}

fn add_marks_fragment(fragment: &notewell_model::Fragment, marks: &[Mark]) -> notewell_model::Fragment {
    let nodes = fragment
        .nodes()
        .iter()
        .map(|n| {
            if n.is_text() {
                let mut all = n.marks.clone();
                for mark in marks {
                    if !all.iter().any(|m| m.name == mark.name) {
                        all.push(mark.clone());
                    }
                }
                Node::text(n.text_str().unwrap_or(""), all)
            } else if n.is_element() {
                n.copy(add_marks_fragment(&n.fragment(), marks))
            } else {
                n.clone()
            }
        })
        .collect();
    notewell_model::Fragment::new(nodes)
}

impl DocumentUpdate for Paste {
    fn describe(&self) -> String {
        "paste".to_string()
    }

    fn apply(&self, tr: &mut Transaction, _cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr);
        outcome(self, result)
    }
}

/// Marks in effect just before `pos`: the marks of the text run the caret
/// sits in or follows.
pub(crate) fn marks_at(doc: &Node, pos: usize) -> Vec<Mark> {
    let Ok(rp) = resolve(doc, pos) else {
        return Vec::new();
    };
    if let Some(n) = rp.node_before() {
        if n.is_text() {
            return n.marks.clone();
        }
    }
    if let Some(n) = rp.node_after() {
        if n.is_text() {
            return n.marks.clone();
        }
    }
    Vec::new()
}
