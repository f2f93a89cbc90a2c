//! Atomic document steps and the position maps they leave behind.
//!
//! A [`Step`] is the smallest recorded unit of change. Each applied step
//! yields a [`StepMap`] so positions captured before the step (selections,
//! bindings, watched ranges) can be carried across it.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::node::{Attrs, Node};
use crate::position::resolve;
use crate::replace::replace;
use crate::schema::Schema;
use crate::slice::Slice;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Step {
    /// Replace the range `from..to` with a slice.
    Replace { from: usize, to: usize, slice: Slice },
    /// Rewrite the attributes of the node starting at `pos` (its opening
    /// token). Does not move any position.
    SetAttrs { pos: usize, attrs: Attrs },
}

impl Step {
    pub fn apply(&self, schema: &Schema, doc: &Node) -> Result<Node, ModelError> {
        match self {
            Step::Replace { from, to, slice } => {
                let rf = resolve(doc, *from)?;
                let rt = resolve(doc, *to)?;
                replace(schema, &rf, &rt, slice)
            }
            Step::SetAttrs { pos, attrs } => {
                let rp = resolve(doc, *pos)?;
                let node = rp
                    .node_after()
                    .ok_or(ModelError::InvalidOffset(*pos))?;
                let replaced = node.with_attrs(attrs.clone());
                Ok(rebuild_with_child(&rp, replaced))
            }
        }
    }

    pub fn map(&self) -> StepMap {
        match self {
            Step::Replace { from, to, slice } => StepMap {
                start: *from,
                old_size: to - from,
                new_size: slice.size(),
                structural: true,
            },
            Step::SetAttrs { pos, .. } => StepMap {
                start: *pos,
                old_size: 0,
                new_size: 0,
                structural: false,
            },
        }
    }
}

/// Replace the child following the resolved position with `child`,
/// copying the ancestor chain back up to a new root.
fn rebuild_with_child(rp: &crate::position::ResolvedPos, child: Node) -> Node {
    let mut node = child;
    for depth in (0..=rp.depth()).rev() {
        let parent = rp.node(depth);
        node = parent.copy(parent.fragment().replace_child(rp.index(depth), node));
    }
    node
}

/// Where a step touched the document and how the lengths changed there.
///
/// `structural` is false for attribute rewrites, which alter node content
/// without shifting any offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMap {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
    pub structural: bool,
}

/// Which side a mapped position sticks to when content is inserted
/// exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

impl StepMap {
    pub fn identity() -> StepMap {
        StepMap { start: 0, old_size: 0, new_size: 0, structural: false }
    }

    /// The end of the replaced range in the old document.
    pub fn old_end(&self) -> usize {
        self.start + self.old_size
    }

    /// The end of the inserted range in the new document.
    pub fn new_end(&self) -> usize {
        self.start + self.new_size
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        if pos < self.start || (pos == self.start && assoc == Assoc::Before) {
            return pos;
        }
        if pos < self.old_end() || (pos == self.old_end() && assoc == Assoc::Before) {
            // Inside the replaced range: collapse to the nearest edge.
            return match assoc {
                Assoc::Before => self.start,
                Assoc::After => self.new_end(),
            };
        }
        pos - self.old_size + self.new_size
    }

    /// Whether the range `from..to` in the old document overlaps the
    /// replaced range. Zero-width touches do not count as overlap.
    pub fn touches(&self, from: usize, to: usize) -> bool {
        self.start < to && self.old_end() > from
    }
}
