//! Selection state carried alongside the document and remapped through
//! every applied step.

use serde::{Deserialize, Serialize};

use crate::step::{Assoc, StepMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Selection {
    /// A cursor or inline range between `anchor` and `head`.
    Text { anchor: usize, head: usize },
    /// A whole node selected by the position before it.
    Node { at: usize },
    /// A caret between two blocks where no textblock exists.
    Gap { at: usize },
}

impl Selection {
    pub fn caret(pos: usize) -> Selection {
        Selection::Text { anchor: pos, head: pos }
    }

    pub fn from(&self) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.min(head),
            Selection::Node { at } | Selection::Gap { at } => at,
        }
    }

    pub fn to(&self) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.max(head),
            Selection::Node { at } | Selection::Gap { at } => at,
        }
    }

    pub fn is_caret(&self) -> bool {
        match *self {
            Selection::Text { anchor, head } => anchor == head,
            Selection::Gap { .. } => true,
            Selection::Node { .. } => false,
        }
    }

    /// Carry the selection across one step. A node selection whose node
    /// was swallowed by the step degrades to a text caret at the edit.
    pub fn map(&self, map: &StepMap) -> Selection {
        match *self {
            Selection::Text { anchor, head } => Selection::Text {
                anchor: map.map(anchor, Assoc::Before),
                head: map.map(head, Assoc::Before),
            },
            Selection::Node { at } => {
                if map.touches(at, at + 1) {
                    Selection::caret(map.map(at, Assoc::Before))
                } else {
                    Selection::Node { at: map.map(at, Assoc::Before) }
                }
            }
            Selection::Gap { at } => Selection::Gap { at: map.map(at, Assoc::Before) },
        }
    }
}
