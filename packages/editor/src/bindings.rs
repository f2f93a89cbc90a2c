//! Live per-node state attached to document nodes by stable identity.
//!
//! The document tree is immutable data; anything stateful that follows a
//! node around — an editor widget's scroll position, an in-flight
//! execution, a rendered cross-reference — lives in a binding object
//! keyed by the node's id and reconciled after every installed
//! transaction.

use notewell_model::{schema::attrs, Attrs};
use serde_json::Value;

use crate::visual_index::{Label, VisualIndex};

/// Snapshot of a bound node: identity, current position, current
/// attributes. Refreshed on every reconcile.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundNode {
    pub id: String,
    pub pos: usize,
    pub attrs: Attrs,
}

/// State object attached to one node for as long as that node exists.
pub trait LiveBinding {
    fn create(node: &BoundNode) -> Self
    where
        Self: Sized;

    /// The node moved or its attributes changed.
    fn update(&mut self, node: &BoundNode);

    /// The node left the document.
    fn destroy(&mut self) {}
}

/// View state for a code block. Survives edits to the block's text.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlockBinding {
    pub language: Option<String>,
    pub scroll_offset: f32,
}

impl LiveBinding for CodeBlockBinding {
    fn create(node: &BoundNode) -> Self {
        Self {
            language: language_of(&node.attrs),
            scroll_offset: 0.0,
        }
    }

    fn update(&mut self, node: &BoundNode) {
        self.language = language_of(&node.attrs);
    }
}

fn language_of(attrs: &Attrs) -> Option<String> {
    attrs
        .get(attrs::LANGUAGE)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq)]
pub enum AsyncStatus {
    Idle,
    Pending,
    Resolved(Value),
}

/// Execution state for an async node. The document only ever stores the
/// durable output attribute; the transient pending state lives here.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncNodeBinding {
    pub status: AsyncStatus,
}

impl AsyncNodeBinding {
    pub fn begin(&mut self) {
        self.status = AsyncStatus::Pending;
    }
}

impl LiveBinding for AsyncNodeBinding {
    fn create(node: &BoundNode) -> Self {
        let status = match node.attrs.get(attrs::OUTPUT) {
            Some(v) if !v.is_null() => AsyncStatus::Resolved(v.clone()),
            _ => AsyncStatus::Idle,
        };
        Self { status }
    }

    fn update(&mut self, node: &BoundNode) {
        if let Some(v) = node.attrs.get(attrs::OUTPUT) {
            if !v.is_null() {
                self.status = AsyncStatus::Resolved(v.clone());
            }
        }
    }
}

/// A rendered cross-reference. `display` is recomputed from the visual
/// index whenever the index changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceBinding {
    pub target: Option<String>,
    pub display: String,
}

impl ReferenceBinding {
    pub fn refresh(&mut self, index: &VisualIndex) {
        self.display = match &self.target {
            None => "?".to_string(),
            Some(id) => match index.label_for(id) {
                Some(Label::Assigned { kind, ordinal }) => format!("{} {}", kind, ordinal),
                Some(Label::Removed) | None => "removed".to_string(),
            },
        };
    }
}

impl LiveBinding for ReferenceBinding {
    fn create(node: &BoundNode) -> Self {
        Self {
            target: target_of(&node.attrs),
            display: "?".to_string(),
        }
    }

    fn update(&mut self, node: &BoundNode) {
        self.target = target_of(&node.attrs);
    }
}

fn target_of(attrs: &Attrs) -> Option<String> {
    attrs
        .get(attrs::TARGET)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Checkbox state mirror for a task list item.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskItemBinding {
    pub checked: bool,
}

impl LiveBinding for TaskItemBinding {
    fn create(node: &BoundNode) -> Self {
        Self {
            checked: checked_of(&node.attrs),
        }
    }

    fn update(&mut self, node: &BoundNode) {
        self.checked = checked_of(&node.attrs);
    }
}

fn checked_of(attrs: &Attrs) -> bool {
    attrs
        .get(attrs::CHECKED)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
