//! # Notewell Editor
//!
//! Editing engine for Notewell documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ host application: input events, rendering   │
//! └─────────────────────────────────────────────┘
//!                     ↓ submit(updates)
//! ┌─────────────────────────────────────────────┐
//! │ editor: EditorState                         │
//! │  - DocumentUpdate chains, all-or-nothing    │
//! │  - List structure edits                     │
//! │  - Mark placeholders for empty blocks       │
//! │  - Snapshot-based undo/redo                 │
//! │  - Live-binding registries per node type    │
//! │  - Visual index + cross-reference labels    │
//! └─────────────────────────────────────────────┘
//!                     ↓ Transaction / Step
//! ┌─────────────────────────────────────────────┐
//! │ model: immutable tree, replace algorithm    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The document is the source of truth**: bindings, labels and
//!    history are derived views, rebuilt from it after every install
//! 2. **Transactions are atomic**: a chain of updates installs whole or
//!    not at all
//! 3. **Identity over position**: nodes carry stable ids; derived state
//!    follows the id, not the offset
//! 4. **Derived work is lazy**: the visual index only relabels when a
//!    watched block actually changed
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notewell_editor::{EditorState, InsertText};
//!
//! let mut state = EditorState::new("client-1", doc);
//!
//! // Apply an edit
//! state.submit(&[&InsertText { text: "hello".into() }]);
//!
//! // Undo it
//! state.undo();
//! ```

mod bindings;
mod errors;
mod history;
mod lists;
mod mark_holder;
mod registry;
mod state;
mod update;
mod visual_index;

pub use bindings::{
    AsyncNodeBinding, AsyncStatus, BoundNode, CodeBlockBinding, LiveBinding, ReferenceBinding,
    TaskItemBinding,
};
pub use errors::EditorError;
pub use history::{History, Snapshot};
pub use lists::{
    DedentListItems, IndentListItems, JoinBackward, SplitListItem, ToggleList,
};
pub use mark_holder::{holder_marks, holder_node, is_holder, strip_holders};
pub use registry::{BindingRegistry, Entry};
pub use state::{meta, EditorState};
pub use update::{
    DeleteRange, DocumentUpdate, InsertText, Paste, SetHeadingLevel, SetNodeAttr, ToggleMark,
    UpdateContext, UpdateOutcome,
};
pub use visual_index::{Label, VisualIndex};

// Re-export common model types for convenience
pub use notewell_model::{ListKind, Mark, Node, Selection, Slice, Transaction};
