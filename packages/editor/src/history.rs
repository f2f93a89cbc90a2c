//! # Undo/Redo History
//!
//! Tracks editor snapshots and enables undo/redo operations.
//!
//! ## Design
//!
//! - Each committed transaction records the state it replaced
//! - Snapshots are cheap: the document tree shares unchanged branches
//! - Undo restores the recorded snapshot and saves the current state for redo
//! - New records clear the redo stack
//! - Supports batched operations (group multiple edits as one undo step)
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = History::new();
//!
//! // Before installing an edit, record what it replaces
//! history.record(Snapshot::new(doc.clone(), selection.clone()));
//!
//! // Undo: hand over the current state, get back the previous one
//! if let Some(prev) = history.undo(Snapshot::new(doc, selection)) {
//!     // install prev.doc / prev.selection
//! }
//! ```

use notewell_model::{Mark, Node, Selection};

/// A restorable editor state
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The document at this point
    pub doc: Node,

    /// The selection at this point
    pub selection: Selection,

    /// Pending marks at this point
    pub stored_marks: Option<Vec<Mark>>,
}

impl Snapshot {
    pub fn new(doc: Node, selection: Selection) -> Self {
        Self {
            doc,
            selection,
            stored_marks: None,
        }
    }

    /// Attach the pending marks that were active at this point
    pub fn with_stored_marks(mut self, marks: Option<Vec<Mark>>) -> Self {
        self.stored_marks = marks;
        self
    }
}

/// One undoable step: the state to restore, plus an optional label
#[derive(Debug, Clone)]
struct HistoryEntry {
    snapshot: Snapshot,
    description: Option<String>,
}

/// Undo/redo stack for the editor
#[derive(Debug)]
pub struct History {
    /// States replaced by committed edits (most recent last)
    undo_stack: Vec<HistoryEntry>,

    /// States replaced by undo (most recent last)
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    /// Whether a batch is open
    batching: bool,

    /// While batching, the first snapshot recorded in the batch
    current_batch: Option<HistoryEntry>,

    /// Description set before the batch has recorded anything
    pending_description: Option<String>,
}

impl History {
    /// Create a new history with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    /// Create a history with custom max levels
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            batching: false,
            current_batch: None,
            pending_description: None,
        }
    }

    /// Record the state a committed edit replaced
    pub fn record(&mut self, snapshot: Snapshot) {
        if self.batching {
            // Undoing the batch restores the state before its first edit
            if self.current_batch.is_none() {
                self.current_batch = Some(HistoryEntry {
                    snapshot,
                    description: self.pending_description.take(),
                });
            }
        } else {
            self.push_entry(HistoryEntry {
                snapshot,
                description: None,
            });
        }
    }

    /// Start a batch of edits (will be undone/redone together)
    pub fn begin_batch(&mut self) {
        self.batching = true;
        self.current_batch = None;
        self.pending_description = None;
    }

    /// End the current batch and push it as one undo step
    pub fn end_batch(&mut self) {
        self.batching = false;
        if let Some(entry) = self.current_batch.take() {
            self.push_entry(entry);
        }
    }

    /// Set description for the current batch, or for the last recorded step
    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = Some(description.into());
        if self.batching {
            match &mut self.current_batch {
                Some(batch) => batch.description = description,
                None => self.pending_description = description,
            }
        } else if let Some(last) = self.undo_stack.last_mut() {
            last.description = description;
        }
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        // Trim if exceeded max levels
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        // Clear redo stack (new action invalidates future)
        self.redo_stack.clear();
    }

    /// Undo the most recent step. Takes the current state so redo can
    /// return to it; yields the state to restore.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.snapshot)
    }

    /// Redo the most recently undone step
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.snapshot)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get the number of undo levels available
    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of redo levels available
    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batching = false;
        self.current_batch = None;
        self.pending_description = None;
    }

    /// Get description of the next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }

    /// Get description of the next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
