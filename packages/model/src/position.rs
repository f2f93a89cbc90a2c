//! Offset resolution.
//!
//! Offsets are only meaningful relative to one document version; a resolved
//! position materializes the ancestor chain behind an offset so algorithms
//! can reason about depth, parents and sibling indexes without re-walking
//! the tree.

use crate::error::ModelError;
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct PathEntry {
    pub node: Node,
    /// Index within `node` where the position's branch descends, or the
    /// child boundary index at the final depth.
    pub index: usize,
    /// Absolute offset of the start of `node`'s content.
    pub start: usize,
}

/// An offset together with its ancestor chain.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pub pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
    index_offset: usize,
}

impl ResolvedPos {
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// Absolute offset of the start of the content of the node at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        self.path[depth].start
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Offset directly before the node at `depth` (which must be > 0).
    pub fn before(&self, depth: usize) -> usize {
        self.start(depth) - 1
    }

    pub fn after(&self, depth: usize) -> usize {
        self.end(depth) + 1
    }

    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    /// Offset within the parent's content.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// Distance into the text run the position points into, 0 when it sits
    /// on a child boundary.
    pub fn text_offset(&self) -> usize {
        self.parent_offset - self.index_offset
    }

    /// The node (or text-run remainder) directly after the position.
    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if self.text_offset() > 0 {
            let child = parent.children().get(index)?;
            return Some(child.cut(self.text_offset(), child.content_size()));
        }
        parent.children().get(index).cloned()
    }

    /// The node (or text-run prefix) directly before the position.
    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if self.text_offset() > 0 {
            let child = parent.children().get(index)?;
            return Some(child.cut(0, self.text_offset()));
        }
        if index == 0 {
            return None;
        }
        parent.children().get(index - 1).cloned()
    }

    /// Deepest depth whose node's content spans both this position and
    /// `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && pos <= self.end(depth) {
                return depth;
            }
        }
        0
    }
}

/// Resolve an offset against a document version.
pub fn resolve(doc: &Node, pos: usize) -> Result<ResolvedPos, ModelError> {
    if !doc.is_element() || pos > doc.content_size() {
        return Err(ModelError::InvalidOffset(pos));
    }
    let mut path = Vec::new();
    let mut node = doc.clone();
    let mut start = 0usize;
    let mut offset = pos;
    loop {
        let frag = node.fragment();
        let (index, child_start) = frag.find_index(offset);
        let rem = offset - child_start;
        if rem == 0 {
            path.push(PathEntry {
                node,
                index,
                start,
            });
            return Ok(ResolvedPos {
                pos,
                path,
                parent_offset: offset,
                index_offset: child_start,
            });
        }
        let child = frag.child(index).clone();
        if child.is_element() {
            path.push(PathEntry {
                node,
                index,
                start,
            });
            start = start + child_start + 1;
            offset = rem - 1;
            node = child;
            continue;
        }
        // Inside a text run.
        path.push(PathEntry {
            node,
            index,
            start,
        });
        return Ok(ResolvedPos {
            pos,
            path,
            parent_offset: offset,
            index_offset: child_start,
        });
    }
}
