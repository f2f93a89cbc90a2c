//! Slices: extracted document ranges with open sides.

use crate::error::ModelError;
use crate::node::{Fragment, Node};
use crate::position::resolve;

/// A piece of document content. `open_start`/`open_end` count how many
/// enclosing nodes on each side were cut through when the slice was taken,
/// so the slice can be knit back into compatible structure on insertion.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Slice {
    pub content: Fragment,
    pub open_start: usize,
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Self {
        Self {
            content: Fragment::empty(),
            open_start: 0,
            open_end: 0,
        }
    }

    /// A slice of fully closed nodes.
    pub fn closed(nodes: Vec<Node>) -> Self {
        Self {
            content: Fragment::new(nodes),
            open_start: 0,
            open_end: 0,
        }
    }

    /// Offset-space size of the slice when inserted. Saturates rather
    /// than trusting the open counts: a malformed slice reports size 0
    /// and is rejected by [`replace`](crate::replace::replace).
    pub fn size(&self) -> usize {
        self.content
            .size()
            .saturating_sub(self.open_start + self.open_end)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Whether each open level has an element to have been cut through on
    /// its side of the content. Slices produced by [`slice_range`] always
    /// are; host-supplied ones must be checked before any offset
    /// arithmetic trusts the open counts.
    pub fn is_well_formed(&self) -> bool {
        side_depth(&self.content, false) >= self.open_start
            && side_depth(&self.content, true) >= self.open_end
    }
}

fn side_depth(content: &Fragment, end: bool) -> usize {
    let child = if end {
        content.nodes().last()
    } else {
        content.nodes().first()
    };
    match child {
        Some(n) if n.is_element() => 1 + side_depth(&n.fragment(), end),
        _ => 0,
    }
}

/// Extract the content between two offsets of a document version.
pub fn slice_range(doc: &Node, from: usize, to: usize) -> Result<Slice, ModelError> {
    if from > to {
        return Err(ModelError::InvalidOffset(from));
    }
    if from == to {
        return Ok(Slice::empty());
    }
    let rf = resolve(doc, from)?;
    let rt = resolve(doc, to)?;
    let depth = rf.shared_depth(to);
    let start = rf.start(depth);
    let node = rf.node(depth);
    let content = node.fragment().cut(from - start, to - start);
    Ok(Slice::new(content, rf.depth() - depth, rt.depth() - depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attrs;

    fn para(text: &str) -> Node {
        Node::element(
            "paragraph",
            Attrs::new(),
            Fragment::from_node(Node::text(text, vec![])),
        )
    }

    fn doc() -> Node {
        Node::element("doc", Attrs::new(), Fragment::new(vec![para("ab"), para("cd")]))
    }

    #[test]
    fn test_slice_within_one_textblock() {
        let doc = doc();
        let slice = slice_range(&doc, 1, 3).expect("valid");
        assert_eq!(slice.open_start, 0);
        assert_eq!(slice.open_end, 0);
        assert_eq!(slice.size(), 2);
        assert_eq!(slice.content.child(0).text_str(), Some("ab"));
    }

    #[test]
    fn test_slice_across_blocks_is_open() {
        let doc = doc();
        let slice = slice_range(&doc, 2, 6).expect("valid");
        assert_eq!(slice.open_start, 1);
        assert_eq!(slice.open_end, 1);
        assert_eq!(slice.content.len(), 2);
        assert_eq!(slice.size(), 4);
        assert_eq!(slice.content.child(0).text_content(), "b");
        assert_eq!(slice.content.child(1).text_content(), "c");
    }

    #[test]
    fn test_whole_node_slice_is_closed() {
        let doc = doc();
        let slice = slice_range(&doc, 0, 4).expect("valid");
        assert_eq!(slice.open_start, 0);
        assert_eq!(slice.open_end, 0);
        assert_eq!(slice.size(), 4);
    }

    #[test]
    fn test_overdeep_open_side_is_malformed() {
        let bad = Slice::new(Fragment::from_node(Node::text("x", vec![])), 0, 5);
        assert!(!bad.is_well_formed());
        assert_eq!(bad.size(), 0);

        let ok = slice_range(&doc(), 2, 6).expect("valid");
        assert!(ok.is_well_formed());
    }
}
