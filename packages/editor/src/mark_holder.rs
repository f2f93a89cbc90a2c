//! Mark placeholders for empty textblocks.
//!
//! Deleting the last character of a styled run would normally lose the
//! marks, because marks live on text. When that happens while marks are
//! still active, an invisible `mark_holder` leaf is parked in the empty
//! block to remember them. The next insertion consumes the holder and
//! inherits its marks; any other content arriving next to a holder evicts
//! it.

use notewell_model::{
    resolve, schema::types, Assoc, Attrs, Fragment, Mark, Node, Selection, Slice, Transaction,
};

use crate::errors::EditorError;

/// Build a holder leaf carrying `marks` in its attributes.
pub fn holder_node(marks: &[Mark]) -> Result<Node, EditorError> {
    let mut attrs = Attrs::new();
    let value = serde_json::to_value(marks)
        .map_err(|e| EditorError::Invariant(format!("unserializable marks: {}", e)))?;
    attrs.insert(notewell_model::attrs::MARKS.to_string(), value);
    Ok(Node::leaf(types::MARK_HOLDER, attrs))
}

/// Read the marks a holder carries. A holder with missing or malformed
/// mark data counts as carrying none.
pub fn holder_marks(node: &Node) -> Vec<Mark> {
    node.attr(notewell_model::attrs::MARKS)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

pub fn is_holder(node: &Node) -> bool {
    node.name == types::MARK_HOLDER
}

/// A caret sitting right after a holder is indistinguishable from one
/// right before it, so it is pinned to the near side. Keeps arrow-key
/// motion from ever landing "inside" the placeholder.
pub fn normalize_caret(doc: &Node, selection: Selection) -> Selection {
    let Selection::Text { anchor, head } = selection else {
        return selection;
    };
    if anchor != head {
        return selection;
    }
    let Ok(rp) = resolve(doc, head) else {
        return selection;
    };
    match rp.node_before() {
        Some(n) if is_holder(&n) => Selection::caret(head - 1),
        _ => selection,
    }
}

/// Drop holder leaves from pasted content. A slice that is exactly one
/// holder is kept whole, so copying a placeholder block moves its marks.
pub fn strip_holders(slice: &Slice) -> Slice {
    if slice.content.len() == 1 && is_holder(slice.content.child(0)) {
        return slice.clone();
    }
    Slice::new(
        strip_fragment(&slice.content),
        slice.open_start,
        slice.open_end,
    )
}

fn strip_fragment(fragment: &Fragment) -> Fragment {
    let nodes = fragment
        .nodes()
        .iter()
        .filter(|n| !is_holder(n))
        .map(|n| {
            if n.is_element() {
                n.copy(strip_fragment(&n.fragment()))
            } else {
                n.clone()
            }
        })
        .collect();
    Fragment::new(nodes)
}

/// Post-transaction pass. Looks only at textblocks the transaction
/// touched (plus the caret's block): parks a holder in a block that just
/// became empty while marks are active, and evicts holders that have
/// gained a neighbor.
pub fn pass(tr: &mut Transaction) -> Result<(), EditorError> {
    if !tr.doc_changed() && tr.stored_marks().is_none() {
        return Ok(());
    }
    let changed = changed_ranges(tr);
    let caret = tr.selection().from();

    // (content_start, action) pairs, applied back-to-front.
    let mut park: Vec<usize> = Vec::new();
    let mut evict: Vec<usize> = Vec::new();

    let doc = tr.doc.clone();
    doc.for_each_node(&mut |pos, node| {
        if !tr.schema().is_textblock(node) {
            return;
        }
        let end = pos + node.size();
        let touched = changed.iter().any(|&(f, t)| pos < t && end > f)
            || (caret >= pos && caret <= end);
        if !touched {
            return;
        }
        if node.content_size() == 0 {
            let active = tr.stored_marks().map(|m| !m.is_empty()).unwrap_or(false);
            if active {
                park.push(pos + 1);
            }
        } else {
            let children = node.children();
            if children.len() > 1 {
                let mut offset = pos + 1;
                for child in children {
                    if is_holder(child) {
                        evict.push(offset);
                    }
                    offset += child.size();
                }
            }
        }
    });

    park.sort_unstable();
    evict.sort_unstable();
    for &at in evict.iter().rev() {
        tr.delete_range(at, at + 1)?;
    }
    for &at in park.iter().rev() {
        let marks = tr.stored_marks().unwrap_or_default().to_vec();
        let holder = holder_node(&marks)?;
        tr.replace_range(at, at, Slice::closed(vec![holder]))?;
        tr.set_selection(Selection::caret(at));
    }
    Ok(())
}

/// Ranges in the current document that the transaction's steps wrote,
/// each inserted span carried forward through the later steps.
fn changed_ranges(tr: &Transaction) -> Vec<(usize, usize)> {
    let maps = tr.maps();
    let mut out = Vec::with_capacity(maps.len());
    for (i, map) in maps.iter().enumerate() {
        let mut from = map.start;
        let mut to = map.new_end();
        for later in &maps[i + 1..] {
            from = later.map(from, Assoc::Before);
            to = later.map(to, Assoc::After);
        }
        out.push((from, to));
    }
    out
}
