//! The replace algorithm: splice a [`Slice`] into a document between two
//! resolved positions, knitting the slice's open sides into the structure
//! around the gap. Every structural edit in the editor bottoms out here.

use crate::error::ModelError;
use crate::node::{Fragment, Node};
use crate::position::{resolve, ResolvedPos};
use crate::schema::Schema;
use crate::slice::Slice;

/// Replace the range between `from` and `to` with `slice`, producing the
/// next document version. Fails whole — an invalid result never escapes.
pub fn replace(
    schema: &Schema,
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
) -> Result<Node, ModelError> {
    if from.pos > to.pos {
        return Err(ModelError::InvalidOffset(from.pos));
    }
    if !slice.is_well_formed()
        || slice.open_start > from.depth()
        || slice.open_end > to.depth()
    {
        return Err(ModelError::BadSlice);
    }
    if from.depth() - slice.open_start != to.depth() - slice.open_end {
        return Err(ModelError::BadSlice);
    }
    replace_outer(schema, from, to, slice, 0)
}

fn replace_outer(
    schema: &Schema,
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ModelError> {
    let index = from.index(depth);
    let node = from.node(depth).clone();
    if index == to.index(depth) && depth < from.depth() - slice.open_start {
        // The change is entirely inside one child.
        let inner = replace_outer(schema, from, to, slice, depth + 1)?;
        Ok(node.copy(node.fragment().replace_child(index, inner)))
    } else if slice.is_empty() {
        close(schema, &node, replace_two_way(schema, from, to, depth)?)
    } else if slice.open_start == 0
        && slice.open_end == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        // Flat case: closed content dropped straight into one parent.
        let parent = from.parent();
        let content = parent.fragment();
        let new = content
            .cut(0, from.parent_offset())
            .append(&slice.content)
            .append(&content.cut(to.parent_offset(), content.size()));
        close(schema, parent, new)
    } else {
        let (start, end) = prepare_slice_for_replace(slice, from)?;
        close(schema, &node, replace_three_way(schema, from, &start, &end, to, depth)?)
    }
}

fn close(schema: &Schema, node: &Node, content: Fragment) -> Result<Node, ModelError> {
    schema.check_content(node, &content)?;
    Ok(node.copy(content))
}

fn joinable(
    schema: &Schema,
    before: &ResolvedPos,
    after: &ResolvedPos,
    depth: usize,
) -> Result<Node, ModelError> {
    let main = before.node(depth);
    let sub = after.node(depth);
    if !schema.compatible_content(&main.name, &sub.name) {
        return Err(ModelError::CannotJoin(sub.name.clone(), main.name.clone()));
    }
    Ok(main.clone())
}

fn add_node(node: Node, target: &mut Vec<Node>) {
    match target.last() {
        Some(last) if node.is_text() && last.is_text() && last.same_markup(&node) => {
            let joined = format!(
                "{}{}",
                last.text_str().unwrap_or(""),
                node.text_str().unwrap_or("")
            );
            let merged = Node::text(joined, node.marks.clone());
            if let Some(slot) = target.last_mut() {
                *slot = merged;
            }
        }
        _ => target.push(node),
    }
}

/// Add the children of the node at `depth` that sit after `left` (when
/// given) and before `right` (when given).
fn add_range(
    left: Option<&ResolvedPos>,
    right: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let Some(at) = right.or(left) else {
        return;
    };
    let node = at.node(depth).clone();
    let mut start_index = 0;
    let mut end_index = node.child_count();
    if let Some(r) = right {
        end_index = r.index(depth);
    }
    if let Some(l) = left {
        start_index = l.index(depth);
        if l.depth() > depth {
            start_index += 1;
        } else if l.text_offset() > 0 {
            if let Some(after) = l.node_after() {
                add_node(after, target);
            }
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        add_node(node.children()[i].clone(), target);
    }
    if let Some(r) = right {
        if r.depth() == depth && r.text_offset() > 0 {
            if let Some(before) = r.node_before() {
                add_node(before, target);
            }
        }
    }
}

fn replace_two_way(
    schema: &Schema,
    from: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let joined = joinable(schema, from, to, depth + 1)?;
        let inner = replace_two_way(schema, from, to, depth + 1)?;
        add_node(close(schema, &joined, inner)?, &mut content);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::new(content))
}

fn replace_three_way(
    schema: &Schema,
    from: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let open_start = if from.depth() > depth {
        Some(joinable(schema, from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(schema, end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(os), Some(oe)) if start.index(depth) == end.index(depth) => {
            if !schema.compatible_content(&os.name, &oe.name) {
                return Err(ModelError::CannotJoin(oe.name.clone(), os.name.clone()));
            }
            let inner = replace_three_way(schema, from, start, end, to, depth + 1)?;
            add_node(close(schema, os, inner)?, &mut content);
        }
        _ => {
            if let Some(os) = &open_start {
                let inner = replace_two_way(schema, from, start, depth + 1)?;
                add_node(close(schema, os, inner)?, &mut content);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(oe) = &open_end {
                let inner = replace_two_way(schema, end, to, depth + 1)?;
                add_node(close(schema, oe, inner)?, &mut content);
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::new(content))
}

/// Wrap the slice in copies of the nodes around `along` so its open sides
/// line up with the surrounding structure, then resolve its boundaries.
fn prepare_slice_for_replace(
    slice: &Slice,
    along: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), ModelError> {
    let extra = along.depth() - slice.open_start;
    let mut node = along.node(extra).copy(slice.content.clone());
    for d in (0..extra).rev() {
        node = along.node(d).copy(Fragment::from_node(node));
    }
    let start = resolve(&node, slice.open_start + extra)?;
    let end = resolve(&node, node.content_size() - slice.open_end - extra)?;
    Ok((start, end))
}
