//! Structural list algorithms: indent, dedent, wrap/retype/unwrap, item
//! splitting, backspace merging, and the list-join normalization pass.
//!
//! All of them reduce to child-range replacement on some ancestor: build
//! the replacement nodes, swap them in with a closed slice, and let the
//! schema validation inside the replace reject anything malformed. Item
//! compatibility is always decided through schema predicates, never by
//! comparing type names at the call site.

use notewell_model::{
    resolve, schema::types, Attrs, Fragment, IdGenerator, Node, ResolvedPos, Schema, Selection,
    Slice, Transaction, ID_ATTR,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EditorError;
use crate::update::{outcome, DocumentUpdate, UpdateContext, UpdateOutcome};

/// The innermost list containing the selection, with the covered item
/// range. `first..=last` are child indexes into the list.
pub(crate) struct ListScope {
    rf: ResolvedPos,
    depth: usize,
    first: usize,
    last: usize,
}

impl ListScope {
    fn list(&self) -> &Node {
        self.rf.node(self.depth)
    }

    fn content_start(&self) -> usize {
        self.rf.start(self.depth)
    }

    fn items(&self) -> &[Node] {
        &self.list().children()[self.first..=self.last]
    }
}

pub(crate) fn list_scope(tr: &Transaction) -> Result<ListScope, EditorError> {
    let sel = tr.selection();
    let rf = resolve(&tr.doc, sel.from())?;
    let shared = rf.shared_depth(sel.to());
    let schema = tr.schema();
    let depth = (1..=shared.min(rf.depth()))
        .rev()
        .find(|&d| schema.list_kind(rf.node(d)).is_some())
        .ok_or_else(|| EditorError::NotApplicable("selection is not in a list".into()))?;

    let content = rf.node(depth).fragment();
    let cs = rf.start(depth);
    let (first, _) = content.find_index(sel.from() - cs);
    let first = first.min(content.len().saturating_sub(1));
    let rel_to = sel.to() - cs;
    let last = if rel_to == sel.from() - cs {
        first
    } else {
        let (i, start) = content.find_index(rel_to);
        if start == rel_to && i > first {
            i - 1
        } else {
            i.min(content.len() - 1)
        }
    };
    Ok(ListScope { rf, depth, first, last })
}

/// Swap the children `[from_i, to_i)` of a parent for `nodes`, addressed
/// from the parent's content start.
fn replace_children(
    tr: &mut Transaction,
    content_start: usize,
    parent: &Node,
    from_i: usize,
    to_i: usize,
    nodes: Vec<Node>,
) -> Result<(), EditorError> {
    let frag = parent.fragment();
    let from = content_start + frag.offset_at(from_i);
    let to = content_start + frag.offset_at(to_i);
    tr.replace_range(from, to, Slice::closed(nodes))?;
    Ok(())
}

/// Rebuild a list item as `target` type, keeping its identity and its
/// children. Attributes the target type does not declare are dropped.
fn retype_item(schema: &Schema, item: &Node, target: &str) -> Result<Node, EditorError> {
    if item.name == target {
        return Ok(item.clone());
    }
    let desc = schema.desc(target)?;
    let mut attrs = desc.default_attrs.clone();
    for (key, value) in &item.attrs {
        if attrs.contains_key(key) {
            attrs.insert(key.clone(), value.clone());
        }
    }
    if let Some(id) = item.id() {
        attrs.insert(ID_ATTR.into(), Value::String(id.to_string()));
    }
    Ok(Node::element(target, attrs, item.fragment()))
}

fn shift_selection(sel: Selection, old_start: usize, old_end: usize, shift: isize) -> Selection {
    let mv = |p: usize| {
        if p >= old_start && p <= old_end {
            (p as isize + shift) as usize
        } else {
            p
        }
    };
    match sel {
        Selection::Text { anchor, head } => Selection::Text {
            anchor: mv(anchor),
            head: mv(head),
        },
        Selection::Node { at } => Selection::Node { at: mv(at) },
        Selection::Gap { at } => Selection::Gap { at: mv(at) },
    }
}

/// Merge adjacent sibling lists of identical type, anywhere in the
/// document, until none remain. Idempotent: a normalized document gets no
/// steps appended.
pub fn join_lists_around(tr: &mut Transaction) -> Result<(), EditorError> {
    loop {
        let doc = tr.doc.clone();
        let boundary = find_list_boundary(tr.schema(), &doc, 0);
        match boundary {
            Some(pos) => tr.join(pos)?,
            None => return Ok(()),
        }
    }
}

fn find_list_boundary(schema: &Schema, node: &Node, content_start: usize) -> Option<usize> {
    let children = node.children();
    let mut off = content_start;
    for (i, child) in children.iter().enumerate() {
        if let Some(next) = children.get(i + 1) {
            if schema.list_kind(child).is_some() && child.name == next.name {
                return Some(off + child.size());
            }
        }
        if child.is_element() {
            if let Some(found) = find_list_boundary(schema, child, off + 1) {
                return Some(found);
            }
        }
        off += child.size();
    }
    None
}

/// Indent the selected items: they become trailing content of the
/// preceding sibling item, descending into its trailing nested list when
/// one exists, else opening a fresh one of the same type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndentListItems;

impl IndentListItems {
    fn run(&self, tr: &mut Transaction, cx: &UpdateContext) -> Result<(), EditorError> {
        let scope = list_scope(tr)?;
        if scope.first == 0 {
            return Err(EditorError::NotApplicable(
                "no preceding sibling to indent under".into(),
            ));
        }
        let list = scope.list().clone();
        let frag = list.fragment();
        let items: Vec<Node> = scope.items().to_vec();
        let moved_size: usize = items.iter().map(Node::size).sum();
        let prev = frag.child(scope.first - 1).clone();
        let cs = scope.content_start();
        let old_items_start = cs + frag.offset_at(scope.first);

        let schema = tr.schema();
        let trailing_list = prev
            .children()
            .last()
            .filter(|n| n.name == list.name)
            .cloned();
        let (new_prev, inner_offset) = match trailing_list {
            Some(nested) => {
                let appended_at = nested.content_size();
                let mut inner = nested.fragment().to_vec();
                inner.extend(items);
                let new_nested = nested.copy(Fragment::new(inner));
                let nested_off = prev.fragment().offset_at(prev.child_count() - 1);
                let mut prev_children = prev.fragment().to_vec();
                let last = prev_children.len() - 1;
                prev_children[last] = new_nested;
                (
                    prev.copy(Fragment::new(prev_children)),
                    1 + nested_off + 1 + appended_at,
                )
            }
            None => {
                let mut list_attrs = Attrs::new();
                list_attrs.insert(ID_ATTR.into(), Value::String(cx.ids.next_id()));
                let nested = schema.create(&list.name, list_attrs, items, cx.ids)?;
                let inner_offset = 1 + prev.content_size() + 1;
                let mut prev_children = prev.fragment().to_vec();
                prev_children.push(nested);
                (prev.copy(Fragment::new(prev_children)), inner_offset)
            }
        };

        let sel = tr.selection();
        replace_children(
            tr,
            cs,
            &list,
            scope.first - 1,
            scope.last + 1,
            vec![new_prev],
        )?;

        let prev_start = cs + frag.offset_at(scope.first - 1);
        let new_items_start = prev_start + inner_offset;
        let shift = new_items_start as isize - old_items_start as isize;
        tr.set_selection(shift_selection(
            sel,
            old_items_start,
            old_items_start + moved_size,
            shift,
        ));
        Ok(())
    }
}

impl DocumentUpdate for IndentListItems {
    fn describe(&self) -> String {
        "indent list items".to_string()
    }

    fn apply(&self, tr: &mut Transaction, cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr, cx);
        outcome(self, result)
    }
}

/// Dedent the selected items one level. Inside a nested list the items
/// move up into the outer list, taking any trailing siblings with them as
/// a re-parented sublist. At the outermost level the items leave the list
/// and their content wrappers become paragraphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedentListItems;

impl DedentListItems {
    fn run(&self, tr: &mut Transaction, cx: &UpdateContext) -> Result<(), EditorError> {
        let scope = list_scope(tr)?;
        dedent_scope(tr, cx.ids, &scope)?;
        join_lists_around(tr)
    }
}

impl DocumentUpdate for DedentListItems {
    fn describe(&self) -> String {
        "dedent list items".to_string()
    }

    fn apply(&self, tr: &mut Transaction, cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr, cx);
        outcome(self, result)
    }
}

pub(crate) fn dedent_scope(
    tr: &mut Transaction,
    ids: &IdGenerator,
    scope: &ListScope,
) -> Result<(), EditorError> {
    let nested_in_item = scope.depth >= 2 && tr.schema().is_list_item(scope.rf.node(scope.depth - 1));
    if nested_in_item {
        dedent_nested(tr, ids, scope)
    } else {
        lift_items_out(tr, ids, scope)
    }
}

fn dedent_nested(
    tr: &mut Transaction,
    ids: &IdGenerator,
    scope: &ListScope,
) -> Result<(), EditorError> {
    let rf = &scope.rf;
    let d = scope.depth;
    if d < 2 || tr.schema().list_kind(rf.node(d - 2)).is_none() {
        return Err(EditorError::NotApplicable(
            "nested list without an outer list".into(),
        ));
    }
    let nl = rf.node(d).clone();
    let item = rf.node(d - 1).clone();
    let outer = rf.node(d - 2).clone();
    let nl_index = rf.index(d - 1);
    let item_index = rf.index(d - 2);
    let outer_cs = rf.start(d - 2);

    let children = nl.children();
    let leading = &children[..scope.first];
    let lifted_src = &children[scope.first..=scope.last];
    let trailing = &children[scope.last + 1..];
    let moved_size: usize = lifted_src.iter().map(Node::size).sum();
    let old_items_start = scope.content_start() + nl.fragment().offset_at(scope.first);

    let schema = tr.schema();
    let target_item = schema
        .desc(&outer.name)?
        .list
        .as_ref()
        .map(|l| l.item.clone())
        .ok_or_else(|| EditorError::Invariant(format!("{} is not a list", outer.name)))?;

    let mut lifted: Vec<Node> = lifted_src
        .iter()
        .map(|it| retype_item(schema, it, &target_item))
        .collect::<Result<_, _>>()?;

    if !trailing.is_empty() {
        // Trailing siblings follow the departing item instead of being
        // silently promoted. The remnant keeps the list's identity only
        // when no leading part stays behind with it.
        let trail = if leading.is_empty() {
            nl.copy(Fragment::new(trailing.to_vec()))
        } else {
            let mut attrs = nl.attrs.clone();
            attrs.insert(ID_ATTR.into(), Value::String(ids.next_id()));
            Node::element(nl.name.as_str(), attrs, Fragment::new(trailing.to_vec()))
        };
        if let Some(last) = lifted.last_mut() {
            let mut kids = last.fragment().to_vec();
            kids.push(trail);
            *last = last.copy(Fragment::new(kids));
        }
    }

    // Rebuild the host item without the departing range.
    let mut item_children: Vec<Node> = item.children()[..nl_index].to_vec();
    if !leading.is_empty() {
        item_children.push(nl.copy(Fragment::new(leading.to_vec())));
    }
    item_children.extend_from_slice(&item.children()[nl_index + 1..]);
    let new_item = item.copy(Fragment::new(item_children));

    let new_item_size = new_item.size();
    let sel = tr.selection();
    let mut replacement = vec![new_item];
    replacement.extend(lifted);
    replace_children(tr, outer_cs, &outer, item_index, item_index + 1, replacement)?;

    let new_items_start = outer_cs + outer.fragment().offset_at(item_index) + new_item_size;
    let shift = new_items_start as isize - old_items_start as isize;
    tr.set_selection(shift_selection(
        sel,
        old_items_start,
        old_items_start + moved_size,
        shift,
    ));
    Ok(())
}

/// Expand the selected items out of their list entirely: each item's
/// content wrapper becomes a paragraph and its remaining children follow
/// as siblings. Splits the list around the lifted range.
fn lift_items_out(
    tr: &mut Transaction,
    ids: &IdGenerator,
    scope: &ListScope,
) -> Result<(), EditorError> {
    let rf = &scope.rf;
    let d = scope.depth;
    let list = rf.node(d).clone();
    let parent = rf.node(d - 1).clone();
    let list_index = rf.index(d - 1);
    let parent_cs = rf.start(d - 1);

    let children = list.children();
    let leading = &children[..scope.first];
    let lifted = &children[scope.first..=scope.last];
    let trailing = &children[scope.last + 1..];

    let mut replacement: Vec<Node> = Vec::new();
    if !leading.is_empty() {
        replacement.push(list.copy(Fragment::new(leading.to_vec())));
    }

    // Per-item expansion, recording (old item start, new block start) so
    // the selection can be carried to the same text.
    let list_start = parent_cs + parent.fragment().offset_at(list_index);
    let mut old_off = list_start + 1 + list.fragment().offset_at(scope.first);
    let mut new_off: usize = list_start
        + replacement.iter().map(Node::size).sum::<usize>();
    let sel = tr.selection();
    let mut mapped: Vec<(usize, usize, isize)> = Vec::new();

    for item in lifted {
        let wrapper = item
            .children()
            .first()
            .cloned()
            .ok_or_else(|| EditorError::Invariant("list item without content".into()))?;
        let mut attrs = Attrs::new();
        let id = wrapper
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| ids.next_id());
        attrs.insert(ID_ATTR.into(), Value::String(id));
        let para = Node::element(types::PARAGRAPH, attrs, wrapper.fragment());
        // Positions inside the item shift uniformly once the item and
        // wrapper tokens collapse into the paragraph's.
        mapped.push((old_off, old_off + item.size(), new_off as isize - old_off as isize - 1));
        replacement.push(para);
        for rest in &item.children()[1..] {
            replacement.push(rest.clone());
        }
        new_off += item.size() - 2;
        old_off += item.size();
    }

    if !trailing.is_empty() {
        let trail = if leading.is_empty() {
            list.copy(Fragment::new(trailing.to_vec()))
        } else {
            let mut attrs = list.attrs.clone();
            attrs.insert(ID_ATTR.into(), Value::String(ids.next_id()));
            Node::element(list.name.as_str(), attrs, Fragment::new(trailing.to_vec()))
        };
        replacement.push(trail);
    }

    replace_children(tr, parent_cs, &parent, list_index, list_index + 1, replacement)?;

    let remap = |p: usize| {
        mapped
            .iter()
            .find(|&&(from, to, _)| p >= from && p < to)
            .map(|&(_, _, shift)| (p as isize + shift) as usize)
            .unwrap_or(p)
    };
    let new_sel = match sel {
        Selection::Text { anchor, head } => Selection::Text {
            anchor: remap(anchor),
            head: remap(head),
        },
        other => other,
    };
    tr.set_selection(new_sel);
    Ok(())
}

/// Toggle the selection's list type: same type unwraps, a different list
/// type retypes in place, and plain blocks get wrapped in a new list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleList {
    pub kind: notewell_model::ListKind,
}

impl ToggleList {
    fn run(&self, tr: &mut Transaction, cx: &UpdateContext) -> Result<(), EditorError> {
        match list_scope(tr) {
            Ok(scope) => {
                let same = tr.schema().list_kind(scope.list()) == Some(self.kind);
                if same {
                    lift_items_out(tr, cx.ids, &scope)?;
                } else {
                    self.retype(tr, &scope)?;
                }
                join_lists_around(tr)
            }
            Err(_) => {
                self.wrap_blocks(tr, cx)?;
                join_lists_around(tr)
            }
        }
    }

    fn retype(&self, tr: &mut Transaction, scope: &ListScope) -> Result<(), EditorError> {
        let list = scope.list().clone();
        let parent = scope.rf.node(scope.depth - 1).clone();
        let list_index = scope.rf.index(scope.depth - 1);
        let parent_cs = scope.rf.start(scope.depth - 1);

        let schema = tr.schema();
        let target_list = Schema::list_type_for(self.kind);
        let target_item = Schema::item_type_for(self.kind);
        let items: Vec<Node> = list
            .children()
            .iter()
            .map(|it| retype_item(schema, it, target_item))
            .collect::<Result<_, _>>()?;
        if !schema.valid_content(target_list, &items) {
            return Err(EditorError::NotApplicable(format!(
                "cannot retype {} as {}",
                list.name, target_list
            )));
        }
        let mut attrs = list.attrs.clone();
        if let Some(id) = list.id() {
            attrs.insert(ID_ATTR.into(), Value::String(id.to_string()));
        }
        let new_list = Node::element(target_list, attrs, Fragment::new(items));
        replace_children(tr, parent_cs, &parent, list_index, list_index + 1, vec![new_list])
    }

    fn wrap_blocks(&self, tr: &mut Transaction, cx: &UpdateContext) -> Result<(), EditorError> {
        let sel = tr.selection();
        let rf = resolve(&tr.doc, sel.from())?;
        let shared = rf.shared_depth(sel.to());
        let depth = shared.min(rf.depth().saturating_sub(1));
        let parent = rf.node(depth).clone();
        let parent_cs = rf.start(depth);
        let frag = parent.fragment();
        let (first, _) = frag.find_index(sel.from() - parent_cs);
        let rel_to = sel.to() - parent_cs;
        let (i, start) = frag.find_index(rel_to);
        let last = if start == rel_to && i > first { i - 1 } else { i.min(frag.len() - 1) };

        let schema = tr.schema();
        let blocks = &parent.children()[first..=last];
        if !blocks.iter().all(|b| schema.is_textblock(b)) {
            return Err(EditorError::NotApplicable(
                "only textblocks can be wrapped into a list".into(),
            ));
        }

        let target_item = Schema::item_type_for(self.kind);
        let mut items = Vec::with_capacity(blocks.len());
        for block in blocks {
            let mut wrapper_attrs = Attrs::new();
            let id = block
                .id()
                .map(str::to_string)
                .unwrap_or_else(|| cx.ids.next_id());
            wrapper_attrs.insert(ID_ATTR.into(), Value::String(id));
            let wrapper = Node::element(types::LIST_ITEM_CONTENT, wrapper_attrs, block.fragment());
            items.push(schema.create(target_item, Attrs::new(), vec![wrapper], cx.ids)?);
        }
        let list = schema.create(Schema::list_type_for(self.kind), Attrs::new(), items, cx.ids)?;

        let old_start = parent_cs + frag.offset_at(first);
        replace_children(tr, parent_cs, &parent, first, last + 1, vec![list])?;

        // Every wrapped block's content moved two levels deeper; carry
        // the selection with the first block it touched.
        let mut old_off = old_start;
        let mut new_off = old_start + 1;
        let mut mapped: Vec<(usize, usize, isize)> = Vec::new();
        for block in blocks {
            mapped.push((
                old_off,
                old_off + block.size(),
                new_off as isize + 1 - old_off as isize,
            ));
            new_off += block.size() + 2;
            old_off += block.size();
        }
        let remap = |p: usize| {
            mapped
                .iter()
                .find(|&&(from, to, _)| p >= from && p < to)
                .map(|&(_, _, shift)| (p as isize + shift) as usize)
                .unwrap_or(p)
        };
        if let Selection::Text { anchor, head } = sel {
            tr.set_selection(Selection::Text {
                anchor: remap(anchor),
                head: remap(head),
            });
        }
        Ok(())
    }
}

impl DocumentUpdate for ToggleList {
    fn describe(&self) -> String {
        format!("toggle list {:?}", self.kind)
    }

    fn apply(&self, tr: &mut Transaction, cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr, cx);
        outcome(self, result)
    }
}

/// Split the item at the caret into two. Splitting an empty item dedents
/// instead, so repeated Enter walks back out of the nesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitListItem;

impl SplitListItem {
    fn run(&self, tr: &mut Transaction, cx: &UpdateContext) -> Result<(), EditorError> {
        let sel = tr.selection();
        if !sel.is_caret() {
            return Err(EditorError::NotApplicable("split needs a caret".into()));
        }
        let pos = sel.from();
        let rp = resolve(&tr.doc, pos)?;
        if rp.depth() < 2 || rp.parent().name != types::LIST_ITEM_CONTENT {
            return Err(EditorError::NotApplicable(
                "caret is not in a list item".into(),
            ));
        }
        let item = rp.node(rp.depth() - 1).clone();
        if rp.parent().content_size() == 0 {
            // Enter in an empty item exits one nesting level.
            let scope = list_scope(tr)?;
            dedent_scope(tr, cx.ids, &scope)?;
            return join_lists_around(tr);
        }

        let schema = tr.schema();
        let item_desc = schema.desc(&item.name)?;
        let mut item_attrs = item_desc.default_attrs.clone();
        item_attrs.insert(ID_ATTR.into(), Value::String(cx.ids.next_id()));
        let mut wrapper_attrs = Attrs::new();
        wrapper_attrs.insert(ID_ATTR.into(), Value::String(cx.ids.next_id()));

        tr.split(
            pos,
            2,
            &[
                Some((item.name.clone(), item_attrs)),
                Some((types::LIST_ITEM_CONTENT.to_string(), wrapper_attrs)),
            ],
        )?;
        tr.set_selection(Selection::caret(pos + 4));
        Ok(())
    }
}

impl DocumentUpdate for SplitListItem {
    fn describe(&self) -> String {
        "split list item".to_string()
    }

    fn apply(&self, tr: &mut Transaction, cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr, cx);
        outcome(self, result)
    }
}

/// Backspace at the start of an item: merge with what precedes it. The
/// first item dedents; later items fold into the previous sibling,
/// descending into its trailing sublist when it has one so sibling lists
/// of mismatched type never appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinBackward;

impl JoinBackward {
    fn run(&self, tr: &mut Transaction, cx: &UpdateContext) -> Result<(), EditorError> {
        let sel = tr.selection();
        if !sel.is_caret() {
            return Err(EditorError::NotApplicable("join needs a caret".into()));
        }
        let pos = sel.from();
        let rp = resolve(&tr.doc, pos)?;
        if rp.depth() < 2
            || rp.parent().name != types::LIST_ITEM_CONTENT
            || rp.parent_offset() != 0
        {
            return Err(EditorError::NotApplicable(
                "caret is not at the start of a list item".into(),
            ));
        }
        let d = rp.depth();
        let item = rp.node(d - 1).clone();
        let list = rp.node(d - 2).clone();
        let item_index = rp.index(d - 2);
        let list_cs = rp.start(d - 2);

        if item_index == 0 {
            let scope = list_scope(tr)?;
            dedent_scope(tr, cx.ids, &scope)?;
            return join_lists_around(tr);
        }

        let schema = tr.schema();
        let prev = list.children()[item_index - 1].clone();
        let prev_start = list_cs + list.fragment().offset_at(item_index - 1);
        let sublist = prev
            .children()
            .last()
            .filter(|n| schema.list_kind(n).is_some())
            .cloned();

        if let Some(nested) = sublist {
            // Wrap backward: the item joins the deeper trailing list, as
            // its type demands.
            let target_item = schema
                .desc(&nested.name)?
                .list
                .as_ref()
                .map(|l| l.item.clone())
                .ok_or_else(|| EditorError::Invariant(format!("{} is not a list", nested.name)))?;
            let moved = retype_item(schema, &item, &target_item)?;
            let nested_off = prev.fragment().offset_at(prev.child_count() - 1);
            let appended_at = nested.content_size();
            let mut inner = nested.fragment().to_vec();
            inner.push(moved);
            let mut prev_children = prev.fragment().to_vec();
            let last = prev_children.len() - 1;
            prev_children[last] = nested.copy(Fragment::new(inner));
            let new_prev = prev.copy(Fragment::new(prev_children));
            replace_children(tr, list_cs, &list, item_index - 1, item_index + 1, vec![new_prev])?;
            let caret = prev_start + 1 + nested_off + 1 + appended_at + 2;
            tr.set_selection(Selection::caret(caret));
        } else {
            // Merge this item's wrapper into the previous item's last
            // textblock; remaining children ride along.
            let target_index = prev.child_count() - 1;
            let target = prev.children()[target_index].clone();
            if !schema.is_textblock(&target) {
                return Err(EditorError::NotApplicable(
                    "previous item does not end in text".into(),
                ));
            }
            let wrapper = item.children()[0].clone();
            let merged = target.copy(target.fragment().append(&wrapper.fragment()));
            let mut prev_children = prev.fragment().to_vec();
            prev_children[target_index] = merged;
            prev_children.extend_from_slice(&item.children()[1..]);
            let new_prev = prev.copy(Fragment::new(prev_children));
            let caret =
                prev_start + 1 + prev.fragment().offset_at(target_index) + 1 + target.content_size();
            replace_children(tr, list_cs, &list, item_index - 1, item_index + 1, vec![new_prev])?;
            tr.set_selection(Selection::caret(caret));
        }
        join_lists_around(tr)
    }
}

impl DocumentUpdate for JoinBackward {
    fn describe(&self) -> String {
        "join item backward".to_string()
    }

    fn apply(&self, tr: &mut Transaction, cx: &UpdateContext) -> UpdateOutcome {
        let result = self.run(tr, cx);
        outcome(self, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_model::Mark;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::notebook())
    }

    fn ids() -> IdGenerator {
        IdGenerator::new("test")
    }

    fn wrapper(ids: &IdGenerator, text: &str) -> Node {
        let content = if text.is_empty() {
            vec![]
        } else {
            vec![Node::text(text, vec![] as Vec<Mark>)]
        };
        schema()
            .create(types::LIST_ITEM_CONTENT, Attrs::new(), content, ids)
            .expect("wrapper")
    }

    fn item(ids: &IdGenerator, text: &str) -> Node {
        schema()
            .create(types::LIST_ITEM, Attrs::new(), vec![wrapper(ids, text)], ids)
            .expect("item")
    }

    fn bullet(ids: &IdGenerator, items: Vec<Node>) -> Node {
        schema()
            .create(types::BULLET_LIST, Attrs::new(), items, ids)
            .expect("list")
    }

    fn doc(children: Vec<Node>) -> Node {
        Node::element(types::DOC, Attrs::new(), Fragment::new(children))
    }

    // Offsets: list at 0, item k of a flat two-item list starts at 1 and
    // 1 + item.size(); wrapper content of item 0 starts at 3.
    #[test]
    fn test_indent_under_previous_sibling() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "one"), item(&ids, "two")])]);
        let first_size = d.children()[0].children()[0].size();
        // Caret inside "two".
        let caret = 1 + first_size + 2 + 1;
        let mut tr = Transaction::new(schema(), d, Selection::caret(caret));
        let out = IndentListItems.apply(&mut tr, &cx);
        assert_eq!(out, UpdateOutcome::Applied);

        let list = &tr.doc.children()[0];
        assert_eq!(list.child_count(), 1);
        let host = &list.children()[0];
        assert_eq!(host.child_count(), 2);
        let nested = &host.children()[1];
        assert_eq!(nested.name, types::BULLET_LIST);
        assert_eq!(nested.children()[0].text_content(), "two");
    }

    #[test]
    fn test_indent_first_item_rejected() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "one"), item(&ids, "two")])]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(3));
        assert_eq!(IndentListItems.apply(&mut tr, &cx), UpdateOutcome::Rejected);
        assert!(!tr.doc_changed());
    }

    #[test]
    fn test_indent_then_dedent_round_trips() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "one"), item(&ids, "two")])]);
        let before = strip_ids(&d);
        let first_size = d.children()[0].children()[0].size();
        let caret = 1 + first_size + 2 + 1;
        let mut tr = Transaction::new(schema(), d, Selection::caret(caret));
        assert_eq!(IndentListItems.apply(&mut tr, &cx), UpdateOutcome::Applied);
        assert_eq!(DedentListItems.apply(&mut tr, &cx), UpdateOutcome::Applied);
        assert_eq!(strip_ids(&tr.doc), before);
    }

    #[test]
    fn test_dedent_reparents_trailing_siblings() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let inner = bullet(&ids, vec![item(&ids, "b1"), item(&ids, "b2"), item(&ids, "b3")]);
        let host = schema()
            .create(
                types::LIST_ITEM,
                Attrs::new(),
                vec![wrapper(&ids, "a"), inner],
                &ids,
            )
            .expect("host");
        let d = doc(vec![bullet(&ids, vec![host])]);
        // Caret inside "b2": host item spans 1..26, wrapper "a" 2..5,
        // inner list 5..25, b1 6..12, b2 wrapper content starts at 14.
        let mut tr = Transaction::new(schema(), d, Selection::caret(14));
        assert_eq!(DedentListItems.apply(&mut tr, &cx), UpdateOutcome::Applied);

        let list = &tr.doc.children()[0];
        assert_eq!(list.child_count(), 2);
        let lifted = &list.children()[1];
        assert_eq!(lifted.children()[0].text_content(), "b2");
        // b3 rode along under the lifted item.
        let carried = lifted.children().last().expect("carried list");
        assert_eq!(carried.name, types::BULLET_LIST);
        assert_eq!(carried.children()[0].text_content(), "b3");
        // b1 stayed nested under the first item.
        let host_after = &list.children()[0];
        let kept = host_after.children().last().expect("kept list");
        assert_eq!(kept.name, types::BULLET_LIST);
        assert_eq!(kept.child_count(), 1);
        assert_eq!(kept.children()[0].text_content(), "b1");
    }

    #[test]
    fn test_top_level_dedent_expands_to_paragraph() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "one"), item(&ids, "two")])]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(3));
        assert_eq!(DedentListItems.apply(&mut tr, &cx), UpdateOutcome::Applied);

        assert_eq!(tr.doc.child_count(), 2);
        assert_eq!(tr.doc.children()[0].name, types::PARAGRAPH);
        assert_eq!(tr.doc.children()[0].text_content(), "one");
        assert_eq!(tr.doc.children()[1].name, types::BULLET_LIST);
        assert_eq!(tr.doc.children()[1].child_count(), 1);
    }

    #[test]
    fn test_toggle_wraps_paragraphs() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let p1 = schema()
            .create(types::PARAGRAPH, Attrs::new(), vec![Node::text("a", vec![])], &ids)
            .expect("p1");
        let p2 = schema()
            .create(types::PARAGRAPH, Attrs::new(), vec![Node::text("b", vec![])], &ids)
            .expect("p2");
        let d = doc(vec![p1, p2]);
        let mut tr = Transaction::new(
            schema(),
            d,
            Selection::Text { anchor: 1, head: 5 },
        );
        let toggle = ToggleList { kind: notewell_model::ListKind::Bullet };
        assert_eq!(toggle.apply(&mut tr, &cx), UpdateOutcome::Applied);

        assert_eq!(tr.doc.child_count(), 1);
        let list = &tr.doc.children()[0];
        assert_eq!(list.name, types::BULLET_LIST);
        assert_eq!(list.child_count(), 2);
        assert_eq!(list.children()[0].text_content(), "a");
    }

    #[test]
    fn test_toggle_retypes_compatible_list() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "one")])]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(3));
        let toggle = ToggleList { kind: notewell_model::ListKind::Ordered };
        assert_eq!(toggle.apply(&mut tr, &cx), UpdateOutcome::Applied);
        assert_eq!(tr.doc.children()[0].name, types::ORDERED_LIST);
        assert_eq!(tr.doc.children()[0].children()[0].name, types::LIST_ITEM);
    }

    #[test]
    fn test_toggle_rewrites_incompatible_list() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "one"), item(&ids, "two")])]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(3));
        let toggle = ToggleList { kind: notewell_model::ListKind::Task };
        assert_eq!(toggle.apply(&mut tr, &cx), UpdateOutcome::Applied);
        let list = &tr.doc.children()[0];
        assert_eq!(list.name, types::TASK_LIST);
        assert!(list
            .children()
            .iter()
            .all(|it| it.name == types::TASK_LIST_ITEM));
        assert_eq!(list.children()[0].text_content(), "one");
    }

    #[test]
    fn test_toggle_same_kind_unwraps() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "one")])]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(3));
        let toggle = ToggleList { kind: notewell_model::ListKind::Bullet };
        assert_eq!(toggle.apply(&mut tr, &cx), UpdateOutcome::Applied);
        assert_eq!(tr.doc.child_count(), 1);
        assert_eq!(tr.doc.children()[0].name, types::PARAGRAPH);
        assert_eq!(tr.doc.text_content(), "one");
    }

    #[test]
    fn test_split_item_makes_sibling() {
        let ids = ids();
        let cx = UpdateContext { ids: &ids };
        let d = doc(vec![bullet(&ids, vec![item(&ids, "ab")])]);
        // Caret between "a" and "b": wrapper content starts at 3.
        let mut tr = Transaction::new(schema(), d, Selection::caret(4));
        assert_eq!(SplitListItem.apply(&mut tr, &cx), UpdateOutcome::Applied);

        let list = &tr.doc.children()[0];
        assert_eq!(list.child_count(), 2);
        assert_eq!(list.children()[0].text_content(), "a");
        assert_eq!(list.children()[1].text_content(), "b");
        assert_ne!(list.children()[0].id(), list.children()[1].id());
        assert_eq!(tr.selection(), Selection::caret(8));
    }

    #[test]
    fn test_join_pass_is_idempotent() {
        let ids = ids();
        let d = doc(vec![
            bullet(&ids, vec![item(&ids, "one")]),
            bullet(&ids, vec![item(&ids, "two")]),
        ]);
        let mut tr = Transaction::new(schema(), d, Selection::caret(3));
        join_lists_around(&mut tr).expect("join");
        assert_eq!(tr.doc.child_count(), 1);
        assert_eq!(tr.doc.children()[0].child_count(), 2);
        let steps = tr.steps().len();
        join_lists_around(&mut tr).expect("second join");
        assert_eq!(tr.steps().len(), steps);
    }

    fn strip_ids(node: &Node) -> Node {
        let mut attrs = node.attrs.clone();
        attrs.remove(ID_ATTR);
        let body = if node.is_element() {
            let kids = node.children().iter().map(strip_ids).collect();
            Node::element(node.name.as_str(), attrs, Fragment::new(kids))
        } else {
            let mut n = node.clone();
            n.attrs = attrs;
            n
        };
        body
    }
}
