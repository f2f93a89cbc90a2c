//! # Document Tree
//!
//! Immutable node tree addressed by flat integer offsets.
//!
//! Offsets follow a pre-order token stream: every character of a text run
//! consumes one unit, a leaf node consumes one unit, and an element node
//! consumes one unit for its open marker, its content, and one unit for its
//! close marker. The document root's own markers are not addressable, so
//! valid offsets range over `0 ..= doc.content_size()`.
//!
//! Structural sharing: a [`Fragment`] holds its children behind an `Arc`,
//! so copying a node to rebuild one branch of the tree leaves every other
//! branch shared with the previous document version.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// String-keyed, JSON-valued attribute map.
pub type Attrs = BTreeMap<String, Value>;

/// The attribute carrying a node's stable identity.
pub const ID_ATTR: &str = "id";

/// Inline formatting annotation attached to a run of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub name: String,
    #[serde(default)]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Attrs::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }
}

/// Content shape of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeBody {
    /// Ordered child nodes.
    Element(Fragment),
    /// A run of text.
    Text(String),
    /// No content; occupies a single offset unit.
    Leaf,
}

/// A single node in the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub attrs: Attrs,
    pub marks: Vec<Mark>,
    body: NodeBody,
}

impl Node {
    pub fn element(name: impl Into<String>, attrs: Attrs, content: Fragment) -> Self {
        Self {
            name: name.into(),
            attrs,
            marks: Vec::new(),
            body: NodeBody::Element(content),
        }
    }

    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            name: "text".into(),
            attrs: Attrs::new(),
            marks,
            body: NodeBody::Text(text.into()),
        }
    }

    pub fn leaf(name: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            name: name.into(),
            attrs,
            marks: Vec::new(),
            body: NodeBody::Leaf,
        }
    }

    pub fn leaf_with_marks(name: impl Into<String>, attrs: Attrs, marks: Vec<Mark>) -> Self {
        Self {
            name: name.into(),
            attrs,
            marks,
            body: NodeBody::Leaf,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.body, NodeBody::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, NodeBody::Text(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf)
    }

    pub fn text_str(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Tokens this node consumes in its parent's offset space.
    pub fn size(&self) -> usize {
        match &self.body {
            NodeBody::Element(frag) => frag.size() + 2,
            NodeBody::Text(t) => t.chars().count(),
            NodeBody::Leaf => 1,
        }
    }

    /// Size of this node's own content.
    pub fn content_size(&self) -> usize {
        match &self.body {
            NodeBody::Element(frag) => frag.size(),
            NodeBody::Text(t) => t.chars().count(),
            NodeBody::Leaf => 0,
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.body {
            NodeBody::Element(frag) => frag.nodes(),
            _ => &[],
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// The node's child fragment; empty for text and leaf nodes.
    pub fn fragment(&self) -> Fragment {
        match &self.body {
            NodeBody::Element(frag) => frag.clone(),
            _ => Fragment::empty(),
        }
    }

    /// A node with the same markup but different content.
    pub fn copy(&self, content: Fragment) -> Node {
        Node {
            name: self.name.clone(),
            attrs: self.attrs.clone(),
            marks: self.marks.clone(),
            body: NodeBody::Element(content),
        }
    }

    /// A node with the given attribute entries layered over the current ones.
    pub fn with_attrs(&self, attrs: Attrs) -> Node {
        let mut merged = self.attrs.clone();
        merged.extend(attrs);
        Node {
            name: self.name.clone(),
            attrs: merged,
            marks: self.marks.clone(),
            body: self.body.clone(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Stable identity attribute, if assigned.
    pub fn id(&self) -> Option<&str> {
        self.attrs.get(ID_ATTR).and_then(Value::as_str)
    }

    /// Same type, attributes and marks.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.name == other.name && self.attrs == other.attrs && self.marks == other.marks
    }

    /// Cut the node's content between two content offsets.
    pub fn cut(&self, from: usize, to: usize) -> Node {
        match &self.body {
            NodeBody::Element(frag) => self.copy(frag.cut(from, to)),
            NodeBody::Text(t) => Node {
                name: self.name.clone(),
                attrs: self.attrs.clone(),
                marks: self.marks.clone(),
                body: NodeBody::Text(cut_text(t, from, to)),
            },
            NodeBody::Leaf => self.clone(),
        }
    }

    /// Concatenated text of the subtree, for assertions and rendering.
    pub fn text_content(&self) -> String {
        match &self.body {
            NodeBody::Text(t) => t.clone(),
            NodeBody::Element(frag) => frag.nodes().iter().map(Node::text_content).collect(),
            NodeBody::Leaf => String::new(),
        }
    }

    /// Pre-order walk over every descendant, with the offset before each.
    pub fn for_each_node<F: FnMut(usize, &Node)>(&self, f: &mut F) {
        fn walk<F: FnMut(usize, &Node)>(node: &Node, base: usize, f: &mut F) {
            let mut pos = base;
            for child in node.children() {
                f(pos, child);
                if child.is_element() {
                    walk(child, pos + 1, f);
                }
                pos += child.size();
            }
        }
        walk(self, 0, f);
    }

    /// Locate a node by stable identity; returns the offset before it.
    pub fn find_by_id(&self, id: &str) -> Option<(usize, Node)> {
        let mut found = None;
        self.for_each_node(&mut |pos, node| {
            if found.is_none() && node.id() == Some(id) {
                found = Some((pos, node.clone()));
            }
        });
        found
    }
}

fn cut_text(s: &str, from: usize, to: usize) -> String {
    s.chars().skip(from).take(to.saturating_sub(from)).collect()
}

/// An ordered sequence of sibling nodes with a cached total size.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    nodes: Arc<Vec<Node>>,
    size: usize,
}

static EMPTY_NODES: OnceLock<Arc<Vec<Node>>> = OnceLock::new();

// The cached size is derived state, so serialize a fragment as its node
// list and recompute on the way back in.
impl Serialize for Fragment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Fragment {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Fragment::new(Vec::<Node>::deserialize(deserializer)?))
    }
}

impl Fragment {
    pub fn new(nodes: Vec<Node>) -> Self {
        let size = nodes.iter().map(Node::size).sum();
        Self {
            nodes: Arc::new(nodes),
            size,
        }
    }

    pub fn empty() -> Self {
        Self {
            nodes: EMPTY_NODES.get_or_init(|| Arc::new(Vec::new())).clone(),
            size: 0,
        }
    }

    pub fn from_node(node: Node) -> Self {
        Fragment::new(vec![node])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn child(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Offset of the child at `index` within this fragment.
    pub fn offset_at(&self, index: usize) -> usize {
        self.nodes.iter().take(index).map(Node::size).sum()
    }

    /// Index and start offset of the child covering `offset`. An offset on
    /// a child boundary yields the child starting there; `offset == size`
    /// yields `(len, size)`.
    pub fn find_index(&self, offset: usize) -> (usize, usize) {
        let mut cur = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            if offset == cur {
                return (i, cur);
            }
            let end = cur + child.size();
            if offset < end {
                return (i, cur);
            }
            cur = end;
        }
        (self.nodes.len(), cur)
    }

    /// The sub-fragment between two offsets, cutting into partially covered
    /// children.
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        // cut(0, 0) on a zero-size fragment drops zero-width runs rather
        // than cloning them.
        if from == 0 && to == self.size && self.size > 0 {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in self.nodes.iter() {
                if pos >= to {
                    break;
                }
                let end = pos + child.size();
                if end > from {
                    let mut piece = child.clone();
                    if pos < from || end > to {
                        if piece.is_text() {
                            let start = from.saturating_sub(pos);
                            let stop = (to - pos).min(piece.content_size());
                            piece = piece.cut(start, stop);
                        } else if piece.is_element() {
                            let start = from.saturating_sub(pos + 1);
                            let stop = (to - pos).saturating_sub(1).min(piece.content_size());
                            piece = piece.cut(start, stop);
                        }
                    }
                    result.push(piece);
                }
                pos = end;
            }
        }
        Fragment::new(result)
    }

    /// Concatenation, joining adjacent text runs with identical markup.
    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut nodes: Vec<Node> = self.nodes.to_vec();
        let mut rest = other.nodes.iter();
        let merged = match (nodes.last(), other.nodes.first()) {
            (Some(last), Some(first))
                if last.is_text() && first.is_text() && last.same_markup(first) =>
            {
                let joined = format!(
                    "{}{}",
                    last.text_str().unwrap_or(""),
                    first.text_str().unwrap_or("")
                );
                Some(Node::text(joined, last.marks.clone()))
            }
            _ => None,
        };
        if let Some(joined) = merged {
            if let Some(slot) = nodes.last_mut() {
                *slot = joined;
            }
            rest.next();
        }
        nodes.extend(rest.cloned());
        Fragment::new(nodes)
    }

    /// A fragment with one child replaced.
    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut nodes = self.nodes.to_vec();
        nodes[index] = node;
        Fragment::new(nodes)
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.to_vec()
    }
}
