//! # Node-Type Schema
//!
//! Per-type descriptor records registered at startup and looked up by type
//! name. All structural decisions — which children a node accepts, whether
//! two nodes may be joined, whether a list retype can happen in place — go
//! through these predicates, never through ad-hoc name comparison at call
//! sites.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ModelError;
use crate::id::IdGenerator;
use crate::node::{Attrs, Fragment, Node, ID_ATTR};

/// Node type names of the notebook schema.
pub mod types {
    pub const DOC: &str = "doc";
    pub const PARAGRAPH: &str = "paragraph";
    pub const HEADING: &str = "heading";
    pub const CODE_BLOCK: &str = "code_block";
    pub const BULLET_LIST: &str = "bullet_list";
    pub const ORDERED_LIST: &str = "ordered_list";
    pub const TASK_LIST: &str = "task_list";
    pub const LIST_ITEM: &str = "list_item";
    pub const TASK_LIST_ITEM: &str = "task_list_item";
    pub const LIST_ITEM_CONTENT: &str = "list_item_content";
    pub const REFERENCE: &str = "reference";
    pub const ASYNC_NODE: &str = "async_node";
    pub const MARK_HOLDER: &str = "mark_holder";
    pub const TEXT: &str = "text";
}

/// Mark names of the notebook schema.
pub mod marks {
    pub const BOLD: &str = "bold";
    pub const ITALIC: &str = "italic";
    pub const CODE: &str = "code";
    pub const STRIKETHROUGH: &str = "strikethrough";
}

/// Well-known attribute names.
pub mod attrs {
    pub const LEVEL: &str = "level";
    pub const CHECKED: &str = "checked";
    pub const TARGET: &str = "target";
    pub const LANGUAGE: &str = "language";
    pub const MARKS: &str = "marks";
    pub const OUTPUT: &str = "output";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Block,
    Inline,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    Bullet,
    Ordered,
    Task,
}

/// What a node type accepts as content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentRule {
    /// No content at all (leaf).
    Empty,
    /// Inline nodes and text runs.
    Inline,
    /// Any block-kind children.
    Blocks,
    /// One or more children of exactly the named item type.
    Items(String),
    /// First child of the named type, any block-kind children after it.
    ContentFirst(String),
}

#[derive(Debug, Clone)]
pub struct ListSpec {
    pub kind: ListKind,
    pub item: String,
}

/// Descriptor record for one node type.
#[derive(Debug, Clone)]
pub struct NodeTypeDesc {
    pub name: String,
    pub kind: NodeKind,
    pub content: ContentRule,
    pub default_attrs: Attrs,
    pub carries_id: bool,
    pub list: Option<ListSpec>,
}

/// Registry of node-type descriptors, built once at startup.
#[derive(Debug)]
pub struct Schema {
    types: HashMap<String, NodeTypeDesc>,
}

impl Schema {
    /// The default notebook editing schema.
    pub fn notebook() -> Schema {
        let mut schema = Schema {
            types: HashMap::new(),
        };

        schema.register(NodeTypeDesc {
            name: types::DOC.into(),
            kind: NodeKind::Block,
            content: ContentRule::Blocks,
            default_attrs: Attrs::new(),
            carries_id: false,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::PARAGRAPH.into(),
            kind: NodeKind::Block,
            content: ContentRule::Inline,
            default_attrs: Attrs::new(),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::HEADING.into(),
            kind: NodeKind::Block,
            content: ContentRule::Inline,
            default_attrs: default_attrs(&[(attrs::LEVEL, json!(1))]),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::CODE_BLOCK.into(),
            kind: NodeKind::Block,
            content: ContentRule::Inline,
            default_attrs: default_attrs(&[(attrs::LANGUAGE, Value::Null)]),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::BULLET_LIST.into(),
            kind: NodeKind::Block,
            content: ContentRule::Items(types::LIST_ITEM.into()),
            default_attrs: Attrs::new(),
            carries_id: true,
            list: Some(ListSpec {
                kind: ListKind::Bullet,
                item: types::LIST_ITEM.into(),
            }),
        });
        schema.register(NodeTypeDesc {
            name: types::ORDERED_LIST.into(),
            kind: NodeKind::Block,
            content: ContentRule::Items(types::LIST_ITEM.into()),
            default_attrs: Attrs::new(),
            carries_id: true,
            list: Some(ListSpec {
                kind: ListKind::Ordered,
                item: types::LIST_ITEM.into(),
            }),
        });
        schema.register(NodeTypeDesc {
            name: types::TASK_LIST.into(),
            kind: NodeKind::Block,
            content: ContentRule::Items(types::TASK_LIST_ITEM.into()),
            default_attrs: Attrs::new(),
            carries_id: true,
            list: Some(ListSpec {
                kind: ListKind::Task,
                item: types::TASK_LIST_ITEM.into(),
            }),
        });
        schema.register(NodeTypeDesc {
            name: types::LIST_ITEM.into(),
            kind: NodeKind::Block,
            content: ContentRule::ContentFirst(types::LIST_ITEM_CONTENT.into()),
            default_attrs: Attrs::new(),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::TASK_LIST_ITEM.into(),
            kind: NodeKind::Block,
            content: ContentRule::ContentFirst(types::LIST_ITEM_CONTENT.into()),
            default_attrs: default_attrs(&[(attrs::CHECKED, json!(false))]),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::LIST_ITEM_CONTENT.into(),
            kind: NodeKind::Block,
            content: ContentRule::Inline,
            default_attrs: Attrs::new(),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::REFERENCE.into(),
            kind: NodeKind::Inline,
            content: ContentRule::Empty,
            default_attrs: default_attrs(&[(attrs::TARGET, Value::Null)]),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::ASYNC_NODE.into(),
            kind: NodeKind::Block,
            content: ContentRule::Empty,
            default_attrs: default_attrs(&[(attrs::OUTPUT, Value::Null)]),
            carries_id: true,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::MARK_HOLDER.into(),
            kind: NodeKind::Inline,
            content: ContentRule::Empty,
            default_attrs: default_attrs(&[(attrs::MARKS, json!([]))]),
            carries_id: false,
            list: None,
        });
        schema.register(NodeTypeDesc {
            name: types::TEXT.into(),
            kind: NodeKind::Text,
            content: ContentRule::Empty,
            default_attrs: Attrs::new(),
            carries_id: false,
            list: None,
        });

        schema
    }

    fn register(&mut self, desc: NodeTypeDesc) {
        self.types.insert(desc.name.clone(), desc);
    }

    pub fn get(&self, name: &str) -> Option<&NodeTypeDesc> {
        self.types.get(name)
    }

    pub fn desc(&self, name: &str) -> Result<&NodeTypeDesc, ModelError> {
        self.types
            .get(name)
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    pub fn kind_of(&self, node: &Node) -> NodeKind {
        self.get(&node.name).map(|d| d.kind).unwrap_or(NodeKind::Block)
    }

    /// Whether the node is a textblock (directly holds inline content).
    pub fn is_textblock(&self, node: &Node) -> bool {
        matches!(self.get(&node.name).map(|d| &d.content), Some(ContentRule::Inline))
    }

    pub fn list_kind(&self, node: &Node) -> Option<ListKind> {
        self.get(&node.name).and_then(|d| d.list.as_ref()).map(|l| l.kind)
    }

    pub fn is_list_item(&self, node: &Node) -> bool {
        matches!(
            self.get(&node.name).map(|d| &d.content),
            Some(ContentRule::ContentFirst(_))
        )
    }

    pub fn list_type_for(kind: ListKind) -> &'static str {
        match kind {
            ListKind::Bullet => types::BULLET_LIST,
            ListKind::Ordered => types::ORDERED_LIST,
            ListKind::Task => types::TASK_LIST,
        }
    }

    pub fn item_type_for(kind: ListKind) -> &'static str {
        match kind {
            ListKind::Bullet | ListKind::Ordered => types::LIST_ITEM,
            ListKind::Task => types::TASK_LIST_ITEM,
        }
    }

    /// Whether the named type accepts exactly this child sequence.
    pub fn valid_content(&self, name: &str, children: &[Node]) -> bool {
        let Some(desc) = self.get(name) else {
            return false;
        };
        match &desc.content {
            ContentRule::Empty => children.is_empty(),
            ContentRule::Inline => children
                .iter()
                .all(|c| matches!(self.kind_of(c), NodeKind::Inline | NodeKind::Text)),
            ContentRule::Blocks => children.iter().all(|c| self.kind_of(c) == NodeKind::Block),
            ContentRule::Items(item) => {
                !children.is_empty() && children.iter().all(|c| &c.name == item)
            }
            ContentRule::ContentFirst(first) => {
                children.first().map(|c| &c.name == first).unwrap_or(false)
                    && children[1..].iter().all(|c| self.kind_of(c) == NodeKind::Block)
            }
        }
    }

    pub fn check_content(&self, node: &Node, content: &Fragment) -> Result<(), ModelError> {
        if self.valid_content(&node.name, content.nodes()) {
            Ok(())
        } else {
            Err(ModelError::InvalidContent(node.name.clone()))
        }
    }

    /// Schema-validity predicate for replacing a child range.
    pub fn can_replace(&self, parent: &Node, from: usize, to: usize, content: &[Node]) -> bool {
        let children = parent.children();
        if from > to || to > children.len() {
            return false;
        }
        let mut hypothetical: Vec<Node> = Vec::with_capacity(children.len());
        hypothetical.extend_from_slice(&children[..from]);
        hypothetical.extend_from_slice(content);
        hypothetical.extend_from_slice(&children[to..]);
        self.valid_content(&parent.name, &hypothetical)
    }

    /// Whether two node types could share content, used when joining the
    /// open sides of a replace.
    pub fn compatible_content(&self, a: &str, b: &str) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(da), Some(db)) => match (&da.content, &db.content) {
                (ContentRule::Inline, ContentRule::Inline) => true,
                (ContentRule::Blocks, ContentRule::Blocks) => true,
                (ContentRule::Items(x), ContentRule::Items(y)) => x == y,
                (ContentRule::ContentFirst(x), ContentRule::ContentFirst(y)) => x == y,
                _ => false,
            },
            _ => false,
        }
    }

    /// Build a node of the named type: applies default attributes, assigns
    /// a fresh stable identifier where the type carries one, and validates
    /// the content.
    pub fn create(
        &self,
        name: &str,
        attrs: Attrs,
        children: Vec<Node>,
        ids: &IdGenerator,
    ) -> Result<Node, ModelError> {
        let desc = self.desc(name)?;
        if desc.kind == NodeKind::Text {
            return Err(ModelError::InvalidStep(
                "text nodes are created with Node::text".into(),
            ));
        }
        let mut merged = desc.default_attrs.clone();
        merged.extend(attrs);
        if desc.carries_id && !merged.contains_key(ID_ATTR) {
            merged.insert(ID_ATTR.into(), Value::String(ids.next_id()));
        }
        let node = match desc.content {
            ContentRule::Empty => {
                if !children.is_empty() {
                    return Err(ModelError::InvalidContent(name.to_string()));
                }
                Node::leaf(name, merged)
            }
            _ => {
                let node = Node::element(name, merged, Fragment::new(children));
                self.check_content(&node, &node.fragment())?;
                node
            }
        };
        Ok(node)
    }
}

fn default_attrs(entries: &[(&str, Value)]) -> Attrs {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> IdGenerator {
        IdGenerator::new("test")
    }

    #[test]
    fn test_create_assigns_identity_and_defaults() {
        let schema = Schema::notebook();
        let ids = ids();
        let heading = schema
            .create(types::HEADING, Attrs::new(), vec![Node::text("hi", vec![])], &ids)
            .expect("valid heading");
        assert!(heading.id().is_some());
        assert_eq!(heading.attr(attrs::LEVEL), Some(&json!(1)));
    }

    #[test]
    fn test_list_content_rules() {
        let schema = Schema::notebook();
        let ids = ids();
        let content = schema
            .create(types::LIST_ITEM_CONTENT, Attrs::new(), vec![Node::text("a", vec![])], &ids)
            .expect("content");
        let item = schema
            .create(types::LIST_ITEM, Attrs::new(), vec![content], &ids)
            .expect("item");
        assert!(schema.valid_content(types::BULLET_LIST, std::slice::from_ref(&item)));
        assert!(!schema.valid_content(types::TASK_LIST, std::slice::from_ref(&item)));

        // An item without its content wrapper first is rejected.
        let bare = Node::element(types::LIST_ITEM, Attrs::new(), Fragment::empty());
        assert!(!schema.valid_content(types::BULLET_LIST, &[bare.clone()]));
        assert!(!schema.valid_content(types::LIST_ITEM, bare.children()));
    }

    #[test]
    fn test_compatible_content_is_rule_based() {
        let schema = Schema::notebook();
        assert!(schema.compatible_content(types::PARAGRAPH, types::HEADING));
        assert!(schema.compatible_content(types::BULLET_LIST, types::ORDERED_LIST));
        assert!(!schema.compatible_content(types::BULLET_LIST, types::TASK_LIST));
        assert!(!schema.compatible_content(types::PARAGRAPH, types::BULLET_LIST));
    }

    #[test]
    fn test_can_replace() {
        let schema = Schema::notebook();
        let ids = ids();
        let para = schema
            .create(types::PARAGRAPH, Attrs::new(), vec![], &ids)
            .expect("para");
        let doc = schema
            .create(types::DOC, Attrs::new(), vec![para.clone()], &ids)
            .expect("doc");
        assert!(schema.can_replace(&doc, 0, 1, &[para.clone(), para.clone()]));

        let text = Node::text("loose", vec![]);
        assert!(!schema.can_replace(&doc, 0, 1, &[text]));
    }
}
