//! Shared builders for the integration tests.

#![allow(dead_code)]

use notewell_model::{attrs, schema::types, Attrs, Fragment, IdGenerator, Node, Schema};
use serde_json::{json, Value};

/// Builds well-formed documents through the schema, so every node gets
/// its defaults and a fresh id.
pub struct DocBuilder {
    pub schema: Schema,
    pub ids: IdGenerator,
}

impl DocBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema::notebook(),
            ids: IdGenerator::new("build"),
        }
    }

    pub fn doc(&self, children: Vec<Node>) -> Node {
        Node::element(types::DOC, Attrs::new(), Fragment::new(children))
    }

    pub fn para(&self, text: &str) -> Node {
        self.create(
            types::PARAGRAPH,
            Attrs::new(),
            vec![Node::text(text, vec![])],
        )
    }

    pub fn para_with(&self, children: Vec<Node>) -> Node {
        self.create(types::PARAGRAPH, Attrs::new(), children)
    }

    pub fn heading(&self, level: u8, text: &str) -> Node {
        self.create(
            types::HEADING,
            attr_map(&[(attrs::LEVEL, json!(level))]),
            vec![Node::text(text, vec![])],
        )
    }

    pub fn code_block(&self, language: &str, text: &str) -> Node {
        self.create(
            types::CODE_BLOCK,
            attr_map(&[(attrs::LANGUAGE, json!(language))]),
            vec![Node::text(text, vec![])],
        )
    }

    pub fn reference(&self, target: &str) -> Node {
        self.create(
            types::REFERENCE,
            attr_map(&[(attrs::TARGET, json!(target))]),
            vec![],
        )
    }

    pub fn async_node(&self) -> Node {
        self.create(types::ASYNC_NODE, Attrs::new(), vec![])
    }

    pub fn wrapper(&self, text: &str) -> Node {
        self.create(
            types::LIST_ITEM_CONTENT,
            Attrs::new(),
            vec![Node::text(text, vec![])],
        )
    }

    pub fn bullet_item(&self, text: &str) -> Node {
        self.create(types::LIST_ITEM, Attrs::new(), vec![self.wrapper(text)])
    }

    /// An item whose wrapper is followed by extra block children, for
    /// building nested-list expectations.
    pub fn bullet_item_with(&self, text: &str, rest: Vec<Node>) -> Node {
        let mut children = vec![self.wrapper(text)];
        children.extend(rest);
        self.create(types::LIST_ITEM, Attrs::new(), children)
    }

    /// An item whose wrapper has no content yet.
    pub fn empty_item(&self) -> Node {
        let wrapper = self.create(types::LIST_ITEM_CONTENT, Attrs::new(), vec![]);
        self.create(types::LIST_ITEM, Attrs::new(), vec![wrapper])
    }

    pub fn list_of(&self, items: Vec<Node>) -> Node {
        self.create(types::BULLET_LIST, Attrs::new(), items)
    }

    pub fn bullet_list(&self, texts: &[&str]) -> Node {
        let items = texts.iter().map(|t| self.bullet_item(t)).collect();
        self.create(types::BULLET_LIST, Attrs::new(), items)
    }

    pub fn ordered_list(&self, texts: &[&str]) -> Node {
        let items = texts.iter().map(|t| self.bullet_item(t)).collect();
        self.create(types::ORDERED_LIST, Attrs::new(), items)
    }

    pub fn task_item(&self, checked: bool, text: &str) -> Node {
        self.create(
            types::TASK_LIST_ITEM,
            attr_map(&[(attrs::CHECKED, json!(checked))]),
            vec![self.wrapper(text)],
        )
    }

    pub fn task_list(&self, items: Vec<Node>) -> Node {
        self.create(types::TASK_LIST, Attrs::new(), items)
    }

    fn create(&self, name: &str, attrs: Attrs, children: Vec<Node>) -> Node {
        self.schema
            .create(name, attrs, children, &self.ids)
            .expect("well-formed node")
    }
}

fn attr_map(entries: &[(&str, Value)]) -> Attrs {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Copy of the tree with every generated id removed, for comparing
/// structure across operations that mint fresh ids.
pub fn strip_ids(node: &Node) -> Node {
    let mut attrs = node.attrs.clone();
    attrs.remove(notewell_model::ID_ATTR);
    if node.is_element() {
        let children = node.children().iter().map(strip_ids).collect();
        Node::element(node.name.as_str(), attrs, Fragment::new(children))
    } else if node.is_text() {
        node.clone()
    } else {
        Node::leaf(node.name.as_str(), attrs)
    }
}
