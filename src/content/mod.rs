//! Content export and import.
//!
//! Export walks the structure tree and gathers the text runs of each node's
//! story element, producing plain XML named after the markup tags. Import
//! maps such XML back onto the structure (see [`import`]).

pub(crate) mod import;
pub mod story;

use std::collections::HashSet;

use chrono::NaiveDateTime;
use log::debug;

use crate::error::{Error, Result};
use crate::package::Session;
use crate::part::PartSource;
use crate::structure::{StructureId, StructureTree};
use crate::xml::XmlDocument;

pub use import::{FORCE_CONTENT, IGNORE_CONTENT, SET_CONTENT};

/// Exported content of one structure node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTree {
    pub tag: String,
    /// `XMLAttribute` name/value pairs in document order.
    pub attrs: Vec<(String, String)>,
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    Text(String),
    Node(ContentTree),
}

impl ContentTree {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            content: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.content.last_mut() {
            Some(ContentItem::Text(existing)) => existing.push_str(text),
            _ => self.content.push(ContentItem::Text(text.to_string())),
        }
    }

    /// All text below this node, markup removed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for item in &self.content {
            match item {
                ContentItem::Text(t) => out.push_str(t),
                ContentItem::Node(n) => out.push_str(&n.text()),
            }
        }
        out
    }

    pub fn children(&self) -> impl Iterator<Item = &ContentTree> {
        self.content.iter().filter_map(|item| match item {
            ContentItem::Node(n) => Some(n),
            ContentItem::Text(_) => None,
        })
    }

    pub fn to_document(&self) -> XmlDocument {
        let mut doc = XmlDocument::new(&self.tag);
        let root = doc.root();
        self.fill(&mut doc, root);
        doc
    }

    fn fill(&self, doc: &mut XmlDocument, el: crate::xml::NodeId) {
        for (name, value) in &self.attrs {
            doc.set_attr(el, name, value.clone());
        }
        for item in &self.content {
            match item {
                ContentItem::Text(text) => {
                    let node = doc.create_text(text);
                    doc.append_child(el, node);
                }
                ContentItem::Node(child) => {
                    let node = doc.create_element(&child.tag);
                    doc.append_child(el, node);
                    child.fill(doc, node);
                }
            }
        }
    }

    /// Indented XML; element-only content is indented, mixed content kept
    /// verbatim.
    pub fn to_xml(&self) -> String {
        let doc = self.to_document();
        let mut out = doc.to_xml_string(doc.root(), true);
        out.push('\n');
        out
    }
}

/// Export the whole structure below the root.
pub fn export_tree<S: PartSource + ?Sized>(src: &S, tree: &StructureTree) -> Result<ContentTree> {
    export_node(src, tree, tree.root())
}

/// Export the structure below the node at `path`.
pub fn export_tree_from<S: PartSource + ?Sized>(src: &S, tree: &StructureTree, path: &str) -> Result<ContentTree> {
    export_node(src, tree, tree.resolve(path)?)
}

/// Attach a note to the story element of the node at `path`.
pub(crate) fn add_note(
    session: &mut Session,
    path: &str,
    note: &str,
    author: &str,
    when: NaiveDateTime,
) -> Result<()> {
    let tree = StructureTree::build(&*session)?;
    let node = tree.node(tree.resolve(path)?);
    let self_id = node.self_id();
    let doc = session.doc_mut(&node.story)?;
    let el = doc
        .get_by_id(Some("XMLElement"), "Self", self_id)
        .ok_or_else(|| Error::MissingPageItem(self_id.to_string()))?;
    story::add_note(doc, el, note, author, when);
    debug!("added a note by {author} to {path}");
    Ok(())
}

fn export_node<S: PartSource + ?Sized>(src: &S, tree: &StructureTree, id: StructureId) -> Result<ContentTree> {
    let node = tree.node(id);
    let mut out = ContentTree::new(&node.tag);
    let children = tree.children(id);

    let located = match src.part(&node.story) {
        Ok(doc) => doc
            .get_by_id(Some("XMLElement"), "Self", node.self_id())
            .map(|el| (doc, el)),
        Err(_) => None,
    };
    let Some((doc, el)) = located else {
        for &child in children {
            out.content.push(ContentItem::Node(export_node(src, tree, child)?));
        }
        return Ok(out);
    };

    out.attrs = story::xml_attributes(doc, el);
    let items = story::content_items(doc, el);
    if items.is_empty() {
        for &child in children {
            out.content.push(ContentItem::Node(export_node(src, tree, child)?));
        }
        return Ok(out);
    }

    let mut visited = HashSet::new();
    for item in items {
        if story::is_content(doc, item) {
            out.push_text(&doc.text_content(item));
            continue;
        }
        let item_self = doc.attr(item, "Self").unwrap_or_default();
        let matching = children
            .iter()
            .copied()
            .find(|&c| !visited.contains(&c) && tree.node(c).self_id() == item_self);
        if let Some(child) = matching {
            visited.insert(child);
            out.content.push(ContentItem::Node(export_node(src, tree, child)?));
        }
    }
    for &child in children {
        if !visited.contains(&child) {
            out.content.push(ContentItem::Node(export_node(src, tree, child)?));
        }
    }
    Ok(out)
}
