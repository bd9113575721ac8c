//! Virtual structure tree.
//!
//! The logical XML structure of a document is scattered over the backing
//! story and the story parts: an `XMLElement` with an `XMLContent` pointing at
//! a story continues inside `Stories/Story_<XMLContent>.xml`, under the element
//! carrying the same `Self`. [`StructureTree::build`] stitches those fragments
//! into one tree whose nodes are named after their markup tags.

use log::debug;

use crate::error::{Error, Result};
use crate::part::resources::strip_tag_prefix;
use crate::part::{BACKING_STORY, PartSource, story_part_name};
use crate::xml::{Attribute, NodeId, XmlDocument};

/// Index of a node in a [`StructureTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructureId(usize);

#[derive(Debug, Clone)]
pub struct StructureNode {
    /// Markup tag without the `XMLTag/` prefix.
    pub tag: String,
    /// Attributes of the `XMLElement`, minus `MarkupTag`.
    pub attrs: Vec<Attribute>,
    /// Story part whose `XMLElement` with this node's `Self` holds the content.
    pub story: String,
    parent: Option<StructureId>,
    children: Vec<StructureId>,
}

impl StructureNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// The `Self` id, unique across the package.
    pub fn self_id(&self) -> &str {
        self.attr("Self").unwrap_or_default()
    }

    pub fn xml_content(&self) -> Option<&str> {
        self.attr("XMLContent")
    }
}

#[derive(Debug, Clone)]
pub struct StructureTree {
    nodes: Vec<StructureNode>,
}

impl StructureTree {
    /// Reconstruct the tree starting at the backing story's root element.
    pub fn build<S: PartSource + ?Sized>(src: &S) -> Result<Self> {
        let backing = src.part(BACKING_STORY)?;
        let root_el = backing
            .find_descendant(backing.root(), "XMLElement")
            .ok_or_else(|| Error::UnsupportedShape("backing story has no XMLElement".into()))?;

        let mut tree = Self { nodes: Vec::new() };
        let root_story = backing
            .attr(root_el, "XMLContent")
            .map(story_part_name)
            .filter(|name| src.has_part(name))
            .unwrap_or_else(|| BACKING_STORY.to_string());
        let root = tree.push(None, element_tag(backing, root_el), element_attrs(backing, root_el), root_story);

        tree.append_children(src, backing, root_el, root)?;
        Ok(tree)
    }

    fn append_children<S: PartSource + ?Sized>(
        &mut self,
        src: &S,
        doc: &XmlDocument,
        source: NodeId,
        dest: StructureId,
    ) -> Result<()> {
        let source_self = doc.attr(source, "Self");
        for child in doc.element_children(source).collect::<Vec<_>>() {
            if !doc.is_named(child, "XMLElement") {
                self.append_children(src, doc, child, dest)?;
                continue;
            }
            if doc.attr(child, "Self").is_some() && doc.attr(child, "Self") == source_self {
                continue;
            }
            let Some(markup_tag) = doc.attr(child, "MarkupTag") else {
                continue;
            };

            let attrs = element_attrs(doc, child);
            let content_story = doc
                .attr(child, "XMLContent")
                .map(story_part_name)
                .filter(|name| src.has_part(name));
            let story = content_story
                .clone()
                .unwrap_or_else(|| self.node(dest).story.clone());
            let node = self.push(Some(dest), strip_tag_prefix(markup_tag).to_string(), attrs, story);

            match (doc.attr(child, "XMLContent"), content_story) {
                (None, _) => self.append_children(src, doc, child, node)?,
                (Some(_), Some(story_name)) => {
                    let story_doc = src.part(&story_name)?;
                    let self_id = doc.attr(child, "Self").unwrap_or_default();
                    match story_doc.get_by_id(Some("XMLElement"), "Self", self_id) {
                        Some(story_el) => self.append_children(src, story_doc, story_el, node)?,
                        None => debug!("{story_name} has no element {self_id}; branch stops"),
                    }
                }
                (Some(content), None) => {
                    debug!("XMLContent {content} is not a story part; branch stops");
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, parent: Option<StructureId>, tag: String, attrs: Vec<Attribute>, story: String) -> StructureId {
        let id = StructureId(self.nodes.len());
        self.nodes.push(StructureNode {
            tag,
            attrs,
            story,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Record a node created after the tree was built.
    pub(crate) fn append_child(&mut self, parent: StructureId, tag: &str, attrs: Vec<Attribute>) -> StructureId {
        let story = self.node(parent).story.clone();
        self.push(Some(parent), tag.to_string(), attrs, story)
    }

    pub fn root(&self) -> StructureId {
        StructureId(0)
    }

    pub fn node(&self, id: StructureId) -> &StructureNode {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: StructureId) -> Option<StructureId> {
        self.node(id).parent
    }

    pub fn children(&self, id: StructureId) -> &[StructureId] {
        &self.node(id).children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `id` and everything below it, in document order.
    pub fn descendants(&self, id: StructureId) -> Vec<StructureId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Every `Self` id in document order.
    pub fn self_ids(&self) -> Vec<String> {
        self.descendants(self.root())
            .into_iter()
            .map(|id| self.node(id).self_id().to_string())
            .collect()
    }

    pub fn find_by_self(&self, self_id: &str) -> Option<StructureId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&id| self.node(id).self_id() == self_id)
    }

    /// Resolve an absolute path such as `/Root/article[3]/module`.
    ///
    /// Each step names a tag with an optional 1-based index among the
    /// siblings carrying that tag.
    pub fn resolve(&self, path: &str) -> Result<StructureId> {
        let not_found = || Error::PathNotFound(path.to_string());
        let mut steps = path.strip_prefix('/').ok_or_else(not_found)?.split('/');

        let (root_tag, root_index) = parse_step(steps.next().ok_or_else(not_found)?).ok_or_else(not_found)?;
        let root = self.root();
        if self.node(root).tag != root_tag || root_index != 1 {
            return Err(not_found());
        }

        let mut current = root;
        for step in steps {
            let (tag, index) = parse_step(step).ok_or_else(not_found)?;
            current = self
                .children(current)
                .iter()
                .copied()
                .filter(|&c| self.node(c).tag == tag)
                .nth(index - 1)
                .ok_or_else(not_found)?;
        }
        Ok(current)
    }

    /// Absolute path of a node; an index is only written when siblings share
    /// the tag.
    pub fn path_of(&self, id: StructureId) -> String {
        let mut steps = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let tag = &self.node(current).tag;
            let same: Vec<StructureId> = self
                .children(parent)
                .iter()
                .copied()
                .filter(|&c| &self.node(c).tag == tag)
                .collect();
            if same.len() > 1 {
                let pos = same.iter().position(|&c| c == current).unwrap_or(0) + 1;
                steps.push(format!("{tag}[{pos}]"));
            } else {
                steps.push(tag.clone());
            }
            current = parent;
        }
        steps.push(self.node(current).tag.clone());
        steps.reverse();
        format!("/{}", steps.join("/"))
    }

    /// Story parts referenced by `id` and its descendants, in document order.
    pub fn stories_below<S: PartSource + ?Sized>(&self, src: &S, id: StructureId) -> Vec<String> {
        let mut parts: Vec<String> = Vec::new();
        for node in self.descendants(id) {
            if let Some(content) = self.node(node).xml_content() {
                let name = story_part_name(content);
                if src.has_part(&name) && !parts.contains(&name) {
                    parts.push(name);
                }
            }
        }
        parts
    }

    /// The tree as an XML document, one element per node.
    pub fn to_document(&self) -> XmlDocument {
        let root = self.root();
        let mut doc = XmlDocument::new(&self.node(root).tag);
        let doc_root = doc.root();
        self.fill(&mut doc, root, doc_root);
        doc
    }

    fn fill(&self, doc: &mut XmlDocument, id: StructureId, el: NodeId) {
        for attr in &self.node(id).attrs {
            doc.set_attr(el, &attr.name, attr.value.clone());
        }
        for &child in self.children(id) {
            let child_el = doc.create_element(&self.node(child).tag);
            doc.append_child(el, child_el);
            self.fill(doc, child, child_el);
        }
    }
}

fn element_tag(doc: &XmlDocument, el: NodeId) -> String {
    doc.attr(el, "MarkupTag")
        .map(|t| strip_tag_prefix(t).to_string())
        .unwrap_or_else(|| "Root".to_string())
}

fn element_attrs(doc: &XmlDocument, el: NodeId) -> Vec<Attribute> {
    doc.attrs(el)
        .iter()
        .filter(|a| a.name != "MarkupTag")
        .cloned()
        .collect()
}

/// `article[3]` -> (`article`, 3); `article` -> (`article`, 1).
fn parse_step(step: &str) -> Option<(&str, usize)> {
    match step.split_once('[') {
        Some((tag, rest)) => {
            let index: usize = rest.strip_suffix(']')?.trim().parse().ok()?;
            (index >= 1 && !tag.is_empty()).then_some((tag, index))
        }
        None => (!step.is_empty()).then_some((step, 1)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Parts(HashMap<String, XmlDocument>);

    impl PartSource for Parts {
        fn member_names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.0.keys().cloned().collect();
            names.sort();
            names
        }

        fn has_part(&self, name: &str) -> bool {
            self.0.contains_key(name)
        }

        fn part(&self, name: &str) -> Result<&XmlDocument> {
            self.0.get(name).ok_or_else(|| Error::MissingPart(name.to_string()))
        }
    }

    fn parts(members: &[(&str, &str)]) -> Parts {
        Parts(
            members
                .iter()
                .map(|(n, x)| (n.to_string(), XmlDocument::parse(x.as_bytes()).unwrap()))
                .collect(),
        )
    }

    fn sample() -> Parts {
        parts(&[
            (
                BACKING_STORY,
                r#"<idPkg:BackingStory><XmlStory Self="ua"><XMLElement Self="di2" MarkupTag="XMLTag/Root">
<XMLElement Self="di2i3" MarkupTag="XMLTag/article" XMLContent="u102"/>
<XMLElement Self="di2i4" MarkupTag="XMLTag/article" XMLContent="udb"/>
<XMLElement Self="di2i5" MarkupTag="XMLTag/advertise" XMLContent="ue1"/>
<XMLElement Self="di2i6"/>
</XMLElement></XmlStory></idPkg:BackingStory>"#,
            ),
            (
                "Stories/Story_u102.xml",
                r#"<idPkg:Story><Story Self="u102"><XMLElement Self="di2i3" MarkupTag="XMLTag/article" XMLContent="u102">
<ParagraphStyleRange><CharacterStyleRange>
<XMLElement Self="di2i3i1" MarkupTag="XMLTag/title"><Content>Hello</Content></XMLElement>
</CharacterStyleRange></ParagraphStyleRange>
<XMLElement Self="di2i3i2" MarkupTag="XMLTag/illustration" XMLContent="u1d4"/>
</XMLElement></Story></idPkg:Story>"#,
            ),
        ])
    }

    #[test]
    fn test_build_follows_story_parts() {
        let src = sample();
        let tree = StructureTree::build(&src).unwrap();
        let doc = tree.to_document();
        assert_eq!(
            doc.to_xml_string(doc.root(), false),
            concat!(
                r#"<Root Self="di2">"#,
                r#"<article Self="di2i3" XMLContent="u102"><title Self="di2i3i1"/><illustration Self="di2i3i2" XMLContent="u1d4"/></article>"#,
                r#"<article Self="di2i4" XMLContent="udb"/>"#,
                r#"<advertise Self="di2i5" XMLContent="ue1"/>"#,
                "</Root>"
            )
        );
    }

    #[test]
    fn test_story_of_nodes() {
        let src = sample();
        let tree = StructureTree::build(&src).unwrap();
        assert_eq!(tree.node(tree.root()).story, BACKING_STORY);
        let article = tree.resolve("/Root/article[1]").unwrap();
        assert_eq!(tree.node(article).story, "Stories/Story_u102.xml");
        let illustration = tree.resolve("/Root/article[1]/illustration").unwrap();
        assert_eq!(tree.node(illustration).story, "Stories/Story_u102.xml");
        let missing = tree.resolve("/Root/article[2]").unwrap();
        assert_eq!(tree.node(missing).story, BACKING_STORY);
    }

    #[test]
    fn test_resolve_and_path_of() {
        let src = sample();
        let tree = StructureTree::build(&src).unwrap();
        let second = tree.resolve("/Root/article[2]").unwrap();
        assert_eq!(tree.node(second).self_id(), "di2i4");
        assert_eq!(tree.path_of(second), "/Root/article[2]");

        let advertise = tree.resolve("/Root/advertise[1]").unwrap();
        assert_eq!(tree.path_of(advertise), "/Root/advertise");
        assert_eq!(tree.path_of(tree.root()), "/Root");

        for bad in ["Root", "/Other", "/Root/article[3]", "/Root/article[0]", "/Root/x["] {
            assert!(matches!(tree.resolve(bad), Err(Error::PathNotFound(_))), "{bad}");
        }
    }

    #[test]
    fn test_stories_below() {
        let src = sample();
        let tree = StructureTree::build(&src).unwrap();
        assert_eq!(tree.stories_below(&src, tree.root()), vec!["Stories/Story_u102.xml"]);
        let second = tree.resolve("/Root/article[2]").unwrap();
        assert!(tree.stories_below(&src, second).is_empty());
    }

    #[test]
    fn test_missing_backing_story() {
        let src = parts(&[]);
        assert!(matches!(StructureTree::build(&src), Err(Error::MissingPart(_))));
    }
}
