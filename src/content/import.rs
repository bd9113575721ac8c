//! Import of external XML onto the structure.
//!
//! Each source element is matched to the next structure child carrying its
//! tag; structure children skipped over are left alone.
//! Matched nodes get their attributes stored as `XMLAttribute`s and their
//! text written over the existing runs: the text between two child elements
//! goes into the first `Content` between the corresponding story elements and
//! the other runs there are emptied. Unmatched source elements are created
//! only when their tag has a mapped character style; the new run starts from
//! the outermost mapped style, layers the nested ones on top and inherits
//! whatever the enclosing run sets and the mapped style does not.
//!
//! Three marker attributes tune the walk:
//! `simpleidml-setcontent="false"` keeps the existing text of a node,
//! `simpleidml-ignorecontent="true"` leaves a whole subtree alone and
//! `simpleidml-forcecontent="true"` re-enables one node inside such a subtree.
//! The markers themselves are never stored.

use std::collections::HashSet;

use log::{debug, warn};

use super::story::{
    self, CSR, DEFAULT_CHARACTER_STYLE, RUN_PROPERTIES, clone_style_range, content_items, is_content,
    new_content, set_xml_attribute, style_range,
};
use crate::error::{Error, Result};
use crate::package::Session;
use crate::part::resources::{StyleMapping, tag_definition};
use crate::part::{BACKING_STORY, MAPPING, PartSource, STYLES, TAGS, find_page_item, story_part_name, story_parts};
use crate::structure::{StructureId, StructureTree};
use crate::util::{IdPosition, increment_xmltag_id};
use crate::xml::{Attribute, NodeData, NodeId, XmlDocument};

pub const SET_CONTENT: &str = "simpleidml-setcontent";
pub const IGNORE_CONTENT: &str = "simpleidml-ignorecontent";
pub const FORCE_CONTENT: &str = "simpleidml-forcecontent";

/// Run attributes layered by nested styles and inherited from the parent run.
const NESTED_RUN_ATTRS: [&str; 7] = [
    "PointSize",
    "FontStyle",
    "HorizontalScale",
    "Tracking",
    "FillColor",
    "Capitalization",
    "Position",
];

pub(crate) fn import_xml(session: &mut Session, xml: &str, at: &str) -> Result<()> {
    let source = XmlDocument::parse(xml.as_bytes())?;
    let tree = StructureTree::build(&*session)?;
    let target = tree.resolve(at)?;

    let mapping = if session.has_part(MAPPING) {
        StyleMapping::from_doc(session.part(MAPPING)?)
    } else {
        StyleMapping::default()
    };
    let styles = if session.has_part(STYLES) {
        Some(session.part(STYLES)?.clone())
    } else {
        None
    };
    let ids = element_ids(session);

    let mut importer = Importer {
        session,
        tree,
        mapping,
        styles,
        ids,
        created_tags: Vec::new(),
    };
    importer.import_node(&source, source.root(), target, false)?;
    importer.define_created_tags()
}

struct Importer<'a> {
    session: &'a mut Session,
    tree: StructureTree,
    mapping: StyleMapping,
    styles: Option<XmlDocument>,
    /// Every `XMLElement` id in the package, new ones included.
    ids: HashSet<String>,
    created_tags: Vec<String>,
}

impl Importer<'_> {
    fn import_node(&mut self, src: &XmlDocument, source: NodeId, node: StructureId, ignore_parent: bool) -> Result<()> {
        let attrs: Vec<(String, String)> = src
            .attrs(source)
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect();
        let marker = |name: &str| attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str());

        let force = marker(FORCE_CONTENT) == Some("true");
        let writable = !ignore_parent || force;
        let ignore = marker(IGNORE_CONTENT) == Some("true") || (ignore_parent && !force);
        let set_content = writable && !ignore && marker(SET_CONTENT) != Some("false");

        let stored: Vec<(String, String)> = attrs
            .iter()
            .filter(|(n, _)| ![SET_CONTENT, IGNORE_CONTENT, FORCE_CONTENT].contains(&n.as_str()))
            .cloned()
            .collect();
        if writable && !stored.is_empty() {
            self.set_attributes(node, &stored)?;
        }

        let dest_children = self.tree.children(node).to_vec();
        let mut cursor = 0;
        let mut anchors: Vec<String> = Vec::new();
        let mut gaps: Vec<String> = vec![leading_text(src, source)];
        let src_children: Vec<NodeId> = src.element_children(source).collect();

        for &child in &src_children {
            let tag = src.name(child).unwrap_or_default();
            let matched = dest_children[cursor..]
                .iter()
                .position(|&d| self.tree.node(d).tag == tag);
            if let Some(offset) = matched {
                let dest = dest_children[cursor + offset];
                cursor += offset + 1;
                self.import_node(src, child, dest, ignore)?;
                anchors.push(self.tree.node(dest).self_id().to_string());
                gaps.push(tail_text(src, child));
            } else if !ignore && self.mapping.contains(tag) {
                let created = self.create_element(src, child, node, anchors.last().map(String::as_str))?;
                anchors.push(created);
                gaps.push(tail_text(src, child));
            } else {
                if !ignore {
                    warn!("dropping unmapped element <{tag}> under {}", self.tree.path_of(node));
                }
                if let Some(last) = gaps.last_mut() {
                    last.push_str(&src.text_content(child));
                    last.push_str(&tail_text(src, child));
                }
            }
        }

        let element_only = !src_children.is_empty() && gaps.iter().all(|g| g.trim().is_empty());
        if set_content && !element_only {
            self.write_runs(node, &anchors, &gaps)?;
        }
        Ok(())
    }

    fn set_attributes(&mut self, node: StructureId, attrs: &[(String, String)]) -> Result<()> {
        let info = self.tree.node(node);
        let story = info.story.clone();
        let self_id = info.self_id().to_string();
        let content_ref = info.xml_content().map(str::to_string);

        let doc = self.session.doc_mut(&story)?;
        let el = locate(doc, &self_id)?;
        for (name, value) in attrs {
            set_xml_attribute(doc, el, name, value);
        }

        if let Some((_, href)) = attrs.iter().find(|(n, _)| n == "href") {
            self.update_link(&story, &self_id, content_ref.as_deref(), href)?;
        }
        Ok(())
    }

    /// Point the linked resource of a page item at `href`, or drop the page
    /// item when `href` is empty.
    fn update_link(&mut self, story: &str, self_id: &str, content_ref: Option<&str>, href: &str) -> Result<()> {
        let spread = match content_ref {
            Some(id) => find_page_item(&*self.session, id)?.map(|(name, _)| name),
            None => None,
        };

        if href.is_empty() {
            let doc = self.session.doc_mut(story)?;
            let el = locate(doc, self_id)?;
            doc.remove_attr(el, "NoTextMarker");
            doc.remove_attr(el, "XMLContent");
            doc.clear_children(el);

            if let (Some(spread), Some(id)) = (spread, content_ref) {
                let doc = self.session.doc_mut(&spread)?;
                let item = doc
                    .get_by_id(None, "Self", id)
                    .or_else(|| doc.get_by_id(None, "ParentStory", id));
                if let Some(item) = item {
                    doc.detach(item);
                    debug!("removed page item {id} from {spread}");
                }
            }
            return Ok(());
        }

        let Some(id) = content_ref else {
            return Ok(());
        };
        for part in std::iter::once(story.to_string()).chain(spread) {
            let doc = self.session.doc_mut(&part)?;
            if let Some(item) = doc.get_by_id(None, "Self", id)
                && let Some(link) = doc.first_child_named(item, "Link")
            {
                doc.set_attr(link, "LinkResourceURI", href);
            }
        }
        Ok(())
    }

    /// Write the text segments of a source element over the runs of its
    /// story element. `gaps[k]` is the text between `anchors[k - 1]` and
    /// `anchors[k]`.
    fn write_runs(&mut self, node: StructureId, anchors: &[String], gaps: &[String]) -> Result<()> {
        let info = self.tree.node(node);
        let story = info.story.clone();
        let self_id = info.self_id().to_string();
        let holds_text = match info.xml_content() {
            Some(content) => story == story_part_name(content),
            None => true,
        };

        let doc = self.session.doc_mut(&story)?;
        let el = locate(doc, &self_id)?;
        let mut items = content_items(doc, el);
        let leaf = anchors.is_empty() && !items.iter().any(|&i| doc.is_named(i, "XMLElement"));

        if leaf {
            let extra: Vec<NodeId> = doc.children_named(el, CSR).skip(1).collect();
            for range in extra {
                if doc.find_descendant(range, "XMLElement").is_none() {
                    doc.detach(range);
                }
            }
            items = content_items(doc, el);
        }

        let mut gap = 0;
        let mut filled = vec![false; gaps.len()];
        let mut anchor_nodes: Vec<Option<NodeId>> = vec![None; anchors.len()];
        for &item in &items {
            if is_content(doc, item) {
                if filled[gap] {
                    doc.set_text_content(item, "");
                } else {
                    doc.set_text_content(item, &gaps[gap]);
                    filled[gap] = true;
                }
            } else if let Some(item_self) = doc.attr(item, "Self")
                && let Some(offset) = anchors[gap..].iter().position(|a| a == item_self)
            {
                gap += offset + 1;
                anchor_nodes[gap - 1] = Some(item);
            }
        }

        for (g, text) in gaps.iter().enumerate() {
            if filled[g] || text.is_empty() {
                continue;
            }
            let reference = if g == 0 {
                items.first().map(|&first| (first, false))
            } else {
                anchor_nodes[g - 1].map(|prev| (prev, true))
            };
            if reference.is_none() && !holds_text {
                debug!("{self_id} holds a page item; text not written");
                continue;
            }
            insert_run(doc, el, reference, text);
        }

        if leaf
            && story::local_style_range(doc, el).is_none()
            && story::super_style_range(doc, el).is_some()
            && let Some(&content) = doc.children_named(el, "Content").collect::<Vec<_>>().first()
        {
            let range = clone_style_range(doc, el);
            doc.append_child(range, content);
            doc.append_child(el, range);
        }
        Ok(())
    }

    /// Create the story element for an unmatched, mapped source element.
    /// Returns the new element's id.
    fn create_element(
        &mut self,
        src: &XmlDocument,
        source: NodeId,
        parent: StructureId,
        prev_anchor: Option<&str>,
    ) -> Result<String> {
        let tag = src.name(source).unwrap_or_default().to_string();
        let parent_info = self.tree.node(parent);
        let story = parent_info.story.clone();
        let parent_self = parent_info.self_id().to_string();
        let chain = self.style_chain(parent, &tag);

        let mut lead = leading_text(src, source);
        let mut nested: Vec<(NodeId, String)> = Vec::new();
        for child in src.element_children(source) {
            let child_tag = src.name(child).unwrap_or_default();
            let tail = tail_text(src, child);
            if self.mapping.contains(child_tag) {
                nested.push((child, tail));
                continue;
            }
            warn!("dropping unmapped element <{child_tag}> inside new <{tag}>");
            let target = match nested.last_mut() {
                Some((_, t)) => t,
                None => &mut lead,
            };
            target.push_str(&src.text_content(child));
            target.push_str(&tail);
        }

        let new_self = {
            let doc = self.session.doc_mut(&story)?;
            let el = locate(doc, &parent_self)?;
            let new_el = doc.create_element_with(
                "XMLElement",
                vec![
                    Attribute::new("Self", ""),
                    Attribute::new("MarkupTag", format!("XMLTag/{tag}")),
                ],
            );
            let range = nested_style_range(doc, el, &chain, self.styles.as_ref());
            let content = new_content(doc, &lead);
            doc.append_child(range, content);
            doc.append_child(new_el, range);

            place_element(doc, el, new_el, prev_anchor);
            let new_self = unique_element_id(doc, new_el, &parent_self, &self.ids);
            doc.set_attr(new_el, "Self", new_self.clone());
            new_self
        };
        self.ids.insert(new_self.clone());
        if !self.created_tags.contains(&tag) {
            self.created_tags.push(tag.clone());
        }
        debug!("created <{tag}> {new_self} in {story}");

        let created = self
            .tree
            .append_child(parent, &tag, vec![Attribute::new("Self", new_self.clone())]);

        let mut prev: Option<String> = None;
        for (child, tail) in nested {
            let child_self = self.create_element(src, child, created, prev.as_deref())?;
            if !tail.is_empty() {
                let doc = self.session.doc_mut(&story)?;
                let el = locate(doc, &new_self)?;
                let child_el = locate(doc, &child_self)?;
                insert_run(doc, el, Some((child_el, true)), &tail);
            }
            prev = Some(child_self);
        }
        Ok(new_self)
    }

    /// Mapped styles from the outermost ancestor down to `tag`.
    fn style_chain(&self, parent: StructureId, tag: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(parent);
        while let Some(id) = current {
            if let Some(style) = self.mapping.get(&self.tree.node(id).tag) {
                chain.push(style.to_string());
            }
            current = self.tree.parent(id);
        }
        chain.reverse();
        if let Some(style) = self.mapping.get(tag) {
            chain.push(style.to_string());
        }
        chain
    }

    /// Make sure every created tag has an `XMLTag` definition.
    fn define_created_tags(&mut self) -> Result<()> {
        if self.created_tags.is_empty() || !self.session.has_part(TAGS) {
            return Ok(());
        }
        let doc = self.session.doc_mut(TAGS)?;
        for tag in &self.created_tags {
            if doc.get_by_id(Some("XMLTag"), "Self", &format!("XMLTag/{tag}")).is_none() {
                let def = tag_definition(doc, tag);
                let root = doc.root();
                doc.append_child(root, def);
            }
        }
        Ok(())
    }
}

fn locate(doc: &XmlDocument, self_id: &str) -> Result<NodeId> {
    doc.get_by_id(Some("XMLElement"), "Self", self_id)
        .ok_or_else(|| Error::MissingPageItem(self_id.to_string()))
}

/// Every `XMLElement` id of the backing story and the story parts.
fn element_ids(session: &Session) -> HashSet<String> {
    let mut parts = story_parts(session);
    parts.push(BACKING_STORY.to_string());

    let mut ids = HashSet::new();
    for name in parts {
        if let Ok(doc) = session.part(&name) {
            ids.extend(
                doc.elements_named("XMLElement")
                    .filter_map(|el| doc.attr(el, "Self").map(str::to_string)),
            );
        }
    }
    ids
}

/// Text of `node` before its first child element.
fn leading_text(doc: &XmlDocument, node: NodeId) -> String {
    doc.children(node)
        .iter()
        .take_while(|&&c| !doc.is_element(c))
        .filter_map(|&c| doc.text(c))
        .collect()
}

/// Text following `node` up to its next element sibling.
fn tail_text(doc: &XmlDocument, node: NodeId) -> String {
    let (Some(parent), Some(pos)) = (doc.parent(node), doc.index_in_parent(node)) else {
        return String::new();
    };
    doc.children(parent)[pos + 1..]
        .iter()
        .take_while(|&&c| !doc.is_element(c))
        .filter_map(|&c| match doc.data(c) {
            NodeData::Text(t) | NodeData::CData(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

/// Insert a text run next to `reference` (after it when the flag is set),
/// or at the end of `el` when there is no reference. Runs outside a
/// character range get a copy of the element's range.
fn insert_run(doc: &mut XmlDocument, el: NodeId, reference: Option<(NodeId, bool)>, text: &str) {
    let content = new_content(doc, text);
    let Some((reference, after)) = reference else {
        let range = clone_style_range(doc, el);
        doc.append_child(range, content);
        doc.append_child(el, range);
        return;
    };

    let in_range = doc.parent(reference).is_some_and(|p| doc.is_named(p, CSR));
    let node = if in_range {
        content
    } else {
        let range = clone_style_range(doc, el);
        doc.append_child(range, content);
        range
    };
    if after {
        doc.insert_after(reference, node);
    } else {
        doc.insert_before(reference, node);
    }
}

/// Put a new element after `prev_anchor`, or after the leading text runs
/// of `el` when there is none.
fn place_element(doc: &mut XmlDocument, el: NodeId, new_el: NodeId, prev_anchor: Option<&str>) {
    if let Some(prev) = prev_anchor
        && let Some(prev_el) = doc.get_by_id(Some("XMLElement"), "Self", prev)
    {
        doc.insert_after(prev_el, new_el);
        return;
    }

    let items = content_items(doc, el);
    let lead_run = items.iter().take_while(|&&i| is_content(doc, i)).last().copied();
    match (lead_run, items.first().copied()) {
        (Some(run), _) => doc.insert_after(run, new_el),
        (None, Some(first)) => doc.insert_before(first, new_el),
        (None, None) => doc.append_child(el, new_el),
    }
}

/// Id for a freshly placed element: the successor of its preceding
/// `XMLElement` sibling, or the first child id of its enclosing element,
/// bumped until unused.
fn unique_element_id(doc: &XmlDocument, el: NodeId, parent_self: &str, taken: &HashSet<String>) -> String {
    let preceding = doc.parent(el).and_then(|p| {
        let children = doc.children(p);
        let pos = children.iter().position(|&c| c == el)?;
        children[..pos]
            .iter()
            .rev()
            .copied()
            .find(|&c| doc.is_named(c, "XMLElement"))
    });

    let mut candidate = match preceding.and_then(|p| doc.attr(p, "Self")) {
        Some(sibling) => increment_xmltag_id(sibling, IdPosition::Sibling),
        None => {
            let enclosing = doc
                .ancestors(el)
                .find(|&a| doc.is_named(a, "XMLElement"))
                .and_then(|a| doc.attr(a, "Self"))
                .unwrap_or(parent_self);
            increment_xmltag_id(enclosing, IdPosition::Child)
        }
    };
    while taken.contains(&candidate) {
        candidate = increment_xmltag_id(&candidate, IdPosition::Sibling);
    }
    candidate
}

/// Character range for a new element: the outermost mapped style, the
/// nested styles layered on it, then the parent run's settings for what
/// the styles leave open.
fn nested_style_range(doc: &mut XmlDocument, parent_el: NodeId, chain: &[String], styles: Option<&XmlDocument>) -> NodeId {
    let root_name = chain.first().map(String::as_str).unwrap_or(DEFAULT_CHARACTER_STYLE);
    let lookup = |name: &str| styles.and_then(|s| s.get_by_id(Some("CharacterStyle"), "Self", name));
    let root_style = lookup(root_name);
    let root_attr = |attr: &str| -> Option<String> {
        let (styles, node) = (styles?, root_style?);
        styles.attr(node, attr).filter(|v| !v.is_empty()).map(str::to_string)
    };

    let range = doc.create_element_with(CSR, vec![Attribute::new("AppliedCharacterStyle", root_name)]);
    let props = doc.create_element("Properties");
    doc.append_child(range, props);

    for name in chain.iter().skip(1) {
        let (Some(styles), Some(style)) = (styles, lookup(name)) else {
            continue;
        };
        for attr in NESTED_RUN_ATTRS {
            let Some(value) = styles.attr(style, attr) else {
                continue;
            };
            let value = if attr == "FontStyle" {
                let applied = doc.attr(range, attr).map(str::to_string).or_else(|| root_attr(attr));
                merge_font_style(applied.as_deref(), value)
            } else {
                value.to_string()
            };
            doc.set_attr(range, attr, value);
        }
    }

    let Some(parent_range) = style_range(doc, parent_el) else {
        return range;
    };
    for attr in NESTED_RUN_ATTRS {
        if root_attr(attr).is_some() || doc.attr(range, attr).is_some() {
            continue;
        }
        if let Some(value) = doc.attr(parent_range, attr).map(str::to_string) {
            doc.set_attr(range, attr, value);
        }
    }
    for prop in RUN_PROPERTIES {
        let path = format!("Properties/{prop}");
        let style_sets = match (styles, root_style) {
            (Some(styles), Some(node)) => styles.find_path(node, &path).is_some(),
            _ => false,
        };
        if style_sets {
            continue;
        }
        if let Some(inherited) = doc.find_path(parent_range, &path) {
            let copy = doc.duplicate(inherited);
            doc.append_child(props, copy);
        }
    }
    range
}

/// Combine an inherited font style with a nested one (`Bold` + `Italic` is
/// `Bold Italic`). Anything else takes the nested style.
fn merge_font_style(applied: Option<&str>, to_apply: &str) -> String {
    let merged = match (applied, to_apply) {
        (Some("Condensed"), "Light") => Some("Condensed Light"),
        (Some("Bold"), "Italic") => Some("Bold Italic"),
        (Some("SemiBold"), "Italic") => Some("SemiBold Italic"),
        (Some("Semibold"), "Italic") => Some("Semibold Italic"),
        _ => None,
    };
    merged.unwrap_or(to_apply).to_string()
}
