//! Shared catalogs: fonts, styles, tags, graphics and the style mapping.
//!
//! Merges copy the source definitions the destination lacks and never touch
//! the ones it already has.

use std::collections::HashSet;

use crate::xml::{Attribute, NodeId, XmlDocument};

/// Ordered `{tag name -> style id}` table read from `XML/Mapping.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMapping {
    entries: Vec<(String, String)>,
}

impl StyleMapping {
    pub fn from_doc(doc: &XmlDocument) -> Self {
        let mut mapping = Self::default();
        for node in doc.elements_named("XMLImportMap") {
            let (Some(tag), Some(style)) = (doc.attr(node, "MarkupTag"), doc.attr(node, "MappedStyle")) else {
                continue;
            };
            mapping.insert(strip_tag_prefix(tag), style);
        }
        mapping
    }

    /// Later entries for the same tag replace earlier ones in place.
    pub fn insert(&mut self, tag: &str, style: &str) {
        match self.entries.iter_mut().find(|(t, _)| t == tag) {
            Some(entry) => entry.1 = style.to_string(),
            None => self.entries.push((tag.to_string(), style.to_string())),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, s)| s.as_str())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, s)| (t.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `XMLTag/article` -> `article`
pub fn strip_tag_prefix(markup_tag: &str) -> &str {
    markup_tag.strip_prefix("XMLTag/").unwrap_or(markup_tag)
}

pub fn font_families(doc: &XmlDocument) -> Vec<NodeId> {
    doc.elements_named("FontFamily").collect()
}

/// Root children whose name ends in `Group` (`RootCharacterStyleGroup`, ...).
pub fn style_groups(doc: &XmlDocument) -> Vec<NodeId> {
    doc.element_children(doc.root())
        .filter(|&n| doc.name(n).is_some_and(|name| name.ends_with("Group")))
        .collect()
}

pub fn xml_tags(doc: &XmlDocument) -> Vec<NodeId> {
    doc.elements_named("XMLTag").collect()
}

/// Append the font families of `src` whose `Name` is not in `dest`.
pub fn merge_fonts(dest: &mut XmlDocument, src: &XmlDocument) -> usize {
    let known: HashSet<String> = font_families(dest)
        .into_iter()
        .filter_map(|n| dest.attr(n, "Name").map(str::to_string))
        .collect();

    let mut added = 0;
    for family in font_families(src) {
        if src.attr(family, "Name").is_some_and(|name| known.contains(name)) {
            continue;
        }
        append_copy(dest, src, family);
        added += 1;
    }
    added
}

/// Append unseen style groups, or the unseen members of existing groups.
pub fn merge_styles(dest: &mut XmlDocument, src: &XmlDocument) -> usize {
    let mut added = 0;
    for group in style_groups(src) {
        let Some(group_name) = src.name(group) else {
            continue;
        };
        let host = dest.first_child_named(dest.root(), group_name);
        let Some(host) = host else {
            append_copy(dest, src, group);
            added += 1;
            continue;
        };

        let known = self_ids_below(dest, host);
        let members: Vec<NodeId> = src.element_children(group).collect();
        for member in members {
            if src.attr(member, "Self").is_some_and(|s| known.contains(s)) {
                continue;
            }
            let copy = dest.import_node(src, member);
            dest.append_child(host, copy);
            added += 1;
        }
    }
    added
}

/// Append the root children of `src` named `name` (any when `None`) whose
/// `Self` is not already used in `dest`.
pub fn merge_by_self(dest: &mut XmlDocument, src: &XmlDocument, name: Option<&str>) -> usize {
    let known = self_ids_below(dest, dest.root());
    let candidates: Vec<NodeId> = src
        .element_children(src.root())
        .filter(|&n| name.is_none_or(|want| src.is_named(n, want)))
        .collect();

    let mut added = 0;
    for node in candidates {
        if src.attr(node, "Self").is_some_and(|s| known.contains(s)) {
            continue;
        }
        append_copy(dest, src, node);
        added += 1;
    }
    added
}

/// Copy the `XMLImportMap` entries of `src` whose tag `dest` does not map yet.
pub fn merge_mapping(dest: &mut XmlDocument, src: &XmlDocument) -> usize {
    let mut known = StyleMapping::from_doc(dest);
    let mut added = 0;
    for node in src.elements_named("XMLImportMap").collect::<Vec<_>>() {
        let Some(tag) = src.attr(node, "MarkupTag") else {
            continue;
        };
        let tag = strip_tag_prefix(tag);
        if known.contains(tag) {
            continue;
        }
        known.insert(tag, src.attr(node, "MappedStyle").unwrap_or_default());
        append_copy(dest, src, node);
        added += 1;
    }
    added
}

/// `XMLTag` definition for a tag name.
pub fn tag_definition(doc: &mut XmlDocument, tag: &str) -> NodeId {
    doc.create_element_with(
        "XMLTag",
        vec![
            Attribute::new("Self", format!("XMLTag/{tag}")),
            Attribute::new("Name", tag),
        ],
    )
}

fn self_ids_below(doc: &XmlDocument, id: NodeId) -> HashSet<String> {
    doc.descendants(id)
        .into_iter()
        .filter_map(|n| doc.attr(n, "Self").map(str::to_string))
        .collect()
}

fn append_copy(dest: &mut XmlDocument, src: &XmlDocument, node: NodeId) {
    let copy = dest.import_node(src, node);
    let root = dest.root();
    dest.append_child(root, copy);
}
