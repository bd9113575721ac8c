//! Manifest (`designmap.xml`) reads and edits.

use crate::xml::{Attribute, NodeId, XmlDocument};

use super::{MAPPING, story_part_name};

pub const SPREAD_REF: &str = "idPkg:Spread";
pub const STORY_REF: &str = "idPkg:Story";
pub const MAPPING_REF: &str = "idPkg:Mapping";

/// `src` of every `idPkg:Spread` child, in manifest order.
pub fn spread_refs(doc: &XmlDocument) -> Vec<String> {
    doc.children_named(doc.root(), SPREAD_REF)
        .filter_map(|n| doc.attr(n, "src").map(str::to_string))
        .collect()
}

/// `src` of every `idPkg:Story` child, in manifest order.
pub fn story_refs(doc: &XmlDocument) -> Vec<String> {
    doc.children_named(doc.root(), STORY_REF)
        .filter_map(|n| doc.attr(n, "src").map(str::to_string))
        .collect()
}

/// Space-separated `StoryList` of the root `Document`.
pub fn story_list(doc: &XmlDocument) -> Vec<String> {
    doc.attr(doc.root(), "StoryList")
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Append `ids` to `StoryList` and add one `idPkg:Story` reference per id.
pub fn add_stories(doc: &mut XmlDocument, ids: &[String]) {
    let root = doc.root();
    let mut list = story_list(doc);
    list.extend(ids.iter().cloned());
    doc.set_attr(root, "StoryList", list.join(" "));

    for id in ids {
        let node = doc.create_element_with(STORY_REF, vec![Attribute::new("src", story_part_name(id))]);
        doc.append_child(root, node);
    }
}

/// Insert a spread reference right after the last existing one.
pub fn add_spread(doc: &mut XmlDocument, src: &str) {
    let root = doc.root();
    let node = doc.create_element_with(SPREAD_REF, vec![Attribute::new("src", src)]);
    match doc.children_named(root, SPREAD_REF).last() {
        Some(last) => doc.insert_after(last, node),
        None => doc.append_child(root, node),
    }
}

/// Reference `XML/Mapping.xml` unless already referenced.
pub fn ensure_mapping_ref(doc: &mut XmlDocument) {
    let root = doc.root();
    if doc.first_child_named(root, MAPPING_REF).is_some() {
        return;
    }
    let node = doc.create_element_with(MAPPING_REF, vec![Attribute::new("src", MAPPING)]);
    doc.append_child(root, node);
}

pub fn layers(doc: &XmlDocument) -> Vec<NodeId> {
    doc.children_named(doc.root(), "Layer").collect()
}

pub fn section(doc: &XmlDocument) -> Option<NodeId> {
    doc.first_child_named(doc.root(), "Section")
}

/// Copy the layers of `src` that `dest` lacks (by `Self`), after the last
/// destination layer.
pub fn add_layers(dest: &mut XmlDocument, src: &XmlDocument) -> usize {
    let existing = layer_ids(dest);

    let mut added = 0;
    let mut anchor = layers(dest).last().copied();
    for layer in layers(src) {
        if src.attr(layer, "Self").is_some_and(|s| existing.iter().any(|e| e == s)) {
            continue;
        }
        let copy = dest.import_node(src, layer);
        match anchor {
            Some(a) => dest.insert_after(a, copy),
            None => {
                let root = dest.root();
                dest.append_child(root, copy);
            }
        }
        anchor = Some(copy);
        added += 1;
    }
    added
}

/// `ActiveLayer` of the root `Document`.
pub fn active_layer(doc: &XmlDocument) -> Option<&str> {
    doc.attr(doc.root(), "ActiveLayer")
}

/// `Self` of every layer, in manifest order.
pub fn layer_ids(doc: &XmlDocument) -> Vec<String> {
    layers(doc)
        .into_iter()
        .filter_map(|l| doc.attr(l, "Self").map(str::to_string))
        .collect()
}

/// Append `suffix` to the `Name` of every layer.
pub fn suffix_layers(doc: &mut XmlDocument, suffix: &str) {
    for layer in layers(doc) {
        let name = format!("{}{suffix}", doc.attr(layer, "Name").unwrap_or_default());
        doc.set_attr(layer, "Name", name);
    }
}

/// Keep the first layer only, optionally renamed, and make it active.
///
/// Returns the id of the kept layer, or `None` when there are no layers.
pub fn merge_layers(doc: &mut XmlDocument, with_name: Option<&str>) -> Option<String> {
    let mut all = layers(doc).into_iter();
    let first = all.next()?;
    for layer in all {
        doc.detach(layer);
    }
    if let Some(name) = with_name {
        doc.set_attr(first, "Name", name);
    }
    let id = doc.attr(first, "Self")?.to_string();
    let root = doc.root();
    doc.set_attr(root, "ActiveLayer", id.clone());
    Some(id)
}

/// Remove the layer `id`. When it was the active one, the first remaining
/// layer becomes active, or the attribute goes away with the last layer.
pub fn remove_layer(doc: &mut XmlDocument, id: &str) -> bool {
    let Some(layer) = layers(doc).into_iter().find(|&l| doc.attr(l, "Self") == Some(id)) else {
        return false;
    };
    doc.detach(layer);

    if active_layer(doc) == Some(id) {
        let root = doc.root();
        doc.remove_attr(root, "ActiveLayer");
        if let Some(next) = layer_ids(doc).into_iter().next() {
            doc.set_attr(root, "ActiveLayer", next);
        }
    }
    true
}
