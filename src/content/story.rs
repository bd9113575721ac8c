//! Helpers over `XMLElement` nodes inside story parts.

use chrono::NaiveDateTime;

use crate::xml::{Attribute, NodeId, XmlDocument};

pub const CSR: &str = "CharacterStyleRange";
pub const PSR: &str = "ParagraphStyleRange";
pub const DEFAULT_CHARACTER_STYLE: &str = "CharacterStyle/$ID/[No character style]";
pub const DEFAULT_PARAGRAPH_STYLE: &str = "ParagraphStyle/$ID/[No paragraph style]";

/// Run attributes carried over when a style range is cloned.
const CLONED_RUN_ATTRS: [&str; 16] = [
    "PointSize",
    "FontStyle",
    "HorizontalScale",
    "Tracking",
    "FillColor",
    "FillTint",
    "Capitalization",
    "StrokeWeight",
    "MiterLimit",
    "RubyFontSize",
    "KentenFontSize",
    "DiacriticPosition",
    "Ligatures",
    "OTFContextualAlternate",
    "BaselineShift",
    "Position",
];

/// `Properties` children carried along with the run attributes.
pub const RUN_PROPERTIES: [&str; 2] = ["Leading", "AppliedFont"];

/// `Content` runs and nested `XMLElement`s of an element, in document order.
///
/// Looks at direct children, at character ranges below the element and at
/// character ranges inside its paragraph ranges.
pub fn content_items(doc: &XmlDocument, el: NodeId) -> Vec<NodeId> {
    let mut items = Vec::new();
    for child in doc.element_children(el) {
        match doc.name(child) {
            Some("Content" | "XMLElement") => items.push(child),
            Some(CSR) => push_run_items(doc, child, &mut items),
            Some(PSR) => {
                for grand in doc.element_children(child) {
                    match doc.name(grand) {
                        Some("XMLElement") => items.push(grand),
                        Some(CSR) => push_run_items(doc, grand, &mut items),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    items
}

fn push_run_items(doc: &XmlDocument, csr: NodeId, items: &mut Vec<NodeId>) {
    items.extend(
        doc.element_children(csr)
            .filter(|&n| doc.is_named(n, "Content") || doc.is_named(n, "XMLElement")),
    );
}

pub fn is_content(doc: &XmlDocument, id: NodeId) -> bool {
    doc.is_named(id, "Content")
}

/// First character range inside the element.
pub fn local_style_range(doc: &XmlDocument, el: NodeId) -> Option<NodeId> {
    doc.first_child_named(el, CSR).or_else(|| {
        doc.children_named(el, PSR)
            .find_map(|psr| doc.first_child_named(psr, CSR))
    })
}

/// The character range enclosing the element, if it sits in one.
pub fn super_style_range(doc: &XmlDocument, el: NodeId) -> Option<NodeId> {
    doc.parent(el).filter(|&p| doc.is_named(p, CSR))
}

pub fn style_range(doc: &XmlDocument, el: NodeId) -> Option<NodeId> {
    local_style_range(doc, el).or_else(|| super_style_range(doc, el))
}

/// Detached copy of the element's character range: applied style, run
/// attributes, leading and font. Falls back to the default character style
/// when the element has no range.
pub fn clone_style_range(doc: &mut XmlDocument, el: NodeId) -> NodeId {
    let style = style_range(doc, el);
    let applied = style
        .and_then(|s| doc.attr(s, "AppliedCharacterStyle"))
        .unwrap_or(DEFAULT_CHARACTER_STYLE)
        .to_string();

    let mut attrs = vec![Attribute::new("AppliedCharacterStyle", applied)];
    if let Some(style) = style {
        for name in CLONED_RUN_ATTRS {
            if let Some(value) = doc.attr(style, name) {
                attrs.push(Attribute::new(name, value));
            }
        }
    }

    let csr = doc.create_element_with(CSR, attrs);
    let props = doc.create_element("Properties");
    doc.append_child(csr, props);
    if let Some(style) = style {
        for name in RUN_PROPERTIES {
            if let Some(prop) = doc.find_path(style, &format!("Properties/{name}")) {
                let copy = doc.duplicate(prop);
                doc.append_child(props, copy);
            }
        }
    }
    csr
}

/// Detached `<Content>` holding `text`.
pub fn new_content(doc: &mut XmlDocument, text: &str) -> NodeId {
    let content = doc.create_element("Content");
    doc.set_text_content(content, text);
    content
}

/// `Name`/`Value` of the element's `XMLAttribute` children.
pub fn xml_attributes(doc: &XmlDocument, el: NodeId) -> Vec<(String, String)> {
    doc.children_named(el, "XMLAttribute")
        .filter_map(|a| {
            let name = doc.attr(a, "Name")?;
            Some((name.to_string(), doc.attr(a, "Value").unwrap_or_default().to_string()))
        })
        .collect()
}

/// Set an `XMLAttribute`, creating it with the `<Self>XMLAttributen<Name>` id.
pub fn set_xml_attribute(doc: &mut XmlDocument, el: NodeId, name: &str, value: &str) {
    let existing = doc
        .children_named(el, "XMLAttribute")
        .find(|&a| doc.attr(a, "Name") == Some(name));
    match existing {
        Some(attr) => doc.set_attr(attr, "Value", value),
        None => {
            let self_id = format!("{}XMLAttributen{name}", doc.attr(el, "Self").unwrap_or_default());
            let attr = doc.create_element_with(
                "XMLAttribute",
                vec![
                    Attribute::new("Self", self_id),
                    Attribute::new("Name", name),
                    Attribute::new("Value", value),
                ],
            );
            doc.append_child(el, attr);
        }
    }
}

/// Attach a note as the first child of `el`. Returns the `Note` node.
pub fn add_note(doc: &mut XmlDocument, el: NodeId, note: &str, author: &str, when: NaiveDateTime) -> NodeId {
    let when = when.format("%Y-%m-%dT%H:%M:%S").to_string();
    let node = doc.create_element_with(
        "Note",
        vec![
            Attribute::new("Collapsed", "false"),
            Attribute::new("CreationDate", when.clone()),
            Attribute::new("ModificationDate", when),
            Attribute::new("UserName", author),
        ],
    );
    let psr = doc.create_element_with(PSR, vec![Attribute::new("AppliedParagraphStyle", DEFAULT_PARAGRAPH_STYLE)]);
    let csr = doc.create_element_with(CSR, vec![Attribute::new("AppliedCharacterStyle", DEFAULT_CHARACTER_STYLE)]);
    let content = new_content(doc, note);
    doc.append_child(csr, content);
    doc.append_child(psr, csr);
    doc.append_child(node, psr);
    doc.insert_child(el, 0, node);
    node
}
