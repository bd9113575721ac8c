//! Event-driven parsing of part bytes into an [`XmlDocument`].

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use super::arena::{Attribute, NodeData, NodeId, XmlDocument};
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding};

impl XmlDocument {
    /// Parse a standalone XML buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_part("<input>", bytes)
    }

    /// Parse the bytes of the archive member `part`.
    ///
    /// Whitespace is kept verbatim inside the root element; the XML
    /// declaration is dropped since serialization always writes its own.
    pub fn parse_part(part: &str, bytes: &[u8]) -> Result<Self> {
        let hint = extract_xml_encoding(bytes);
        let content = decode_text(bytes, hint);

        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(false);

        let mut doc = XmlDocument::empty();
        let mut root: Option<NodeId> = None;
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::malformed(part, format!("{e} at byte {}", reader.error_position()))
            })?;

            match event {
                Event::Start(e) => {
                    let id = element_from(part, &mut doc, &e)?;
                    attach(part, &mut doc, &mut root, &stack, id)?;
                    stack.push(id);
                }
                Event::Empty(e) => {
                    let id = element_from(part, &mut doc, &e)?;
                    attach(part, &mut doc, &mut root, &stack, id)?;
                }
                Event::End(_) => {
                    if stack.pop().is_none() {
                        return Err(Error::malformed(part, "unbalanced end tag"));
                    }
                }
                Event::Text(e) => {
                    if let Some(&parent) = stack.last() {
                        push_text(&mut doc, parent, &String::from_utf8_lossy(e.as_ref()));
                    } else if !e.iter().all(u8::is_ascii_whitespace) {
                        return Err(Error::malformed(part, "text outside the root element"));
                    }
                }
                Event::GeneralRef(e) => {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    let resolved = resolve_entity(&entity).ok_or_else(|| {
                        Error::malformed(part, format!("unknown entity &{entity};"))
                    })?;
                    match stack.last() {
                        Some(&parent) => push_text(&mut doc, parent, &resolved),
                        None => {
                            return Err(Error::malformed(part, "entity outside the root element"));
                        }
                    }
                }
                Event::CData(e) => {
                    if let Some(&parent) = stack.last() {
                        let node = doc
                            .create_node(NodeData::CData(String::from_utf8_lossy(e.as_ref()).into_owned()));
                        doc.append_child(parent, node);
                    }
                }
                Event::Comment(e) => {
                    let node = doc.create_node(NodeData::Comment(
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    ));
                    place_misc(&mut doc, root, &stack, node);
                }
                Event::PI(e) => {
                    let node = doc.create_node(NodeData::ProcessingInstruction(
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    ));
                    place_misc(&mut doc, root, &stack, node);
                }
                Event::DocType(e) => {
                    doc.doctype = Some(String::from_utf8_lossy(e.as_ref()).into_owned());
                }
                Event::Decl(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(Error::malformed(part, "unclosed element at end of input"));
        }
        let root = root.ok_or_else(|| Error::malformed(part, "no root element"))?;
        doc.set_root(root);
        Ok(doc)
    }
}

fn element_from(part: &str, doc: &mut XmlDocument, e: &BytesStart) -> Result<NodeId> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::malformed(part, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw).map_err(|err| Error::malformed(part, err))?;
        attrs.push(Attribute::new(key, value.into_owned()));
    }
    Ok(doc.create_element_with(&name, attrs))
}

fn attach(
    part: &str,
    doc: &mut XmlDocument,
    root: &mut Option<NodeId>,
    stack: &[NodeId],
    id: NodeId,
) -> Result<()> {
    match stack.last() {
        Some(&parent) => doc.append_child(parent, id),
        None if root.is_none() => *root = Some(id),
        None => return Err(Error::malformed(part, "more than one root element")),
    }
    Ok(())
}

/// Comments and PIs before the root go to the prolog; trailing ones are dropped.
fn place_misc(doc: &mut XmlDocument, root: Option<NodeId>, stack: &[NodeId], node: NodeId) {
    match stack.last() {
        Some(&parent) => doc.append_child(parent, node),
        None if root.is_none() => doc.prolog.push(node),
        None => {}
    }
}

/// Append text to `parent`, merging with a trailing text node.
fn push_text(doc: &mut XmlDocument, parent: NodeId, text: &str) {
    if let Some(&last) = doc.children(parent).last()
        && let NodeData::Text(existing) = doc.data_mut(last)
    {
        existing.push_str(text);
        return;
    }
    let node = doc.create_text(text);
    doc.append_child(parent, node);
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_prolog_pi() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<?aid style="50" type="document" readerVersion="6.0" featureSet="257" product="7.5(142)" ?>
<Document Self="d"><StoryList/></Document>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        assert_eq!(doc.prolog().len(), 1);
        assert_eq!(doc.name(doc.root()), Some("Document"));
        assert_eq!(doc.attr(doc.root(), "Self"), Some("d"));
    }

    #[test]
    fn test_parse_entities_and_whitespace() {
        let doc = XmlDocument::parse(b"<Content>a &amp; b&#x2029;c  </Content>").unwrap();
        assert_eq!(doc.text_content(doc.root()), "a & b\u{2029}c  ");
        assert_eq!(doc.children(doc.root()).len(), 1);
    }

    #[test]
    fn test_parse_attribute_unescape() {
        let doc = XmlDocument::parse(br#"<a Name="x &lt; y &quot;z&quot;"/>"#).unwrap();
        assert_eq!(doc.attr(doc.root(), "Name"), Some("x < y \"z\""));
    }

    #[test]
    fn test_malformed_inputs() {
        for bad in [
            &b"<a><b></a>"[..],
            b"<a>",
            b"",
            b"<a/><b/>",
            b"<a>&bogus;</a>",
        ] {
            let err = XmlDocument::parse_part("Stories/Story_u1.xml", bad).unwrap_err();
            assert!(
                matches!(err, Error::MalformedXml { ref part, .. } if part == "Stories/Story_u1.xml"),
                "expected MalformedXml for {:?}, got {err:?}",
                String::from_utf8_lossy(bad)
            );
        }
    }
}
