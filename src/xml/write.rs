//! Serialization of an [`XmlDocument`] back to part bytes.

use quick_xml::escape::partial_escape;

use super::arena::{NodeData, NodeId, XmlDocument};

/// Processing instruction the host application expects at the top of the
/// manifest.
pub const DESIGNMAP_PI: &str =
    r#"<?aid style="50" type="document" readerVersion="6.0" featureSet="257" product="7.5(142)" ?>"#;

/// Options controlling [`XmlDocument::serialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Indent element-only content. Elements holding any text are written
    /// verbatim.
    pub pretty: bool,
    /// Value of the declaration's `standalone` flag.
    pub standalone: bool,
    /// Literal line written after the declaration unless the prolog already
    /// carries an instruction with the same target.
    pub doctype: Option<String>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            standalone: true,
            doctype: None,
        }
    }
}

impl SerializeOptions {
    /// Options for an archive member, applying the per-part doctype table.
    pub fn for_part(name: &str) -> Self {
        let doctype = match name {
            "designmap.xml" => Some(DESIGNMAP_PI.to_string()),
            _ => None,
        };
        Self {
            doctype,
            ..Self::default()
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl XmlDocument {
    /// Serialize the whole document: declaration, doctype line, prolog, root.
    pub fn serialize(&self, options: &SerializeOptions) -> Vec<u8> {
        let mut out = String::with_capacity(4096);
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone=""#);
        out.push_str(if options.standalone { "yes" } else { "no" });
        out.push_str("\"?>\n");

        if let Some(doctype) = &options.doctype
            && !self.prolog_has_target(pi_target(doctype))
        {
            out.push_str(doctype.trim());
            out.push('\n');
        }
        if let Some(doctype) = &self.doctype {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype);
            out.push_str(">\n");
        }
        for &node in &self.prolog {
            self.write_node(&mut out, node, false, 0);
            out.push('\n');
        }

        self.write_node(&mut out, self.root(), options.pretty, 0);
        if options.pretty {
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Serialize one subtree without declaration.
    pub fn to_xml_string(&self, id: NodeId, pretty: bool) -> String {
        let mut out = String::new();
        self.write_node(&mut out, id, pretty, 0);
        out
    }

    fn prolog_has_target(&self, target: &str) -> bool {
        self.prolog.iter().any(|&n| match self.data(n) {
            NodeData::ProcessingInstruction(body) => {
                body.split_whitespace().next() == Some(target)
            }
            _ => false,
        })
    }

    fn write_node(&self, out: &mut String, id: NodeId, pretty: bool, depth: usize) {
        match self.data(id) {
            NodeData::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeData::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::ProcessingInstruction(body) => {
                out.push_str("<?");
                out.push_str(body);
                out.push_str("?>");
            }
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr.value));
                    out.push('"');
                }

                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');

                if pretty && !self.has_mixed_content(id) {
                    let mut wrote_child = false;
                    for &child in children {
                        if self.is_empty_text(child) {
                            continue;
                        }
                        out.push('\n');
                        push_indent(out, depth + 1);
                        self.write_node(out, child, true, depth + 1);
                        wrote_child = true;
                    }
                    if wrote_child {
                        out.push('\n');
                        push_indent(out, depth);
                    }
                } else {
                    for &child in children {
                        self.write_node(out, child, false, depth + 1);
                    }
                }

                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    fn is_empty_text(&self, id: NodeId) -> bool {
        matches!(self.data(id), NodeData::Text(t) if t.is_empty())
    }

    fn has_mixed_content(&self, id: NodeId) -> bool {
        self.children(id).iter().any(|&c| match self.data(c) {
            NodeData::Text(t) => !t.is_empty(),
            NodeData::CData(_) => true,
            _ => false,
        })
    }
}

fn pi_target(line: &str) -> &str {
    line.trim()
        .trim_start_matches("<?")
        .split_whitespace()
        .next()
        .unwrap_or("")
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Escape an attribute value. Whitespace control characters are written as
/// character references so they survive attribute-value normalization.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}
