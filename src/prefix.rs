//! Identifier prefixing.
//!
//! Packages that are going to be merged must not share ids. Prefixing puts a
//! token in front of every id and every reference to one, then renames the
//! story and spread members to match.

use log::{debug, info};

use crate::archive::{CONTAINER_XML, METADATA_XML};
use crate::error::{Error, Result};
use crate::package::Session;
use crate::part::designmap::{self, SPREAD_REF, STORY_REF};
use crate::part::{DESIGNMAP, PartSource, is_spread_part, is_story_part, prefix_content_name};
use crate::util::is_valid_prefix_token;
use crate::xml::XmlDocument;

/// Which elements and attributes a prefix applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRules {
    /// Elements whose own attributes are left alone. Their descendants are
    /// still visited.
    pub excluded_tags: Vec<String>,
    /// Attributes holding an id or a reference to one.
    pub attributes: Vec<String>,
}

impl Default for PrefixRules {
    fn default() -> Self {
        let excluded = [
            "Document",
            "Language",
            "NumberingList",
            "NamedGrid",
            "TextVariable",
            "Section",
            "DocumentUser",
            "CrossReferenceFormat",
            "BuildingBlock",
            "IndexingSortOption",
            "ABullet",
            "Assignment",
            "XMLTag",
            "MasterSpread",
        ];
        let attributes = [
            "Self",
            "XMLContent",
            "ParentStory",
            "MappedStyle",
            "AppliedCharacterStyle",
            "AppliedParagraphStyle",
            "AppliedObjectStyle",
            "NextStyle",
            "FillColor",
            "StrokeColor",
            "ItemLayer",
        ];
        Self {
            excluded_tags: excluded.iter().map(|s| s.to_string()).collect(),
            attributes: attributes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub(crate) fn apply(session: &mut Session, token: &str, rules: &PrefixRules) -> Result<()> {
    if !is_valid_prefix_token(token) {
        return Err(Error::InvalidPrefix(token.to_string()));
    }

    let parts: Vec<String> = session
        .member_names()
        .into_iter()
        .filter(|n| n.ends_with(".xml") && n != CONTAINER_XML && n != METADATA_XML)
        .collect();

    for name in &parts {
        let doc = session.doc_mut(name)?;
        prefix_references(doc, token, rules);
    }

    let designmap = session.doc_mut(DESIGNMAP)?;
    prefix_designmap(designmap, token);

    for name in parts.iter().filter(|n| is_story_part(n) || is_spread_part(n)) {
        if let Some(new_name) = prefix_content_name(name, token) {
            session.rename(name, &new_name)?;
        }
    }

    info!("prefixed {} parts with {token:?}", parts.len());
    Ok(())
}

/// Rewrite the ids and references of one part.
pub fn prefix_references(doc: &mut XmlDocument, token: &str, rules: &PrefixRules) {
    let elements: Vec<_> = doc.elements().collect();
    for el in elements {
        let excluded = doc
            .name(el)
            .is_some_and(|name| rules.excluded_tags.iter().any(|t| t == name));
        if !excluded {
            for attr in &rules.attributes {
                if let Some(value) = doc.attr(el, attr)
                    && !value.is_empty()
                {
                    let prefixed = format!("{token}{value}");
                    doc.set_attr(el, attr, prefixed);
                }
            }
        }

        if (doc.is_named(el, SPREAD_REF) || doc.is_named(el, STORY_REF))
            && let Some(src) = doc.attr(el, "src")
            && let Some(prefixed) = prefix_content_name(src, token)
        {
            doc.set_attr(el, "src", prefixed);
        }
    }

    let root = doc.root();
    if doc.is_named(root, "Document")
        && let Some(list) = doc.attr(root, "StoryList")
    {
        let prefixed: Vec<String> = list.split_whitespace().map(|s| format!("{token}{s}")).collect();
        doc.set_attr(root, "StoryList", prefixed.join(" "));
    }
}

/// Manifest references living on excluded elements.
fn prefix_designmap(doc: &mut XmlDocument, token: &str) {
    let root = doc.root();
    if let Some(layer) = doc.attr(root, "ActiveLayer") {
        let prefixed = format!("{token}{layer}");
        doc.set_attr(root, "ActiveLayer", prefixed);
    }
    if let Some(section) = designmap::section(doc)
        && let Some(start) = doc.attr(section, "PageStart")
    {
        let prefixed = format!("{token}{start}");
        doc.set_attr(section, "PageStart", prefixed);
    }
    debug!("prefixed manifest layer and section references");
}

/// Whether the backing story's `XmlStory` id carries `token` in front of a
/// non-empty remainder.
pub fn is_prefixed<S: PartSource + ?Sized>(src: &S, token: &str) -> Result<bool> {
    let backing = src.part(crate::part::BACKING_STORY)?;
    let root = backing.root();
    let story = if backing.is_named(root, "XmlStory") {
        Some(root)
    } else {
        backing.find_descendant(root, "XmlStory")
    };
    Ok(story
        .and_then(|s| backing.attr(s, "Self"))
        .and_then(|id| id.strip_prefix(token))
        .is_some_and(|rest| !rest.is_empty()))
}
