//! Named package parts and read access shared by packages and sessions.

pub mod designmap;
pub mod resources;

use crate::error::Result;
use crate::xml::{NodeId, XmlDocument};

pub const DESIGNMAP: &str = "designmap.xml";
pub const BACKING_STORY: &str = "XML/BackingStory.xml";
pub const TAGS: &str = "XML/Tags.xml";
pub const MAPPING: &str = "XML/Mapping.xml";
pub const FONTS: &str = "Resources/Fonts.xml";
pub const STYLES: &str = "Resources/Styles.xml";
pub const GRAPHIC: &str = "Resources/Graphic.xml";

pub const STORY_PREFIX: &str = "Stories/Story_";
pub const SPREAD_PREFIX: &str = "Spreads/Spread_";

/// Read access to the parsed XML parts of a package.
///
/// Implemented by [`Package`](crate::Package) for read-only traversal and by
/// the mutation session so that the same lookups work on a working copy.
pub trait PartSource {
    /// Every member name, in archive order.
    fn member_names(&self) -> Vec<String>;

    fn has_part(&self, name: &str) -> bool;

    /// Parsed part, or [`Error::MissingPart`](crate::Error::MissingPart).
    fn part(&self, name: &str) -> Result<&XmlDocument>;
}

/// `Stories/Story_<id>.xml`
pub fn story_part_name(id: &str) -> String {
    format!("{STORY_PREFIX}{id}.xml")
}

/// `Spreads/Spread_<id>.xml`
pub fn spread_part_name(id: &str) -> String {
    format!("{SPREAD_PREFIX}{id}.xml")
}

/// Extract `<id>` from `Stories/Story_<id>.xml`.
pub fn story_id_from_part(name: &str) -> Option<&str> {
    name.strip_prefix(STORY_PREFIX)?.strip_suffix(".xml")
}

/// Extract `<id>` from `Spreads/Spread_<id>.xml`.
pub fn spread_id_from_part(name: &str) -> Option<&str> {
    name.strip_prefix(SPREAD_PREFIX)?.strip_suffix(".xml")
}

pub fn is_story_part(name: &str) -> bool {
    story_id_from_part(name).is_some_and(|id| !id.is_empty())
}

pub fn is_spread_part(name: &str) -> bool {
    spread_id_from_part(name).is_some_and(|id| !id.is_empty())
}

/// Insert `prefix` after the `Story_`/`Spread_` marker of a content part
/// reference. Works on full member names and on bare file names.
pub fn prefix_content_name(name: &str, prefix: &str) -> Option<String> {
    let (dir, base) = match name.rfind('/') {
        Some(i) => name.split_at(i + 1),
        None => ("", name),
    };
    for marker in ["Story_", "Spread_"] {
        if let Some(rest) = base.strip_prefix(marker)
            && rest.len() > ".xml".len()
            && rest.ends_with(".xml")
        {
            return Some(format!("{dir}{marker}{prefix}{rest}"));
        }
    }
    None
}

/// Spread members in layout order.
///
/// The manifest's `idPkg:Spread` references give the order; spread members
/// it does not mention follow in archive order.
pub fn spread_parts<S: PartSource + ?Sized>(src: &S) -> Vec<String> {
    let members = src.member_names();
    let mut ordered: Vec<String> = Vec::new();

    if let Ok(designmap) = src.part(DESIGNMAP) {
        for src_ref in designmap::spread_refs(designmap) {
            if src.has_part(&src_ref) && !ordered.contains(&src_ref) {
                ordered.push(src_ref);
            }
        }
    }
    for name in members {
        if is_spread_part(&name) && !ordered.contains(&name) {
            ordered.push(name);
        }
    }
    ordered
}

/// Story members in archive order.
pub fn story_parts<S: PartSource + ?Sized>(src: &S) -> Vec<String> {
    src.member_names()
        .into_iter()
        .filter(|n| is_story_part(n))
        .collect()
}

pub fn story_ids<S: PartSource + ?Sized>(src: &S) -> Vec<String> {
    story_parts(src)
        .iter()
        .filter_map(|n| story_id_from_part(n).map(str::to_string))
        .collect()
}

/// Find the spread element for a structure `XMLContent` value: the element
/// whose `Self` equals `id`, or failing that, whose `ParentStory` does.
/// Spreads are searched in layout order and the first match wins.
pub fn find_page_item<S: PartSource + ?Sized>(src: &S, id: &str) -> Result<Option<(String, NodeId)>> {
    for name in spread_parts(src) {
        let doc = src.part(&name)?;
        let found = doc
            .get_by_id(None, "Self", id)
            .or_else(|| doc.get_by_id(None, "ParentStory", id));
        if let Some(node) = found {
            return Ok(Some((name, node)));
        }
    }
    Ok(None)
}
