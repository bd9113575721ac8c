//! Package merges.
//!
//! Inserting splices one structure branch of a source package under a node
//! of the destination. The page items of the source spread come along,
//! moved so the source anchor lands on the destination anchor, together
//! with the story parts of the branch and the shared definitions they rely
//! on. Adding a page copies one source page with its items into the last
//! destination spread (or a fresh one) and splices a branch the same way.

use std::collections::HashSet;

use log::{debug, info};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::geometry::{self, Face, NON_ITEMS};
use crate::layer;
use crate::package::Session;
use crate::part::designmap;
use crate::part::resources::{merge_by_self, merge_fonts, merge_mapping, merge_styles};
use crate::part::{
    BACKING_STORY, DESIGNMAP, FONTS, GRAPHIC, MAPPING, PartSource, STYLES, TAGS, find_page_item,
    spread_id_from_part, spread_parts, story_id_from_part, story_part_name,
};
use crate::structure::{StructureId, StructureTree};
use crate::util::increment_filename;
use crate::xml::{NodeId, XmlDocument};

/// Knobs for [`Package::insert_with`](crate::Package::insert_with) and the
/// page-adding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Refuse merges whose copied stories or element ids already exist in
    /// the destination.
    pub check_collisions: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { check_collisions: true }
    }
}

/// One page to add: source package, 1-based page number, destination path
/// and source branch.
pub type PageRequest<'a, S> = (&'a S, usize, &'a str, &'a str);

pub(crate) fn insert<S: PartSource + ?Sized>(
    session: &mut Session,
    src: &S,
    at: &str,
    only: &str,
    options: &MergeOptions,
) -> Result<()> {
    let branch = Branch::resolve(&*session, src, at, only, options)?;

    let (dest_spread, at_item) = locate_page_item(&*session, &branch.dest, branch.at)?;
    let (src_spread, only_item) = locate_page_item(src, &branch.src, branch.only)?;
    let src_spread_doc = src.part(&src_spread)?;
    let (dx, dy) =
        geometry::compute_insert_translation(session.part(&dest_spread)?, at_item, src_spread_doc, only_item)?;
    debug!("moving {src_spread} items by ({dx}, {dy}) into {dest_spread}");

    merge_resources(session, src)?;
    copy_spread_items(session.doc_mut(&dest_spread)?, src_spread_doc, dx, dy)?;
    branch.splice(session, src)?;
    add_layers(session, src)?;
    let orphans = layer::remove_orphan_layers(session)?;
    if !orphans.is_empty() {
        debug!("dropped unused layers {}", orphans.join(", "));
    }

    info!("inserted {only} under {at} ({} stories)", branch.stories.len());
    Ok(())
}

pub(crate) fn add_page_from_idml<S: PartSource + ?Sized>(
    session: &mut Session,
    src: &S,
    page_number: usize,
    at: &str,
    only: &str,
    options: &MergeOptions,
) -> Result<()> {
    let (src_spread, src_page) = source_page(src, page_number)?;
    let branch = Branch::resolve(&*session, src, at, only, options)?;

    let dest_spread = target_spread(session)?;
    geometry::add_page(session.doc_mut(&dest_spread)?, src.part(&src_spread)?, src_page)?;

    merge_resources(session, src)?;
    branch.splice(session, src)?;
    add_layers(session, src)?;

    info!("added page {page_number} to {dest_spread}, spliced {only} under {at}");
    Ok(())
}

pub(crate) fn add_pages_from_idml<S: PartSource>(
    session: &mut Session,
    requests: &[PageRequest<'_, S>],
    options: &MergeOptions,
) -> Result<()> {
    for &(src, page_number, at, only) in requests {
        add_page_from_idml(session, src, page_number, at, only, options)?;
    }
    Ok(())
}

/// Resolved source branch and destination node of a splice.
struct Branch {
    dest: StructureTree,
    src: StructureTree,
    at: StructureId,
    only: StructureId,
    /// Source story parts referenced from the branch.
    stories: Vec<String>,
}

impl Branch {
    fn resolve<S: PartSource + ?Sized>(
        dest: &Session,
        src: &S,
        at: &str,
        only: &str,
        options: &MergeOptions,
    ) -> Result<Self> {
        let dest_tree = StructureTree::build(dest)?;
        let src_tree = StructureTree::build(src)?;
        let at = dest_tree.resolve(at)?;
        let only = src_tree.resolve(only)?;
        let stories = src_tree.stories_below(src, only);

        let branch = Self {
            dest: dest_tree,
            src: src_tree,
            at,
            only,
            stories,
        };
        if options.check_collisions {
            branch.check_collisions(dest)?;
        }
        Ok(branch)
    }

    fn check_collisions(&self, dest: &Session) -> Result<()> {
        let mut clashes: Vec<String> = self
            .stories
            .iter()
            .filter(|name| dest.has_part(name))
            .cloned()
            .collect();

        let dest_ids: HashSet<String> = self.dest.self_ids().into_iter().collect();
        for id in self.src.descendants(self.only) {
            let self_id = self.src.node(id).self_id();
            if !self_id.is_empty() && dest_ids.contains(self_id) {
                clashes.push(self_id.to_string());
            }
        }

        if clashes.is_empty() {
            Ok(())
        } else {
            Err(Error::CollisionDetected(clashes))
        }
    }

    /// Append a copy of the source element under the destination element and
    /// bring the branch's story parts along.
    fn splice<S: PartSource + ?Sized>(&self, session: &mut Session, src: &S) -> Result<()> {
        let only_node = self.src.node(self.only);
        let only_self = only_node.self_id();
        let host = host_part(&self.src, self.only);
        let host_doc = src.part(&host)?;
        let src_el = host_doc
            .get_by_id(Some("XMLElement"), "Self", only_self)
            .ok_or_else(|| Error::MissingPageItem(only_self.to_string()))?;
        // Children of an element with content live in that content, or
        // are dropped with it.
        let has_content = only_node.xml_content().is_some();

        let at_node = self.dest.node(self.at);
        let at_self = at_node.self_id();
        let drop_content = at_node
            .xml_content()
            .is_some_and(|c| !session.has_part(&story_part_name(c)));

        let dest_doc = session.doc_mut(&at_node.story)?;
        let at_el = dest_doc
            .get_by_id(Some("XMLElement"), "Self", at_self)
            .ok_or_else(|| Error::MissingPageItem(at_self.to_string()))?;
        if drop_content && let Some(content) = dest_doc.remove_attr(at_el, "XMLContent") {
            debug!("{at_self} no longer points at page item {content}");
        }

        let copy = dest_doc.import_node(host_doc, src_el);
        if has_content {
            dest_doc.clear_children(copy);
        }
        dest_doc.append_child(at_el, copy);

        let mut ids = Vec::with_capacity(self.stories.len());
        for name in &self.stories {
            session.put(name, src.part(name)?.clone())?;
            if let Some(id) = story_id_from_part(name) {
                ids.push(id.to_string());
            }
            debug!("copied {name}");
        }
        designmap::add_stories(session.doc_mut(DESIGNMAP)?, &ids);
        Ok(())
    }
}

/// Part holding the `XMLElement` of a node: its parent's content story, or
/// the backing story for the root.
fn host_part(tree: &StructureTree, id: StructureId) -> String {
    match tree.parent(id) {
        Some(parent) => tree.node(parent).story.clone(),
        None => BACKING_STORY.to_string(),
    }
}

/// Spread part and element placing the content of a structure node.
fn locate_page_item<S: PartSource + ?Sized>(
    src: &S,
    tree: &StructureTree,
    id: StructureId,
) -> Result<(String, NodeId)> {
    let content = tree
        .node(id)
        .xml_content()
        .ok_or_else(|| Error::MissingPageItem(tree.path_of(id)))?;
    find_page_item(src, content)?.ok_or_else(|| Error::MissingPageItem(content.to_string()))
}

/// Copy the placed items of the source spread, shifted by `dx`/`dy`.
fn copy_spread_items(dest: &mut XmlDocument, src: &XmlDocument, dx: Decimal, dy: Decimal) -> Result<()> {
    let dest_spread = geometry::spread_node(dest)?;
    let src_spread = geometry::spread_node(src)?;

    for child in src.element_children(src_spread) {
        if NON_ITEMS.iter().any(|n| src.is_named(child, n)) {
            continue;
        }
        let copy = dest.import_node(src, child);
        if dest.attr(copy, "ItemTransform").is_some() {
            geometry::translate(dest, copy, dx, dy)?;
        }
        dest.append_child(dest_spread, copy);
    }
    Ok(())
}

/// Fonts, styles, graphics, tags and the style mapping of `src` that the
/// destination lacks. A catalog missing from the destination is copied whole.
fn merge_resources<S: PartSource + ?Sized>(session: &mut Session, src: &S) -> Result<()> {
    merge_part(session, src, FONTS, merge_fonts)?;
    merge_part(session, src, STYLES, merge_styles)?;
    merge_part(session, src, GRAPHIC, |dest, src| merge_by_self(dest, src, None))?;
    merge_part(session, src, TAGS, |dest, src| merge_by_self(dest, src, Some("XMLTag")))?;

    if src.has_part(MAPPING) {
        merge_part(session, src, MAPPING, merge_mapping)?;
        designmap::ensure_mapping_ref(session.doc_mut(DESIGNMAP)?);
    }
    Ok(())
}

fn merge_part<S, F>(session: &mut Session, src: &S, name: &str, merge: F) -> Result<()>
where
    S: PartSource + ?Sized,
    F: FnOnce(&mut XmlDocument, &XmlDocument) -> usize,
{
    if !src.has_part(name) {
        return Ok(());
    }
    let src_doc = src.part(name)?;
    if !session.has_part(name) {
        session.put(name, src_doc.clone())?;
        debug!("copied {name}");
        return Ok(());
    }
    let added = merge(session.doc_mut(name)?, src_doc);
    if added > 0 {
        debug!("merged {added} definitions into {name}");
    }
    Ok(())
}

fn add_layers<S: PartSource + ?Sized>(session: &mut Session, src: &S) -> Result<()> {
    let src_designmap = src.part(DESIGNMAP)?;
    let added = designmap::add_layers(session.doc_mut(DESIGNMAP)?, src_designmap);
    if added > 0 {
        debug!("added {added} layers");
    }
    Ok(())
}

/// Spread part and `Page` node of a 1-based page number, counting across
/// spreads in layout order.
fn source_page<S: PartSource + ?Sized>(src: &S, page_number: usize) -> Result<(String, NodeId)> {
    let mut all = Vec::new();
    for name in spread_parts(src) {
        for page in geometry::pages(src.part(&name)?)? {
            all.push((name.clone(), page.node));
        }
    }
    let count = all.len();
    page_number
        .checked_sub(1)
        .and_then(|i| all.into_iter().nth(i))
        .ok_or(Error::PageOutOfRange {
            page: page_number,
            count,
        })
}

/// The last spread when it can take another page, else a new empty one.
///
/// A spread is full with two pages, or when its last page is already a
/// recto.
fn target_spread(session: &mut Session) -> Result<String> {
    let spreads = spread_parts(&*session);
    let last = spreads
        .last()
        .ok_or_else(|| Error::UnsupportedShape("package has no spread".into()))?;

    let pages = geometry::pages(session.part(last)?)?;
    let full = pages.len() >= 2 || pages.last().is_some_and(|p| p.face() == Face::Recto);
    if !full {
        return Ok(last.clone());
    }
    new_spread(session, last)
}

/// Empty copy of `template` under the next free file name, registered in the
/// manifest after the last spread.
fn new_spread(session: &mut Session, template: &str) -> Result<String> {
    let mut name = increment_filename(template);
    while session.has_part(&name) {
        name = increment_filename(&name);
    }

    let mut doc = session.part(template)?.clone();
    geometry::clear_spread(&mut doc)?;
    let spread = geometry::spread_node(&doc)?;
    if let Some(id) = spread_id_from_part(&name) {
        doc.set_attr(spread, "Self", id);
    }

    session.put(&name, doc)?;
    designmap::add_spread(session.doc_mut(DESIGNMAP)?, &name);
    debug!("created {name} from {template}");
    Ok(name)
}
