//! The package model.
//!
//! A [`Package`] is one open archive. Parts are parsed the first time they
//! are asked for and cached for the life of the instance, as is the structure
//! tree. Every mutation runs in a [`Session`] over a working copy; when it
//! commits, the archive on disk is replaced and the package reopens itself,
//! dropping all caches.

mod session;

pub(crate) use session::Session;

use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use log::debug;

use crate::archive::{Archive, OpenMode};
use crate::content::{self, ContentTree};
use crate::error::{Error, Result};
use crate::geometry::{self, Page};
use crate::layer;
use crate::merge::{self, MergeOptions, PageRequest};
use crate::part::resources::{self, StyleMapping};
use crate::part::designmap;
use crate::part::{self, DESIGNMAP, FONTS, MAPPING, PartSource, STYLES, TAGS, find_page_item};
use crate::prefix::{self, PrefixRules};
use crate::structure::{StructureId, StructureTree};
use crate::xml::XmlDocument;

/// A page together with the spread part it sits in.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadPage {
    pub spread: String,
    pub page: Page,
}

#[derive(Debug)]
pub struct Package {
    archive: Archive,
    parts: HashMap<String, OnceCell<XmlDocument>>,
    structure: OnceCell<StructureTree>,
}

impl Package {
    /// Open an existing package for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let archive = Archive::open(path, OpenMode::Read)?;
        Ok(Self::from_archive(archive))
    }

    /// Pack a directory tree into a new package at `dest`.
    ///
    /// Fails with [`Error::AlreadyExists`] when `dest` exists, leaving it
    /// untouched.
    pub fn create_from_dir<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, dest: Q) -> Result<Self> {
        let archive = Archive::create_from_dir(dir, dest)?;
        Ok(Self::from_archive(archive))
    }

    fn from_archive(archive: Archive) -> Self {
        let parts = archive
            .names()
            .filter(|n| n.ends_with(".xml"))
            .map(|n| (n.to_string(), OnceCell::new()))
            .collect();
        Self {
            archive,
            parts,
            structure: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.archive.path()
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// The logical structure, rebuilt after every mutation.
    pub fn structure(&self) -> Result<&StructureTree> {
        if let Some(tree) = self.structure.get() {
            return Ok(tree);
        }
        let tree = StructureTree::build(self)?;
        Ok(self.structure.get_or_init(|| tree))
    }

    /// The structure as indented XML, one element per node.
    pub fn xml_structure(&self) -> Result<String> {
        let doc = self.structure()?.to_document();
        Ok(doc.to_xml_string(doc.root(), true))
    }

    /// Absolute path of a structure node (`/Root/article[2]/module`).
    pub fn structure_path(&self, id: StructureId) -> Result<String> {
        Ok(self.structure()?.path_of(id))
    }

    /// Spread members in layout order.
    pub fn spreads(&self) -> Vec<String> {
        part::spread_parts(self)
    }

    /// Story members in archive order.
    pub fn stories(&self) -> Vec<String> {
        part::story_parts(self)
    }

    pub fn story_ids(&self) -> Vec<String> {
        part::story_ids(self)
    }

    /// Tag names defined in `XML/Tags.xml`.
    pub fn tags(&self) -> Result<Vec<String>> {
        let doc = self.part(TAGS)?;
        Ok(named(doc, resources::xml_tags(doc)))
    }

    pub fn font_families(&self) -> Result<Vec<String>> {
        let doc = self.part(FONTS)?;
        Ok(named(doc, resources::font_families(doc)))
    }

    /// Element names of the style groups (`RootCharacterStyleGroup`, ...).
    pub fn style_groups(&self) -> Result<Vec<String>> {
        let doc = self.part(STYLES)?;
        Ok(resources::style_groups(doc)
            .into_iter()
            .filter_map(|g| doc.name(g).map(str::to_string))
            .collect())
    }

    /// Tag to style table; empty when the package has no mapping part.
    pub fn style_mapping(&self) -> Result<StyleMapping> {
        if !self.has_part(MAPPING) {
            return Ok(StyleMapping::default());
        }
        Ok(StyleMapping::from_doc(self.part(MAPPING)?))
    }

    /// Every page, spread by spread in layout order.
    pub fn pages(&self) -> Result<Vec<SpreadPage>> {
        let mut out = Vec::new();
        for spread in self.spreads() {
            for page in geometry::pages(self.part(&spread)?)? {
                out.push(SpreadPage {
                    spread: spread.clone(),
                    page,
                });
            }
        }
        Ok(out)
    }

    /// Whether every id carries `token` (checked on the backing story).
    pub fn is_prefixed(&self, token: &str) -> Result<bool> {
        prefix::is_prefixed(self, token)
    }

    /// Story parts referenced by the node at `path` and below.
    pub fn stories_for_node(&self, path: &str) -> Result<Vec<String>> {
        let tree = self.structure()?;
        let id = tree.resolve(path)?;
        Ok(tree.stories_below(self, id))
    }

    /// Part holding the content of the node at `path`.
    pub fn story_part_containing(&self, path: &str) -> Result<String> {
        let tree = self.structure()?;
        let id = tree.resolve(path)?;
        Ok(tree.node(id).story.clone())
    }

    /// Spread placing the node at `path`, or its nearest placed ancestor.
    pub fn spread_part_containing(&self, path: &str) -> Result<Option<String>> {
        let tree = self.structure()?;
        let mut current = Some(tree.resolve(path)?);
        while let Some(id) = current {
            if let Some(content) = tree.node(id).xml_content()
                && let Some((spread, _)) = find_page_item(self, content)?
            {
                return Ok(Some(spread));
            }
            current = tree.parent(id);
        }
        Ok(None)
    }

    /// The text content of the whole structure as plain XML named after the
    /// markup tags.
    pub fn export_xml(&self) -> Result<String> {
        Ok(self.export_as_tree()?.to_xml())
    }

    pub fn export_as_tree(&self) -> Result<ContentTree> {
        content::export_tree(self, self.structure()?)
    }

    /// Like [`export_xml`](Self::export_xml), rooted at the node at `path`.
    pub fn export_xml_from(&self, path: &str) -> Result<String> {
        Ok(self.export_as_tree_from(path)?.to_xml())
    }

    pub fn export_as_tree_from(&self, path: &str) -> Result<ContentTree> {
        content::export_tree_from(self, self.structure()?, path)
    }

    /// Layer ids in manifest order.
    pub fn layers(&self) -> Result<Vec<String>> {
        Ok(designmap::layer_ids(self.part(DESIGNMAP)?))
    }

    pub fn active_layer(&self) -> Result<Option<String>> {
        Ok(designmap::active_layer(self.part(DESIGNMAP)?).map(str::to_string))
    }

    /// Layers at least one spread item sits on.
    pub fn referenced_layers(&self) -> Result<Vec<String>> {
        layer::referenced_layers(self)
    }

    /// Prefix every id and reference with `token`.
    pub fn prefix(&mut self, token: &str) -> Result<()> {
        self.prefix_with(token, &PrefixRules::default())
    }

    pub fn prefix_with(&mut self, token: &str, rules: &PrefixRules) -> Result<()> {
        self.mutate(|session| prefix::apply(session, token, rules))
    }

    /// Splice the branch at `only` in `src` under the node at `at`, bringing
    /// its page items, stories and definitions along.
    pub fn insert(&mut self, src: &Package, at: &str, only: &str) -> Result<()> {
        self.insert_with(src, at, only, &MergeOptions::default())
    }

    pub fn insert_with(&mut self, src: &Package, at: &str, only: &str, options: &MergeOptions) -> Result<()> {
        self.mutate(|session| merge::insert(session, src, at, only, options))
    }

    /// Copy page `page_number` (1-based) of `src` into this package and
    /// splice the branch at `only` under `at`.
    pub fn add_page_from_idml(&mut self, src: &Package, page_number: usize, at: &str, only: &str) -> Result<()> {
        self.add_pages_from_idml(&[(src, page_number, at, only)])
    }

    /// Several pages in one working copy.
    pub fn add_pages_from_idml(&mut self, requests: &[PageRequest<'_, Package>]) -> Result<()> {
        self.add_pages_from_idml_with(requests, &MergeOptions::default())
    }

    pub fn add_pages_from_idml_with(
        &mut self,
        requests: &[PageRequest<'_, Package>],
        options: &MergeOptions,
    ) -> Result<()> {
        self.mutate(|session| merge::add_pages_from_idml(session, requests, options))
    }

    /// Map `xml` onto the structure below `at`.
    pub fn import_xml(&mut self, xml: &str, at: &str) -> Result<()> {
        self.mutate(|session| content::import::import_xml(session, xml, at))
    }

    /// Attach a note to the story element of the node at `path`, dated
    /// `when` or now.
    pub fn add_note(&mut self, path: &str, note: &str, author: &str, when: Option<NaiveDateTime>) -> Result<()> {
        let when = when.unwrap_or_else(|| Local::now().naive_local());
        self.mutate(|session| content::add_note(session, path, note, author, when))
    }

    /// Append `suffix` to every layer name.
    pub fn suffix_layers(&mut self, suffix: &str) -> Result<()> {
        self.mutate(|session| layer::suffix_layers(session, suffix))
    }

    /// Collapse all layers into the first one, optionally renamed.
    pub fn merge_layers(&mut self, with_name: Option<&str>) -> Result<()> {
        self.mutate(|session| layer::merge_layers(session, with_name))
    }

    /// Remove a layer and the guides placed on it.
    pub fn remove_layer(&mut self, id: &str) -> Result<()> {
        self.mutate(|session| layer::remove_layer(session, id))
    }

    pub fn remove_guides_on_layer(&mut self, id: &str) -> Result<()> {
        self.mutate(|session| layer::remove_guides_on_layer(session, id).map(|_| ()))
    }

    /// Remove the layers no spread item sits on.
    pub fn remove_orphan_layers(&mut self) -> Result<()> {
        self.mutate(|session| layer::remove_orphan_layers(session).map(|_| ()))
    }

    fn mutate<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Session) -> Result<()>,
    {
        let path = self.path().to_path_buf();
        let mut session = Session::begin(&path)?;
        edit(&mut session)?;
        session.commit()?;
        *self = Package::open(&path)?;
        debug!("reopened {}", path.display());
        Ok(())
    }
}

impl PartSource for Package {
    fn member_names(&self) -> Vec<String> {
        self.archive.names().map(str::to_string).collect()
    }

    fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    fn part(&self, name: &str) -> Result<&XmlDocument> {
        let cell = self
            .parts
            .get(name)
            .ok_or_else(|| Error::MissingPart(name.to_string()))?;
        if let Some(doc) = cell.get() {
            return Ok(doc);
        }
        let doc = XmlDocument::parse_part(name, self.archive.read(name)?)?;
        Ok(cell.get_or_init(|| doc))
    }
}

/// `Name` attributes of `nodes`, skipping unnamed ones.
fn named(doc: &XmlDocument, nodes: Vec<crate::xml::NodeId>) -> Vec<String> {
    nodes
        .into_iter()
        .filter_map(|n| doc.attr(n, "Name").map(str::to_string))
        .collect()
}
