//! # idmlkit
//!
//! Read, prefix, merge and re-tag IDML page-layout packages.
//!
//! An IDML package is a zip of interdependent XML parts: a manifest, one part
//! per spread and per story, shared style, font and tag catalogs. The logical
//! document structure is scattered across the backing story and the story
//! parts; [`Package::structure`] stitches it back into one tree that the other
//! operations address with paths such as `/Root/article[2]`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use idmlkit::Package;
//!
//! let mut dest = Package::open("magazine.idml")?;
//! let mut article = Package::open("article.idml")?;
//!
//! // Ids must not clash before merging.
//! article.prefix("ART1")?;
//! dest.insert(&article, "/Root/article[3]", "/Root/module[1]")?;
//!
//! println!("{}", dest.export_xml()?);
//! # Ok::<(), idmlkit::Error>(())
//! ```
//!
//! Every mutation extracts the archive to a scratch directory, edits the
//! parts there and renames a freshly written archive over the original. A
//! failed mutation leaves the original file as it was.

pub mod archive;
pub mod content;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod merge;
pub mod package;
pub mod part;
pub mod prefix;
pub mod structure;
pub(crate) mod util;
pub mod xml;

pub use archive::{Archive, OpenMode, WorkingCopy};
pub use content::{ContentItem, ContentTree};
pub use error::{Error, Result};
pub use geometry::{Coordinates, Face, Page};
pub use merge::{MergeOptions, PageRequest};
pub use package::{Package, SpreadPage};
pub use part::PartSource;
pub use part::resources::StyleMapping;
pub use prefix::PrefixRules;
pub use structure::{StructureId, StructureNode, StructureTree};
pub use xml::{SerializeOptions, XmlDocument};
