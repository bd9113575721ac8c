//! Error types for idmlkit operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or mutating a package.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed XML in {part}: {message}")]
    MalformedXml { part: String, message: String },

    #[error("Package not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// A named member is absent from the archive.
    ///
    /// Traversals treat this as "no such part" and carry on; it only
    /// surfaces to callers that asked for the member directly.
    #[error("Missing part: {0}")]
    MissingPart(String),

    #[error("Archive member escapes the package root: {0}")]
    UnsafeMemberName(String),

    #[error("Invalid prefix {0:?}: only letters, digits and '_' are allowed")]
    InvalidPrefix(String),

    #[error("No structure node at {0}")]
    PathNotFound(String),

    #[error("No page item or story element for {0}")]
    MissingPageItem(String),

    #[error("Invalid geometry on {element}: {message}")]
    InvalidGeometry { element: String, message: String },

    #[error("Unsupported structural shape: {0}")]
    UnsupportedShape(String),

    #[error("No layer {0} in the manifest")]
    LayerNotFound(String),

    #[error("Page {page} out of range (package has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("Identifier collision between packages: {}", .0.join(", "))]
    CollisionDetected(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(part: &str, message: impl ToString) -> Self {
        Error::MalformedXml {
            part: part.to_string(),
            message: message.to_string(),
        }
    }
}
