//! XML part wrapper: arena tree, parser and serializer.

mod arena;
mod parse;
mod write;

pub use arena::{Attribute, NodeData, NodeId, XmlDocument, XmlNode};
pub use write::{DESIGNMAP_PI, SerializeOptions};

/// Namespace of the packaging elements (`idPkg:Story`, `idPkg:Spread`, ...).
pub const IDPKG_NS: &str = "http://ns.adobe.com/AdobeInDesign/idml/1.0/packaging";
